use super::message::*;
use crate::constants::*;
use bytes::BytesMut;
use flume::{Receiver, RecvError, Sender};
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::UdpSocket, select};
use tracing::{debug, instrument, trace};

struct UdpRx {
    peer: SocketAddr,
    rx: Receiver<UdpRxMessage>,
    core: Sender<CoreMessage>,
    udp_socket: Arc<UdpSocket>,
}

impl UdpRx {
    async fn run(&mut self) {
        let mut byte_dest: Option<BytesMut> = None;

        loop {
            if byte_dest.is_none() {
                byte_dest = Some(BytesMut::zeroed(VOICE_PACKET_MAX));
            }

            select! {
                res = self.udp_socket.recv_from(byte_dest.as_mut().unwrap()) => match res {
                    Ok((len, addr)) => {
                        if addr != self.peer {
                            trace!("Dropped {} bytes from unexpected peer {}.", len, addr);
                            continue;
                        }

                        let mut pkt = byte_dest.take().unwrap();
                        pkt.truncate(len);

                        // Decryption happens on the core loop, which owns
                        // the cipher and the SSRC bindings.
                        if self.core.send(CoreMessage::UdpData(pkt)).is_err() {
                            break;
                        }
                    },
                    // Single receive errors are not fatal; only a stop
                    // request ends this loop.
                    Err(e) => {
                        debug!("UDP receive error: {:?}.", e);
                    },
                },
                msg = self.rx.recv_async() => match msg {
                    Ok(UdpRxMessage::Poison) | Err(RecvError::Disconnected) => break,
                },
            }
        }
    }
}

#[instrument(skip(rx, core, udp_socket))]
pub(crate) async fn runner(
    udp_socket: Arc<UdpSocket>,
    peer: SocketAddr,
    rx: Receiver<UdpRxMessage>,
    core: Sender<CoreMessage>,
) {
    trace!("UDP receive handle started.");

    let mut state = UdpRx {
        peer,
        rx,
        core,
        udp_socket,
    };

    state.run().await;

    trace!("UDP receive handle stopped.");
}
