#![allow(missing_docs)]

pub mod error;
pub(crate) mod heartbeat;
pub(crate) mod keepalive;
pub mod message;
pub(crate) mod udp_rx;
pub(crate) mod ws;

use super::{
    connection::{error::Error as ConnectionError, Connection},
    crypto,
    timer::Waiter,
    Config,
};
use crate::{
    events::EventRegistry,
    info::SessionInfo,
    model::Event as GatewayEvent,
};
use bytes::BytesMut;
use discortp::rtp::RtpPacket;
use flume::{Receiver, RecvError, Sender};
use message::*;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::spawn;
use tracing::{info, instrument, trace, warn};

pub(crate) fn start(
    config: Config,
    rx: Receiver<CoreMessage>,
    tx: Sender<CoreMessage>,
    connected: Arc<AtomicBool>,
    ssrc_tracker: Arc<SsrcTracker>,
) {
    spawn(async move {
        trace!("Voice core started.");
        runner(config, rx, tx, connected, ssrc_tracker).await;
        trace!("Voice core finished.");
    });
}

/// Exclusive owner of the protocol state machine.
///
/// Every transition runs on the core task, so none of this state needs
/// locking; the shared pieces (`connected`, the SSRC tracker) are the
/// read-only views handed to other tasks and the public handle.
struct Core {
    config: Config,
    tx: Sender<CoreMessage>,
    connected: Arc<AtomicBool>,
    ssrc_tracker: Arc<SsrcTracker>,
    events: EventRegistry,
    heartbeat: Arc<Waiter>,
    keepalive: Arc<Waiter>,
    connection: Option<Connection>,
}

#[instrument(skip_all)]
async fn runner(
    config: Config,
    rx: Receiver<CoreMessage>,
    tx: Sender<CoreMessage>,
    connected: Arc<AtomicBool>,
    ssrc_tracker: Arc<SsrcTracker>,
) {
    let mut core = Core {
        config,
        tx,
        connected,
        ssrc_tracker,
        events: EventRegistry::default(),
        heartbeat: Arc::new(Waiter::new()),
        keepalive: Arc::new(Waiter::new()),
        connection: None,
    };

    loop {
        match rx.recv_async().await {
            Ok(CoreMessage::Connect(info, result_tx)) => {
                core.connect(info, result_tx).await;
            },
            Ok(CoreMessage::Disconnect) => {
                core.teardown();
            },
            Ok(CoreMessage::SetSpeaking(is_speaking)) => {
                if let Some(conn) = &core.connection {
                    drop(conn.ws.send(WsMessage::Speaking(is_speaking)));
                }
            },
            Ok(CoreMessage::OpusFrame(frame)) => {
                core.send_opus(&frame).await;
            },
            Ok(CoreMessage::WsEvent(ev)) => {
                core.handle_gateway_event(ev);
            },
            Ok(CoreMessage::WsClosed(code)) => {
                info!("Voice gateway closed (code {:?}).", code);
                core.teardown();
            },
            Ok(CoreMessage::UdpData(packet)) => {
                core.feed_inbound(packet);
            },
            Ok(CoreMessage::AddListener(listener)) => {
                core.events.add(listener);
            },
            Ok(CoreMessage::Poison) | Err(RecvError::Disconnected) => break,
        }
    }

    core.teardown();
}

impl Core {
    async fn connect(
        &mut self,
        info: SessionInfo,
        result_tx: Sender<Result<(), ConnectionError>>,
    ) {
        if self.connection.is_some() {
            self.teardown();
        }

        self.set_connected(true);

        let attempt = Connection::new(
            info,
            &self.config,
            self.tx.clone(),
            self.connected.clone(),
            self.heartbeat.clone(),
            self.keepalive.clone(),
        )
        .await;

        match attempt {
            Ok(connection) => {
                self.connection = Some(connection);

                // Other side may not be listening: this is fine.
                drop(result_tx.send(Ok(())));
            },
            Err(why) => {
                warn!("Voice connection attempt failed: {}.", why);
                self.teardown();

                // See above.
                drop(result_tx.send(Err(why)));
            },
        }
    }

    /// Winds down the session: background tasks first, then the
    /// connected-state edge. Safe to call with no session live.
    fn teardown(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            drop(connection.ws.send(WsMessage::Poison));
            connection.udp.stop();
        }

        self.heartbeat.cancel();
        self.keepalive.cancel();

        self.set_connected(false);
    }

    fn set_connected(&mut self, now_connected: bool) {
        let was = self.connected.swap(now_connected, Ordering::AcqRel);
        if was == now_connected {
            return;
        }

        if now_connected {
            self.events.fire_connected();
        } else {
            self.events.fire_disconnected();
        }
    }

    fn handle_gateway_event(&mut self, ev: GatewayEvent) {
        match ev {
            GatewayEvent::Speaking(ev) => {
                if let Some(user_id) = ev.user_id {
                    self.ssrc_tracker.observe(user_id, ev.ssrc);
                }

                self.events.fire_speaking(&ev);
            },
            GatewayEvent::HeartbeatAck(ack) => {
                trace!("Heartbeat ACK received, nonce {}.", ack.nonce);
            },
            GatewayEvent::ClientDisconnect(ev) => {
                trace!("User {} left the call.", ev.user_id);
                self.ssrc_tracker.forget_user(ev.user_id);
            },
            other => {
                trace!("Received other gateway event: {:?}.", other);
            },
        }
    }

    async fn send_opus(&mut self, frame: &[u8]) {
        if !self.connected.load(Ordering::Acquire) {
            return;
        }

        let Some(connection) = self.connection.as_mut() else {
            return;
        };

        if let Err(e) = connection.udp.send_encrypted(frame).await {
            warn!("Failed to send voice packet: {:?}.", e);
        }
    }

    /// Authenticates one datagram from the receive loop and hands the
    /// plaintext to the audio subsystem.
    ///
    /// Undecryptable or undersized packets are dropped without touching
    /// session state; received traffic is adversarial input.
    fn feed_inbound(&mut self, mut packet: BytesMut) {
        let Some(connection) = &self.connection else {
            return;
        };

        let Some(ssrc) = RtpPacket::new(&packet[..]).map(|rtp| rtp.get_ssrc()) else {
            trace!("Undersized voice packet dropped.");
            return;
        };

        match crypto::decrypt_in_place(packet.as_mut(), &connection.cipher) {
            Ok(body_start) => {
                let payload_start = RtpPacket::minimum_packet_size() + body_start;
                self.config
                    .audio_sink
                    .feed_opus(ssrc, &packet[payload_start..]);
            },
            Err(_) => {
                trace!("Dropped undecryptable voice packet (ssrc {}).", ssrc);
            },
        }
    }
}
