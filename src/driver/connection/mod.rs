pub mod error;

use super::{
    tasks::{
        heartbeat,
        keepalive,
        message::*,
        ws::{self as ws_task, WsPoll},
    },
    timer::Waiter,
    udp::UdpTransport,
    Config,
};
use crate::{
    constants::*,
    info::SessionInfo,
    model::{
        payload::{Identify, ProtocolData, SelectProtocol, Speaking, StreamRequest},
        Event as GatewayEvent,
        SpeakingState,
    },
    ws::WsStream,
};
use crypto_secretbox::{KeyInit, XSalsa20Poly1305 as Cipher};
use discortp::discord::{IpDiscoveryPacket, IpDiscoveryType, MutableIpDiscoveryPacket};
use error::{Error, Result};
use flume::Sender;
use std::{
    net::IpAddr,
    str::FromStr,
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};
use tokio::{spawn, time::timeout};
use tracing::{debug, error, info, instrument};
use url::Url;

/// Live state for one negotiated voice session.
pub(crate) struct Connection {
    pub(crate) cipher: Cipher,
    pub(crate) udp: UdpTransport,
    pub(crate) ws: Sender<WsMessage>,
}

impl Connection {
    pub(crate) async fn new(
        info: SessionInfo,
        config: &Config,
        core: Sender<CoreMessage>,
        connected: Arc<AtomicBool>,
        heartbeat: Arc<Waiter>,
        keepalive: Arc<Waiter>,
    ) -> Result<Connection> {
        let attempt = Connection::new_inner(info, core, connected, heartbeat, keepalive);

        if let Some(t) = config.driver_timeout {
            timeout(t, attempt).await?
        } else {
            attempt.await
        }
    }

    #[instrument(skip_all, fields(endpoint = %info.endpoint))]
    async fn new_inner(
        mut info: SessionInfo,
        core: Sender<CoreMessage>,
        connected: Arc<AtomicBool>,
        heartbeat: Arc<Waiter>,
        keepalive: Arc<Waiter>,
    ) -> Result<Connection> {
        let url = generate_url(&mut info.endpoint)?;

        let mut client = WsStream::connect(url).await?;

        let (ws_msg_tx, ws_msg_rx) = flume::unbounded();

        // The gateway leads with Hello; anything else at this stage is a
        // protocol violation which we log and skip.
        let hello = loop {
            let Some(value) = client.recv_json().await? else {
                continue;
            };

            match value {
                GatewayEvent::Hello(h) => break h,
                other => {
                    debug!("Expected hello; got: {:?}", other);
                },
            }
        };

        let heartbeat_interval = Duration::from_secs_f64(hello.heartbeat_interval / 1000.0);
        heartbeat.revive();
        spawn(heartbeat::runner(
            heartbeat_interval,
            heartbeat.clone(),
            ws_msg_tx.clone(),
        ));

        client
            .send_json(&GatewayEvent::from(Identify {
                server_id: info.server_id,
                session_id: info.session_id.clone(),
                token: info.token.clone(),
                user_id: info.user_id,
                video: true,
                streams: vec![StreamRequest::default()],
            }))
            .await?;

        let ready = loop {
            let Some(value) = client.recv_json().await? else {
                continue;
            };

            match value {
                GatewayEvent::Ready(r) => break r,
                other => {
                    debug!("Expected ready; got: {:?}", other);
                },
            }
        };

        if !ready.modes.iter().any(|mode| mode == ENCRYPTION_MODE) {
            // Negotiation will fail downstream; surfaced here for diagnosis.
            error!("{} not in offered encryption modes.", ENCRYPTION_MODE);
        }

        info!(
            "Connecting to {}:{}, ssrc {}.",
            ready.ip, ready.port, ready.ssrc
        );

        let mut udp = UdpTransport::connect(ready.ip, ready.port).await?;

        keepalive.revive();
        spawn(keepalive::runner(
            udp.socket(),
            keepalive.clone(),
            connected.clone(),
        ));

        // Follow Discord's IP discovery procedure, in case NAT tunnelling is needed.
        let mut bytes = [0; IpDiscoveryPacket::const_packet_size()];
        {
            let mut view = MutableIpDiscoveryPacket::new(&mut bytes[..])
                .expect("Buffer sized by IpDiscoveryPacket::const_packet_size().");
            view.set_pkt_type(IpDiscoveryType::Request);
            view.set_length(70);
            view.set_ssrc(ready.ssrc);
        }

        udp.send(&bytes).await?;

        let len = udp.recv(&mut bytes).await?;
        {
            let view =
                IpDiscoveryPacket::new(&bytes[..len]).ok_or(Error::IllegalDiscoveryResponse)?;

            if view.get_pkt_type() != IpDiscoveryType::Response {
                return Err(Error::IllegalDiscoveryResponse);
            }

            // We could do something clever like binary search,
            // but possibility of UDP spoofing precludes us from
            // making the assumption we can find a "left edge" of '\0's.
            let nul_byte_index = view
                .get_address_raw()
                .iter()
                .position(|&b| b == 0)
                .ok_or(Error::IllegalIp)?;

            let address_str = std::str::from_utf8(&view.get_address_raw()[..nul_byte_index])
                .map_err(|_| Error::IllegalIp)?;

            let address = IpAddr::from_str(address_str).map_err(|_| Error::IllegalIp)?;

            debug!("IP discovered: {}:{}.", address, view.get_port());

            client
                .send_json(&GatewayEvent::from(SelectProtocol {
                    protocol: "udp".into(),
                    address,
                    port: view.get_port(),
                    mode: ENCRYPTION_MODE.into(),
                    data: ProtocolData {
                        address,
                        port: view.get_port(),
                        mode: ENCRYPTION_MODE.into(),
                    },
                }))
                .await?;
        }

        let cipher = init_cipher(&mut client).await?;

        udp.set_ssrc(ready.ssrc);
        udp.set_secret_key(cipher.clone());

        client
            .send_json(&GatewayEvent::from(Speaking {
                delay: Some(0),
                speaking: SpeakingState::MICROPHONE,
                ssrc: ready.ssrc,
                user_id: None,
            }))
            .await?;

        // The server will not forward audio to us until it has seen ours;
        // prime the stream before the receive loop starts.
        for _ in 0..SILENCE_PRIME_COUNT {
            udp.send_encrypted(&SILENT_FRAME).await?;
        }

        udp.run(core.clone());

        spawn(ws_task::runner(WsPoll::new(
            ws_msg_rx,
            client,
            ready.ssrc,
            core,
        )));

        info!("Connected to: {}", info.endpoint);

        Ok(Connection {
            cipher,
            udp,
            ws: ws_msg_tx,
        })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        info!("Disconnected");
    }
}

fn generate_url(endpoint: &mut String) -> Result<Url> {
    if endpoint.ends_with(":80") {
        let len = endpoint.len();

        endpoint.truncate(len - 3);
    }

    // Pre-schemed endpoints are passed through, for gateways reachable
    // without TLS (e.g. local test rigs).
    let url = if endpoint.contains("://") {
        format!("{endpoint}/?v={VOICE_GATEWAY_VERSION}")
    } else {
        format!("wss://{endpoint}/?v={VOICE_GATEWAY_VERSION}")
    };

    Url::parse(&url).or(Err(Error::EndpointUrl))
}

#[inline]
async fn init_cipher(client: &mut WsStream) -> Result<Cipher> {
    loop {
        let Some(value) = client.recv_json().await? else {
            continue;
        };

        match value {
            GatewayEvent::SessionDescription(desc) => {
                if desc.mode != ENCRYPTION_MODE {
                    return Err(Error::CryptoModeInvalid);
                }

                return Cipher::new_from_slice(&desc.secret_key)
                    .map_err(|_| Error::CryptoInvalidLength);
            },
            other => {
                debug!("Expected session description; got: {:?}", other);
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn url_gains_scheme_and_version() {
        let mut endpoint = String::from("eu-west1.discord.media");
        let url = generate_url(&mut endpoint).unwrap();

        assert_eq!(url.as_str(), "wss://eu-west1.discord.media/?v=7");
    }

    #[test]
    fn port_80_suffix_is_stripped() {
        let mut endpoint = String::from("eu-west1.discord.media:80");
        generate_url(&mut endpoint).unwrap();

        assert_eq!(endpoint, "eu-west1.discord.media");
    }

    #[test]
    fn pre_schemed_endpoint_is_kept() {
        let mut endpoint = String::from("ws://127.0.0.1:4010");
        let url = generate_url(&mut endpoint).unwrap();

        assert_eq!(url.as_str(), "ws://127.0.0.1:4010/?v=7");
    }
}
