//! Datagram transport for a single voice session.
//!
//! One `UdpTransport` owns the socket shared by every data-plane concern:
//! IP discovery, keepalives, RTP transmission, and the receive loop. RTP
//! header state (sequence, timestamp, SSRC) lives here and nowhere else.

use super::{
    crypto::{self, TAG_SIZE},
    tasks::{
        error::{Error, Result},
        message::{CoreMessage, UdpRxMessage},
        udp_rx,
    },
};
use crate::constants::*;
use crypto_secretbox::{Error as CryptoError, XSalsa20Poly1305 as Cipher};
use discortp::{
    rtp::{MutableRtpPacket, RtpPacket},
    MutablePacket,
};
use flume::Sender;
use std::{
    io,
    net::{IpAddr, SocketAddr},
    num::Wrapping,
    sync::Arc,
};
use tokio::{net::UdpSocket, spawn};
use tracing::trace;

pub(crate) struct UdpTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    sequence: Wrapping<u16>,
    timestamp: Wrapping<u32>,
    ssrc: Option<u32>,
    cipher: Option<Cipher>,
    rx_control: Option<Sender<UdpRxMessage>>,
}

impl UdpTransport {
    /// Binds a fresh socket and fixes its peer to the voice server.
    ///
    /// Bind or connect failure is fatal to the session being set up.
    pub(crate) async fn connect(ip: IpAddr, port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((ip, port)).await?;
        let peer = socket.peer_addr()?;

        Ok(Self {
            socket: Arc::new(socket),
            peer,
            sequence: Wrapping(0),
            timestamp: Wrapping(0),
            ssrc: None,
            cipher: None,
            rx_control: None,
        })
    }

    /// Handle for tasks which only transmit fixed payloads (keepalive).
    pub(crate) fn socket(&self) -> Arc<UdpSocket> {
        self.socket.clone()
    }

    pub(crate) fn set_ssrc(&mut self, ssrc: u32) {
        self.ssrc = Some(ssrc);
    }

    pub(crate) fn set_secret_key(&mut self, cipher: Cipher) {
        self.cipher = Some(cipher);
    }

    /// Transmits an unframed datagram.
    ///
    /// Only IP discovery and the keepalive marker go out this way.
    pub(crate) async fn send(&self, bytes: &[u8]) -> io::Result<usize> {
        self.socket.send(bytes).await
    }

    /// Reads one datagram from the voice server, discarding traffic from
    /// any other source. Used during IP discovery, before the receive
    /// loop exists.
    pub(crate) async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let (len, addr) = self.socket.recv_from(buf).await?;
            if addr == self.peer {
                return Ok(len);
            }
            trace!("Dropped {} bytes from unexpected peer {}.", len, addr);
        }
    }

    /// Frames `payload` as encrypted RTP and transmits it.
    ///
    /// The SSRC and secret key must already be set. Sequence and timestamp
    /// advance *before* the header is built, so the first packet of a
    /// session carries sequence 1 and timestamp 480; the voice servers
    /// expect this pacing.
    pub(crate) async fn send_encrypted(&mut self, payload: &[u8]) -> Result<()> {
        let (Some(ssrc), Some(cipher)) = (self.ssrc, self.cipher.as_ref()) else {
            return Err(Error::Crypto(CryptoError));
        };

        self.sequence += Wrapping(1);
        self.timestamp += Wrapping(RTP_TIMESTAMP_STEP);

        let mut packet =
            vec![0u8; RtpPacket::minimum_packet_size() + TAG_SIZE + payload.len()];
        {
            let mut rtp = MutableRtpPacket::new(&mut packet[..])
                .expect("FATAL: Too few bytes allocated for RTP header.");
            rtp.set_version(RTP_VERSION);
            rtp.set_payload_type(RTP_PROFILE_TYPE);
            rtp.set_sequence(self.sequence.0.into());
            rtp.set_timestamp(self.timestamp.0.into());
            rtp.set_ssrc(ssrc);
            rtp.payload_mut()[TAG_SIZE..].copy_from_slice(payload);
        }

        crypto::encrypt_in_place(&mut packet, cipher)?;

        self.socket.send(&packet).await?;

        Ok(())
    }

    /// Starts the background receive loop, which forwards peer datagrams
    /// to the core loop untouched.
    pub(crate) fn run(&mut self, core: Sender<CoreMessage>) {
        let (tx, rx) = flume::unbounded();
        self.rx_control = Some(tx);

        spawn(udp_rx::runner(self.socket.clone(), self.peer, rx, core));
    }

    /// Stops the receive loop, if running.
    pub(crate) fn stop(&mut self) {
        if let Some(control) = self.rx_control.take() {
            drop(control.send(UdpRxMessage::Poison));
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crypto_secretbox::KeyInit;

    async fn loopback_pair() -> (UdpTransport, UdpSocket) {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let transport = UdpTransport::connect(addr.ip(), addr.port()).await.unwrap();

        (transport, server)
    }

    fn armed(mut transport: UdpTransport, ssrc: u32) -> UdpTransport {
        transport.set_ssrc(ssrc);
        transport.set_secret_key(Cipher::new_from_slice(&[0u8; 32]).unwrap());
        transport
    }

    #[tokio::test]
    async fn send_before_key_and_ssrc_is_rejected() {
        let (mut transport, _server) = loopback_pair().await;

        assert!(transport.send_encrypted(&SILENT_FRAME).await.is_err());
    }

    #[tokio::test]
    async fn first_packet_carries_sequence_one_timestamp_480() {
        let (transport, server) = loopback_pair().await;
        let mut transport = armed(transport, 0x2A);

        transport.send_encrypted(&SILENT_FRAME).await.unwrap();

        let mut buf = [0u8; VOICE_PACKET_MAX];
        let (len, _) = server.recv_from(&mut buf).await.unwrap();

        assert_eq!(len, 12 + TAG_SIZE + SILENT_FRAME.len());
        assert_eq!(buf[0], 0x80);
        assert_eq!(buf[1], 0x78);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 1);
        assert_eq!(u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]), 480);
        assert_eq!(u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]), 0x2A);
    }

    #[tokio::test]
    async fn counters_pace_with_each_packet() {
        let (transport, server) = loopback_pair().await;
        let mut transport = armed(transport, 1);

        for _ in 0..5 {
            transport.send_encrypted(b"x").await.unwrap();
        }

        let mut buf = [0u8; VOICE_PACKET_MAX];
        for n in 1..=5u32 {
            let (_, _) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), n as u16);
            assert_eq!(
                u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
                480 * n
            );
        }
    }

    #[tokio::test]
    async fn zero_length_payload_is_a_28_byte_datagram() {
        let (transport, server) = loopback_pair().await;
        let mut transport = armed(transport, 1);

        transport.send_encrypted(b"").await.unwrap();

        let mut buf = [0u8; VOICE_PACKET_MAX];
        let (len, _) = server.recv_from(&mut buf).await.unwrap();

        assert_eq!(len, 28);
    }

    #[tokio::test]
    async fn sequence_wraps_without_disturbing_timestamp_pacing() {
        let (transport, server) = loopback_pair().await;
        let mut transport = armed(transport, 1);
        transport.sequence = Wrapping(u16::MAX - 1);

        let mut buf = [0u8; VOICE_PACKET_MAX];
        let mut timestamps = Vec::new();
        let mut sequences = Vec::new();

        for _ in 0..3 {
            transport.send_encrypted(b"x").await.unwrap();
            server.recv_from(&mut buf).await.unwrap();
            sequences.push(u16::from_be_bytes([buf[2], buf[3]]));
            timestamps.push(u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]));
        }

        assert_eq!(sequences, vec![u16::MAX, 0, 1]);
        assert_eq!(timestamps, vec![480, 960, 1440]);
    }

    #[tokio::test]
    async fn discovery_recv_filters_foreign_peers() {
        let (transport, server) = loopback_pair().await;
        let local = {
            // Learn the transport's bound address by having it transmit.
            transport.send(b"hi").await.unwrap();
            let mut buf = [0u8; 16];
            let (_, addr) = server.recv_from(&mut buf).await.unwrap();
            addr
        };

        let stranger = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        stranger.send_to(b"not for you", local).await.unwrap();
        server.send_to(b"expected", local).await.unwrap();

        let mut buf = [0u8; 64];
        let len = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            transport.recv(&mut buf),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(&buf[..len], b"expected");
    }
}
