//! Constants affecting voice connection and packet handling.

use discortp::rtp::RtpType;
use std::time::Duration;

/// The voice gateway version requested by the library.
pub const VOICE_GATEWAY_VERSION: u8 = 7;

/// The encryption scheme negotiated with the voice server.
///
/// This is the only scheme the library implements.
pub const ENCRYPTION_MODE: &str = "xsalsa20_poly1305";

/// The one (and only) RTP version.
pub const RTP_VERSION: u8 = 2;

/// Profile type used by Discord's Opus audio traffic.
pub const RTP_PROFILE_TYPE: RtpType = RtpType::Dynamic(120);

/// Amount added to the RTP timestamp per transmitted packet.
///
/// Matches the pacing of the voice servers for one Opus frame.
pub const RTP_TIMESTAMP_STEP: u32 = 480;

/// Opus silent frame, used to signal speech start and end (and prevent audio glitching).
pub const SILENT_FRAME: [u8; 3] = [0xf8, 0xff, 0xfe];

/// Number of silence frames sent after key negotiation.
///
/// The voice server will not forward inbound audio until it has
/// seen outbound traffic from the client.
pub const SILENCE_PRIME_COUNT: usize = 5;

/// Maximum packet size for a voice packet.
///
/// Set a safe amount below the Ethernet MTU to avoid fragmentation/rejection.
pub const VOICE_PACKET_MAX: usize = 1460;

/// Delay between sends of UDP keepalive datagrams.
pub const UDP_KEEPALIVE_GAP_MS: u64 = 10_000;

/// Type-converted delay between sends of UDP keepalive datagrams.
pub const UDP_KEEPALIVE_GAP: Duration = Duration::from_millis(UDP_KEEPALIVE_GAP_MS);

/// Marker bytes sent as a UDP keepalive, refreshing NAT bindings
/// on paths which expire idle flows.
pub const UDP_KEEPALIVE_PAYLOAD: [u8; 2] = [0x13, 0x37];
