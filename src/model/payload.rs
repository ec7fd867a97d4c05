//! Message bodies used in gateway event-handling.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::id::*;
use super::speaking_state::SpeakingState;

/// Used to begin a voice websocket connection.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Identify {
    /// GuildId which the target voice channel belongs to.
    pub server_id: GuildId,
    /// Authentication session received from Discord's main gateway as part of a
    /// `"VOICE_STATE_UPDATE"` message.
    pub session_id: String,
    /// Authentication token received from Discord's main gateway as part of a
    /// `"VOICE_SERVER_UPDATE"` message.
    pub token: String,
    /// UserId of the client who is connecting.
    pub user_id: UserId,
    /// Whether the client intends to negotiate video streams.
    ///
    /// Always sent as `true`; the field reservation is kept even though
    /// this library carries no video traffic.
    pub video: bool,
    /// Video stream slots reserved by the client.
    pub streams: Vec<StreamRequest>,
}

/// A video stream slot reserved in an [`Identify`] message.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct StreamRequest {
    /// Stream kind; `"video"` is the only known value.
    #[serde(rename = "type")]
    pub kind: String,
    /// Stream resolution identifier.
    pub rid: String,
    /// Requested stream quality, out of 100.
    pub quality: u32,
}

impl Default for StreamRequest {
    fn default() -> Self {
        Self {
            kind: "video".into(),
            rid: "100".into(),
            quality: 100,
        }
    }
}

/// Used to select the voice protocol and encryption mechanism.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SelectProtocol {
    /// Transport protocol.
    ///
    /// Currently, `"udp"` is the only known accepted value.
    pub protocol: String,
    /// IP address of the client as seen by the voice server, found
    /// via IP discovery.
    pub address: IpAddr,
    /// UDP source port of the client as seen by the voice server, as above.
    pub port: u16,
    /// The client's chosen encryption mode (from those offered by the server).
    pub mode: String,
    /// Duplicate of the negotiated transport parameters.
    ///
    /// The voice servers read the nested form; the flattened fields
    /// above are retained for older gateway revisions.
    pub data: ProtocolData,
}

/// The client's response to a connection offer.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ProtocolData {
    /// IP address of the client as seen by the voice server.
    pub address: IpAddr,
    /// UDP source port of the client as seen by the voice server.
    pub port: u16,
    /// The client's chosen encryption mode.
    pub mode: String,
}

/// RTP server's connection offer and supported encryption modes.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Ready {
    /// IP address of the call's allocated RTP server.
    pub ip: IpAddr,
    /// Destination port on the call's allocated RTP server.
    pub port: u16,
    /// RTP synchronisation source assigned by the server to the client.
    pub ssrc: u32,
    /// Set of voice encryption modes offered by the server.
    pub modes: Vec<String>,
    /// Server-side experiment flags active for this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiments: Option<Vec<String>>,
    /// Video streams allocated against the slots reserved at identification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streams: Option<Vec<StreamInfo>>,
}

/// A video stream allocation within a [`Ready`] message.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct StreamInfo {
    /// Whether the stream is actively transmitting.
    pub active: bool,
    /// Allocated stream quality, out of 100.
    pub quality: u32,
    /// Stream resolution identifier.
    pub rid: String,
    /// RTP synchronisation source for the stream's retransmissions.
    pub rtx_ssrc: u32,
    /// RTP synchronisation source for the stream.
    pub ssrc: u32,
    /// Stream kind; `"video"` is the only known value.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Periodic message used to keep the websocket connection alive.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Heartbeat {
    /// Opaque nonce returned by the server in its acknowledgement.
    pub nonce: u64,
}

/// Acknowledgement from the server for a prior voice heartbeat.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HeartbeatAck {
    /// The nonce of the acknowledged heartbeat.
    pub nonce: u64,
}

/// Server's confirmation of a negotiated encryption scheme.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SessionDescription {
    /// The negotiated encryption mode.
    pub mode: String,
    /// Key used for encryption of RTP payloads using the chosen mode.
    pub secret_key: Vec<u8>,
}

/// Used to indicate which users are speaking, or to inform Discord that the client is now speaking.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Speaking {
    /// Function currently unknown.
    ///
    /// Set to `Some(0)` when sending this message as a client.
    pub delay: Option<u32>,
    /// How/whether a user has started/stopped speaking.
    pub speaking: SpeakingState,
    /// RTP synchronisation source of the speaker.
    pub ssrc: u32,
    /// User ID of the speaker, included in messages *received from* the server.
    ///
    /// Used alongside the SSRC to map individual packets to their sender.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

/// Sent by the client after a disconnect to attempt to resume a session.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Resume {
    /// GuildId which the target voice channel belongs to.
    pub server_id: GuildId,
    /// Authentication session for the connection being resumed.
    pub session_id: String,
    /// Authentication token for the connection being resumed.
    pub token: String,
}

/// Used to determine how often the client must send a heartbeat.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Hello {
    /// Number of milliseconds to wait between sending heartbeat messages.
    ///
    /// The server reports this as a float.
    pub heartbeat_interval: f64,
}

/// Status update in the current channel, indicating that a user has disconnected.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ClientDisconnect {
    /// User ID of the user who left.
    pub user_id: UserId,
}
