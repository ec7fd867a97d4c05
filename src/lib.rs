#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! Warbler is a standalone client core for Discord voice calls, written
//! in Rust. The library owns the two halves of a voice session:
//!  * The control plane: a WebSocket connection to a voice gateway,
//!  covering the identify/ready handshake, encryption negotiation,
//!  heartbeating, and speaker bookkeeping.
//!  * The data plane: a UDP socket carrying RTP-framed,
//!  XSalsa20-Poly1305-sealed Opus audio in both directions, including IP
//!  discovery and NAT keepalives.
//!
//! Opus itself stays outside: the embedder supplies encoded frames via
//! [`VoiceClient::send_opus`] and receives decrypted inbound payloads
//! through an [`AudioSink`] of its choosing. Session credentials
//! (endpoint, session id, token) are obtained out-of-band from Discord's
//! main gateway and handed over in a [`SessionInfo`].
//!
//! Reconnect policy also stays outside; a closed session surfaces as a
//! single `disconnected` edge, and the embedder decides whether to call
//! [`VoiceClient::start`] again.

pub mod audio;
pub mod constants;
pub mod driver;
pub mod error;
mod events;
mod info;
pub mod model;
mod ws;

pub use crate::{
    audio::AudioSink,
    driver::{Config, VoiceClient},
    info::SessionInfo,
    model::{
        id::{GuildId, UserId},
        payload::Speaking,
        SpeakingState,
    },
};
