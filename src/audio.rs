//! Integration point for an external audio subsystem.
//!
//! The library deliberately carries no Opus codec: encoded frames come in
//! from the embedder via [`VoiceClient::send_opus`], and decrypted inbound
//! frames leave through an [`AudioSink`] supplied at construction.
//!
//! [`VoiceClient::send_opus`]: crate::VoiceClient::send_opus

/// Receiver for inbound Opus audio, injected through [`Config`].
///
/// Calls arrive on the client's event loop, one per authenticated voice
/// packet, and should hand the payload off quickly (e.g. into a decoder
/// queue) rather than block.
///
/// [`Config`]: crate::Config
pub trait AudioSink: Send + Sync {
    /// Delivers one Opus payload from the stream identified by `ssrc`.
    ///
    /// The user owning the stream, when known, can be looked up via
    /// [`VoiceClient::user_of_ssrc`].
    ///
    /// [`VoiceClient::user_of_ssrc`]: crate::VoiceClient::user_of_ssrc
    fn feed_opus(&self, ssrc: u32, payload: &[u8]);
}
