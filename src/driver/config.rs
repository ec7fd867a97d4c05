use crate::audio::AudioSink;
use std::{fmt, sync::Arc, time::Duration};

/// Timeout applied to connection attempts unless overridden.
pub const DEFAULT_DRIVER_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a voice client.
#[derive(Clone)]
#[non_exhaustive]
pub struct Config {
    /// Destination for inbound Opus audio.
    ///
    /// The sink is shared with the client's event loop and must be cheap
    /// to call; see [`AudioSink`].
    pub audio_sink: Arc<dyn AudioSink>,
    /// Maximum time allowed for the voice handshake, covering the gateway
    /// exchange and IP discovery.
    ///
    /// Defaults to [`DEFAULT_DRIVER_TIMEOUT`]. If set to `None`,
    /// connection attempts will never time out.
    pub driver_timeout: Option<Duration>,
}

impl Config {
    /// Creates a configuration with default timeouts around the given
    /// audio sink.
    pub fn new(audio_sink: Arc<dyn AudioSink>) -> Self {
        Self {
            audio_sink,
            driver_timeout: Some(DEFAULT_DRIVER_TIMEOUT),
        }
    }

    /// Sets the handshake timeout.
    #[must_use]
    pub fn driver_timeout(mut self, driver_timeout: Option<Duration>) -> Self {
        self.driver_timeout = driver_timeout;
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("audio_sink", &"<dyn AudioSink>")
            .field("driver_timeout", &self.driver_timeout)
            .finish()
    }
}
