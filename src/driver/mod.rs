//! Runner for a voice connection.
//!
//! The client splits a session across five cooperating tasks: a core
//! event loop owning all protocol state, a WebSocket poll task, a UDP
//! receive task, and the two liveness loops (control-plane heartbeat,
//! data-plane keepalive). Everything else communicates with the state
//! machine over one message channel, so transitions never race.

mod config;
pub(crate) mod connection;
mod crypto;
pub(crate) mod tasks;
pub mod timer;
mod udp;

pub use config::{Config, DEFAULT_DRIVER_TIMEOUT};
pub use connection::error::{Error, Result};

use crate::{
    events::Listener,
    info::SessionInfo,
    model::{id::UserId, payload::Speaking},
};
use flume::Sender;
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tasks::message::{CoreMessage, SsrcTracker};
use tracing::instrument;

/// The control object for a Discord voice connection.
///
/// A client drives at most one voice session at a time; [`start`] on a
/// live client replaces its session. Creating the client spawns its
/// background tasks, so a tokio runtime must be current.
///
/// [`start`]: VoiceClient::start
pub struct VoiceClient {
    sender: Sender<CoreMessage>,
    connected: Arc<AtomicBool>,
    ssrc_tracker: Arc<SsrcTracker>,
}

impl fmt::Debug for VoiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceClient")
            .field("connected", &self.is_connected())
            .field("ssrc_tracker", &self.ssrc_tracker)
            .finish_non_exhaustive()
    }
}

impl VoiceClient {
    /// Creates a new voice client around the given configuration.
    ///
    /// This will create the core voice tasks in the background.
    #[inline]
    pub fn new(config: Config) -> Self {
        let (tx, rx) = flume::unbounded();
        let connected = Arc::new(AtomicBool::new(false));
        let ssrc_tracker = Arc::new(SsrcTracker::default());

        tasks::start(
            config,
            rx,
            tx.clone(),
            connected.clone(),
            ssrc_tracker.clone(),
        );

        VoiceClient {
            sender: tx,
            connected,
            ssrc_tracker,
        }
    }

    /// Connects to the voice server named by `info`, resolving once the
    /// handshake has succeeded or failed.
    ///
    /// Connection state flips on entry, before the handshake: observers
    /// see a `connected` edge when the attempt begins and a
    /// `disconnected` edge if it fails.
    #[instrument(skip(self))]
    pub async fn start(&self, info: SessionInfo) -> Result<()> {
        let (tx, rx) = flume::bounded(1);

        self.sender
            .send(CoreMessage::Connect(info, tx))
            .map_err(|_| Error::AttemptDiscarded)?;

        rx.recv_async().await.map_err(|_| Error::AttemptDiscarded)?
    }

    /// Ends the current session, if any: background tasks stop, timers
    /// cancel, and the `disconnected` edge fires exactly once.
    ///
    /// Idempotent, and safe to call from any thread.
    #[instrument(skip(self))]
    pub fn stop(&self) {
        drop(self.sender.send(CoreMessage::Disconnect));
    }

    /// Whether a session is currently live.
    ///
    /// Set on [`start`], cleared by [`stop`] or a gateway close.
    ///
    /// [`start`]: VoiceClient::start
    /// [`stop`]: VoiceClient::stop
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Looks up the RTP source currently bound to `user_id`, learned
    /// from Speaking events.
    pub fn ssrc_of_user(&self, user_id: UserId) -> Option<u32> {
        self.ssrc_tracker.ssrc_of_user(user_id)
    }

    /// Looks up the user currently bound to an RTP source.
    pub fn user_of_ssrc(&self, ssrc: u32) -> Option<UserId> {
        self.ssrc_tracker.user_of_ssrc(ssrc)
    }

    /// Queues one encoded Opus frame for transmission.
    ///
    /// Frames are framed as RTP, encrypted, and sent in submission order;
    /// dropped silently when no session is live.
    pub fn send_opus(&self, frame: Vec<u8>) {
        drop(self.sender.send(CoreMessage::OpusFrame(frame)));
    }

    /// Announces the client's microphone state to the voice server.
    pub fn set_speaking(&self, is_speaking: bool) {
        drop(self.sender.send(CoreMessage::SetSpeaking(is_speaking)));
    }

    /// Registers a callback fired when a session begins.
    pub fn on_connected<F>(&self, listener: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.add_listener(Listener::Connected(Box::new(listener)));
    }

    /// Registers a callback fired when a session ends.
    pub fn on_disconnected<F>(&self, listener: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.add_listener(Listener::Disconnected(Box::new(listener)));
    }

    /// Registers a callback fired for each Speaking event observed on
    /// the gateway.
    pub fn on_speaking<F>(&self, listener: F)
    where
        F: FnMut(&Speaking) + Send + 'static,
    {
        self.add_listener(Listener::Speaking(Box::new(listener)));
    }

    fn add_listener(&self, listener: Listener) {
        drop(self.sender.send(CoreMessage::AddListener(listener)));
    }
}

impl Drop for VoiceClient {
    /// Tears down any live session and stops the core loop.
    fn drop(&mut self) {
        drop(self.sender.send(CoreMessage::Poison));
    }
}
