//! Listener registration and dispatch.
//!
//! Each observable signal is a registration method on [`VoiceClient`];
//! registered callbacks run on the client's event loop, in registration
//! order, so they see protocol state transitions serialized.
//!
//! [`VoiceClient`]: crate::VoiceClient

use crate::model::payload::Speaking;

/// A registered callback, en route to the event loop.
pub(crate) enum Listener {
    Connected(Box<dyn FnMut() + Send>),
    Disconnected(Box<dyn FnMut() + Send>),
    Speaking(Box<dyn FnMut(&Speaking) + Send>),
}

/// Callback storage owned by the event loop.
#[derive(Default)]
pub(crate) struct EventRegistry {
    connected: Vec<Box<dyn FnMut() + Send>>,
    disconnected: Vec<Box<dyn FnMut() + Send>>,
    speaking: Vec<Box<dyn FnMut(&Speaking) + Send>>,
}

impl EventRegistry {
    pub(crate) fn add(&mut self, listener: Listener) {
        match listener {
            Listener::Connected(f) => self.connected.push(f),
            Listener::Disconnected(f) => self.disconnected.push(f),
            Listener::Speaking(f) => self.speaking.push(f),
        }
    }

    pub(crate) fn fire_connected(&mut self) {
        for listener in &mut self.connected {
            listener();
        }
    }

    pub(crate) fn fire_disconnected(&mut self) {
        for listener in &mut self.disconnected {
            listener();
        }
    }

    pub(crate) fn fire_speaking(&mut self, ev: &Speaking) {
        for listener in &mut self.speaking {
            listener(ev);
        }
    }
}
