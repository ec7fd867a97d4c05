#![allow(missing_docs)]

use crate::{
    driver::connection::error::Error as ConnectionError,
    events::Listener,
    info::SessionInfo,
    model::id::UserId,
    model::Event,
};
use bytes::BytesMut;
use dashmap::DashMap;
use flume::Sender;

/// Messages consumed by the core event loop.
///
/// Every protocol state transition happens on that loop, so the rest of
/// the system communicates exclusively through this enum.
pub enum CoreMessage {
    Connect(SessionInfo, Sender<Result<(), ConnectionError>>),
    Disconnect,
    SetSpeaking(bool),
    OpusFrame(Vec<u8>),
    WsEvent(Event),
    WsClosed(Option<u16>),
    UdpData(BytesMut),
    AddListener(Listener),
    Poison,
}

/// Control messages for the WebSocket poll task.
pub enum WsMessage {
    Heartbeat(u64),
    Speaking(bool),
    Poison,
}

/// Control messages for the UDP receive task.
pub enum UdpRxMessage {
    Poison,
}

/// Shared record of which SSRC belongs to which user, fed by Speaking
/// events on the gateway.
#[derive(Debug, Default)]
pub struct SsrcTracker {
    user_ssrc_map: DashMap<UserId, u32>,
}

impl SsrcTracker {
    /// Binds `ssrc` to `user_id`, unbinding it from any other user.
    ///
    /// An SSRC names at most one user at a time; the last Speaking
    /// event wins.
    pub fn observe(&self, user_id: UserId, ssrc: u32) {
        self.user_ssrc_map
            .retain(|uid, known| *known != ssrc || *uid == user_id);
        self.user_ssrc_map.insert(user_id, ssrc);
    }

    /// Drops any binding held by `user_id`.
    pub fn forget_user(&self, user_id: UserId) {
        self.user_ssrc_map.remove(&user_id);
    }

    pub fn ssrc_of_user(&self, user_id: UserId) -> Option<u32> {
        self.user_ssrc_map.get(&user_id).map(|entry| *entry.value())
    }

    pub fn user_of_ssrc(&self, ssrc: u32) -> Option<UserId> {
        self.user_ssrc_map
            .iter()
            .find(|entry| *entry.value() == ssrc)
            .map(|entry| *entry.key())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn last_speaker_claims_a_reused_ssrc() {
        let tracker = SsrcTracker::default();

        tracker.observe(UserId(1), 7);
        tracker.observe(UserId(2), 7);

        assert_eq!(tracker.ssrc_of_user(UserId(1)), None);
        assert_eq!(tracker.ssrc_of_user(UserId(2)), Some(7));
        assert_eq!(tracker.user_of_ssrc(7), Some(UserId(2)));
    }

    #[test]
    fn rebinding_a_user_keeps_one_entry_per_side() {
        let tracker = SsrcTracker::default();

        tracker.observe(UserId(1), 7);
        tracker.observe(UserId(1), 8);

        assert_eq!(tracker.ssrc_of_user(UserId(1)), Some(8));
        assert_eq!(tracker.user_of_ssrc(7), None);
        assert_eq!(tracker.user_of_ssrc(8), Some(UserId(1)));
    }

    #[test]
    fn forgetting_a_user_clears_the_binding() {
        let tracker = SsrcTracker::default();

        tracker.observe(UserId(5), 99);
        tracker.forget_user(UserId(5));

        assert_eq!(tracker.ssrc_of_user(UserId(5)), None);
        assert_eq!(tracker.user_of_ssrc(99), None);
    }
}
