use crate::model::id::{GuildId, UserId};
use std::fmt;

/// Parameters needed to start communicating with a Discord voice server.
///
/// All fields arrive over Discord's main gateway, split across the
/// `"VOICE_STATE_UPDATE"` and `"VOICE_SERVER_UPDATE"` messages, and are
/// immutable for the lifetime of a session.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct SessionInfo {
    /// URL of the voice websocket gateway server assigned to this call.
    pub endpoint: String,
    /// ID of the target voice channel's parent guild.
    pub server_id: GuildId,
    /// Unique string describing this session for validation/authentication purposes.
    pub session_id: String,
    /// Ephemeral secret used to validate the above session.
    pub token: String,
    /// UserID of this client.
    pub user_id: UserId,
}

impl fmt::Debug for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInfo")
            .field("endpoint", &self.endpoint)
            .field("server_id", &self.server_id)
            .field("session_id", &self.session_id)
            .field("token", &"<secret>")
            .field("user_id", &self.user_id)
            .finish()
    }
}
