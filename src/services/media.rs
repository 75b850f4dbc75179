mod jellyfin;

pub use jellyfin::JellyfinClient;

use crate::models::profile::Template;
use crate::models::users::RemoteUser;
use async_trait::async_trait;
use lobby_macros::LobbyBusinessError;

/// Failure of a call to the media server. Transport failures and non-success
/// statuses are kept apart so callers can report either.
#[derive(Debug, Clone, thiserror::Error, LobbyBusinessError)]
pub enum MediaError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("media server responded with {0}")]
    Status(u16),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid media server configuration: {0}")]
    InvalidConfig(String),
}

impl MediaError {
    /// The status code to print in per-target error maps, 0 when none was received.
    pub fn status(&self) -> u16 {
        match self {
            Self::Status(s) => *s,
            _ => 0,
        }
    }
}

pub type MediaResult<T> = Result<T, MediaError>;

#[async_trait]
pub trait MediaServer: Send + Sync {
    async fn create_user(&self, username: &str, password: &str) -> MediaResult<RemoteUser>;
    async fn delete_user(&self, user_id: &str) -> MediaResult<()>;
    async fn user_by_name(&self, username: &str) -> MediaResult<Option<RemoteUser>>;
    async fn user_by_id(&self, user_id: &str) -> MediaResult<RemoteUser>;
    async fn list_users(&self) -> MediaResult<Vec<RemoteUser>>;
    async fn set_policy(&self, user_id: &str, policy: &Template) -> MediaResult<()>;
    async fn set_configuration(&self, user_id: &str, configuration: &Template) -> MediaResult<()>;
    async fn get_display_preferences(&self, user_id: &str) -> MediaResult<Template>;
    async fn set_display_preferences(&self, user_id: &str, prefs: &Template) -> MediaResult<()>;
    /// Forces the next user listing to hit the server.
    async fn invalidate_user_cache(&self);
}
