use serde_json::Value;
use thiserror::Error;

/// Failure reported by an upstream call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// Network hiccup, timeout, rate limit or 5xx; worth retrying
    #[error("transient upstream error: {0}")]
    Transient(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Response arrived but could not be decoded
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl UpstreamError {
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Transient(_))
    }
}

/// What the profile service reports about a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub nickname: String,
    pub is_live: bool,
    pub room_id: Option<String>,
}

/// Upstream live platform
///
/// Request signing and cookie handling are the implementation's concern;
/// callers only see payloads and typed failures.
#[async_trait::async_trait]
pub trait LivePlatform: Send + Sync {
    /// Primary id-keyed room lookup, raw payload
    async fn room_by_id(&self, room_id: &str) -> Result<Value, UpstreamError>;

    /// Secondary generic webcast lookup, raw payload
    async fn webcast_room(&self, web_rid: &str) -> Result<Value, UpstreamError>;

    /// Exchange a live URL or short link for a room id
    async fn resolve_webcast_id(&self, url: &str) -> Result<String, UpstreamError>;

    /// Look up a user by profile id
    async fn user_profile(&self, sec_user_id: &str) -> Result<UserProfile, UpstreamError>;
}
