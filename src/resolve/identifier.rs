use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use url::Url;

use super::strategy::{Attempt, ChainError, FallbackChain, Strategy};
use crate::error::LiveError;
use crate::upstream::{LivePlatform, RetryPolicy, UpstreamSettings};

/// How an identifier was turned into a room id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionMethod {
    Direct,
    UrlPath,
    ExternalLookup,
    ProfileLookup,
}

/// A resolved identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomIdentifier {
    pub raw: String,
    pub room_id: String,
    pub method: ResolutionMethod,
}

type Resolved = (String, ResolutionMethod);

/// Turns room ids, live URLs, webcast handles and profile URLs into room ids
///
/// Strategies run cheapest first: bare digits, the URL path, the external
/// webcast-id service, then the user-profile service.
pub struct IdentifierResolver {
    chain: FallbackChain<Resolved>,
}

impl IdentifierResolver {
    pub fn new(platform: Arc<dyn LivePlatform>, settings: &UpstreamSettings) -> Self {
        let retry = RetryPolicy::new(settings.resolve_attempts, settings.resolve_backoff);
        let chain = FallbackChain::new()
            .with(DirectId)
            .with(UrlPath)
            .with(ExternalLookup {
                platform: Arc::clone(&platform),
                retry,
                live_base_url: settings.live_base_url.clone(),
            })
            .with(ProfileLookup { platform, retry });

        Self { chain }
    }

    pub async fn resolve(&self, input: &str) -> Result<RoomIdentifier, LiveError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(LiveError::InvalidIdentifier("empty identifier".to_string()));
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(LiveError::InvalidIdentifier(trimmed.to_string()));
        }

        match self.chain.run(trimmed).await {
            Ok(((room_id, method), _)) => {
                info!("Resolved {} -> room {} ({:?})", trimmed, room_id, method);
                Ok(RoomIdentifier {
                    raw: input.to_string(),
                    room_id,
                    method,
                })
            }
            Err(ChainError::Aborted(e)) => Err(e),
            Err(e @ ChainError::Exhausted(_)) => Err(LiveError::UnresolvedIdentifier(format!(
                "{} ({})",
                trimmed,
                e.summary()
            ))),
        }
    }
}

pub(crate) fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse `input` as an http(s) URL, tolerating a missing scheme
pub(crate) fn parse_url(input: &str) -> Option<Url> {
    let candidate = if input.contains("://") {
        input.to_string()
    } else if input.contains('.') && input.contains('/') {
        format!("https://{}", input)
    } else {
        return None;
    };

    Url::parse(&candidate)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
}

/// `/user/<sec_user_id>` profile paths
pub(crate) fn profile_id(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["user", id]
            if id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) =>
        {
            Some(id.to_string())
        }
        _ => None,
    }
}

struct DirectId;

#[async_trait::async_trait]
impl Strategy<Resolved> for DirectId {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn attempt(&self, input: &str) -> Attempt<Resolved> {
        if is_all_digits(input) {
            Attempt::Found((input.to_string(), ResolutionMethod::Direct))
        } else {
            Attempt::Skip
        }
    }
}

struct UrlPath;

#[async_trait::async_trait]
impl Strategy<Resolved> for UrlPath {
    fn name(&self) -> &'static str {
        "url_path"
    }

    async fn attempt(&self, input: &str) -> Attempt<Resolved> {
        let Some(url) = parse_url(input) else {
            return Attempt::Skip;
        };

        let last = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string);

        match last {
            Some(segment) if is_all_digits(&segment) => {
                Attempt::Found((segment, ResolutionMethod::UrlPath))
            }
            _ => Attempt::Skip,
        }
    }
}

struct ExternalLookup {
    platform: Arc<dyn LivePlatform>,
    retry: RetryPolicy,
    live_base_url: String,
}

#[async_trait::async_trait]
impl Strategy<Resolved> for ExternalLookup {
    fn name(&self) -> &'static str {
        "webcast_lookup"
    }

    async fn attempt(&self, input: &str) -> Attempt<Resolved> {
        let url = match parse_url(input) {
            Some(url) => url.to_string(),
            // Bare webcast handle
            None if !input.contains('/') => {
                format!("{}/{}", self.live_base_url.trim_end_matches('/'), input)
            }
            None => return Attempt::Skip,
        };

        let platform: &dyn LivePlatform = self.platform.as_ref();
        let target: &str = &url;
        match self
            .retry
            .run("webcast id lookup", move || platform.resolve_webcast_id(target))
            .await
        {
            Ok(id) if is_all_digits(&id) => Attempt::Found((id, ResolutionMethod::ExternalLookup)),
            Ok(id) => Attempt::Failed(format!("non-numeric webcast id {:?}", id)),
            Err(e) => Attempt::Failed(e.to_string()),
        }
    }
}

struct ProfileLookup {
    platform: Arc<dyn LivePlatform>,
    retry: RetryPolicy,
}

#[async_trait::async_trait]
impl Strategy<Resolved> for ProfileLookup {
    fn name(&self) -> &'static str {
        "profile_lookup"
    }

    async fn attempt(&self, input: &str) -> Attempt<Resolved> {
        let Some(url) = parse_url(input) else {
            return Attempt::Skip;
        };
        let Some(sec_user_id) = profile_id(&url) else {
            return Attempt::Skip;
        };

        let platform: &dyn LivePlatform = self.platform.as_ref();
        let user: &str = &sec_user_id;
        let profile = match self
            .retry
            .run("user profile lookup", move || platform.user_profile(user))
            .await
        {
            Ok(profile) => profile,
            Err(e) => return Attempt::Failed(e.to_string()),
        };

        match (profile.is_live, profile.room_id) {
            (true, Some(room_id)) => Attempt::Found((room_id, ResolutionMethod::ProfileLookup)),
            (true, None) => Attempt::Failed(format!(
                "user {} is live but the profile names no room",
                sec_user_id
            )),
            (false, _) => Attempt::Abort(LiveError::NotLive(format!(
                "user {} ({})",
                profile.nickname, sec_user_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_all_digits() {
        assert!(is_all_digits("778899"));
        assert!(!is_all_digits(""));
        assert!(!is_all_digits("77a"));
        assert!(!is_all_digits("-1"));
    }

    #[test]
    fn test_parse_url_accepts_missing_scheme() {
        let url = parse_url("live.example.com/123").unwrap();
        assert_eq!(url.host_str(), Some("live.example.com"));
        assert_eq!(url.path(), "/123");
    }

    #[test]
    fn test_profile_id() {
        let url = parse_url("https://www.douyin.com/user/MS4wLjABAAAA-x_y").unwrap();
        assert_eq!(profile_id(&url).as_deref(), Some("MS4wLjABAAAA-x_y"));

        let url = parse_url("https://live.douyin.com/abc").unwrap();
        assert_eq!(profile_id(&url), None);
    }

    #[test]
    fn test_parse_url_rejects_handles_and_other_schemes() {
        assert!(parse_url("abc123").is_none());
        assert!(parse_url("ftp://example.com/1").is_none());
    }
}
