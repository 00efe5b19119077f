use std::time::Duration;

/// Configuration for the upstream platform client
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub user_agent: String,
    pub referer: String,
    /// Raw `Cookie` header value sent with every request (may be empty)
    pub cookie: String,
    pub proxy: Option<String>,
    pub timeout: Duration,

    /// Attempts for the webcast-id lookup (transient errors only)
    pub resolve_attempts: u32,
    pub resolve_backoff: Duration,

    /// Base used to turn a bare webcast handle into a live URL
    pub live_base_url: String,

    /// Endpoint templates; `{room_id}`, `{web_rid}` and `{sec_user_id}` are substituted
    pub room_info_url: String,
    pub webcast_url: String,
    pub profile_url: String,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            referer: "https://www.douyin.com/".to_string(),
            cookie: String::new(),
            proxy: None,
            timeout: Duration::from_secs(30),
            resolve_attempts: 3,
            resolve_backoff: Duration::from_millis(500),
            live_base_url: "https://live.douyin.com".to_string(),
            room_info_url: "https://webcast.amemv.com/webcast/room/reflow/info/?type_id=0&live_id=1&app_id=1128&room_id={room_id}".to_string(),
            webcast_url: "https://live.douyin.com/webcast/room/web/enter/?aid=6383&app_name=douyin_web&device_platform=web&web_rid={web_rid}".to_string(),
            profile_url: "https://www.douyin.com/aweme/v1/web/user/profile/other/?aid=6383&device_platform=webapp&sec_user_id={sec_user_id}".to_string(),
        }
    }
}
