use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::strategy::{Attempt, FallbackChain, Strategy};
use crate::error::LiveError;
use crate::upstream::LivePlatform;

/// Upstream status code meaning "broadcasting now"
pub const LIVE_STATUS_CODE: i64 = 2;
const ENDED_STATUS_CODE: i64 = 4;

/// Broadcast status of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Live,
    Offline,
    Ended,
    Unknown,
}

impl RoomStatus {
    /// Only code 2 means live; every other code is terminal for recording purposes
    pub fn from_code(code: i64) -> Self {
        match code {
            LIVE_STATUS_CODE => RoomStatus::Live,
            ENDED_STATUS_CODE => RoomStatus::Ended,
            0 | 1 | 3 => RoomStatus::Offline,
            _ => RoomStatus::Unknown,
        }
    }

    pub fn is_live(&self) -> bool {
        *self == RoomStatus::Live
    }
}

/// Snapshot of a room, always fully populated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomInfo {
    pub room_id: String,
    pub status: RoomStatus,
    pub title: String,
    pub host_nickname: String,
    pub viewer_count: u64,
    /// Quality label -> stream URL
    pub variants: BTreeMap<String, String>,
    pub fetched_at: DateTime<Utc>,
}

/// Fetches [`RoomInfo`] from the primary id-keyed lookup, falling back to
/// the generic webcast lookup
pub struct RoomInfoProvider {
    chain: FallbackChain<RoomInfo>,
}

impl RoomInfoProvider {
    pub fn new(platform: Arc<dyn LivePlatform>) -> Self {
        let chain = FallbackChain::new()
            .with(PrimaryLookup {
                platform: Arc::clone(&platform),
            })
            .with(WebcastLookup { platform });

        Self { chain }
    }

    pub async fn fetch(&self, room_id: &str) -> Result<RoomInfo, LiveError> {
        match self.chain.run(room_id).await {
            Ok((info, source)) => {
                info!(
                    "Room {} via {}: status={:?}, host={}, title={}, viewers={}",
                    info.room_id,
                    source,
                    info.status,
                    info.host_nickname,
                    info.title,
                    info.viewer_count
                );
                Ok(info)
            }
            Err(e) => Err(LiveError::RoomInfoUnavailable {
                room_id: room_id.to_string(),
                reason: e.summary(),
            }),
        }
    }
}

struct PrimaryLookup {
    platform: Arc<dyn LivePlatform>,
}

#[async_trait::async_trait]
impl Strategy<RoomInfo> for PrimaryLookup {
    fn name(&self) -> &'static str {
        "room_lookup"
    }

    async fn attempt(&self, room_id: &str) -> Attempt<RoomInfo> {
        match self.platform.room_by_id(room_id).await {
            Ok(payload) => match normalize_primary(room_id, payload) {
                Ok(info) => Attempt::Found(info),
                Err(reason) => Attempt::Failed(reason),
            },
            Err(e) => Attempt::Failed(e.to_string()),
        }
    }
}

struct WebcastLookup {
    platform: Arc<dyn LivePlatform>,
}

#[async_trait::async_trait]
impl Strategy<RoomInfo> for WebcastLookup {
    fn name(&self) -> &'static str {
        "webcast_lookup"
    }

    async fn attempt(&self, room_id: &str) -> Attempt<RoomInfo> {
        match self.platform.webcast_room(room_id).await {
            Ok(payload) => match normalize_webcast(room_id, payload) {
                Ok(info) => Attempt::Found(info),
                Err(reason) => Attempt::Failed(reason),
            },
            Err(e) => Attempt::Failed(e.to_string()),
        }
    }
}

// Upstream payload shapes

#[derive(Debug, Deserialize)]
struct PrimaryPayload {
    #[serde(default)]
    status_code: i64,
    data: PrimaryData,
}

#[derive(Debug, Deserialize)]
struct PrimaryData {
    room: RawRoom,
}

#[derive(Debug, Deserialize)]
struct WebcastPayload {
    status_code: i64,
    data: WebcastData,
}

#[derive(Debug, Deserialize)]
struct WebcastData {
    #[serde(default)]
    data: Vec<RawRoom>,
    user: Option<RawOwner>,
}

#[derive(Debug, Deserialize)]
struct RawRoom {
    status: i64,
    #[serde(default)]
    title: String,
    user_count: Option<Value>,
    user_count_str: Option<String>,
    owner: Option<RawOwner>,
    stream_url: Option<RawStreamUrl>,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    #[serde(default)]
    nickname: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawStreamUrl {
    #[serde(default)]
    flv_pull_url: BTreeMap<String, String>,
    #[serde(default)]
    hls_pull_url_map: BTreeMap<String, String>,
}

fn normalize_primary(room_id: &str, payload: Value) -> Result<RoomInfo, String> {
    let parsed: PrimaryPayload =
        serde_json::from_value(payload).map_err(|e| format!("unexpected payload: {}", e))?;
    if parsed.status_code != 0 {
        return Err(format!("status_code {}", parsed.status_code));
    }

    let room = parsed.data.room;
    let host = room
        .owner
        .as_ref()
        .map(|o| o.nickname.clone())
        .unwrap_or_default();
    Ok(build_info(room_id, room, host))
}

fn normalize_webcast(room_id: &str, payload: Value) -> Result<RoomInfo, String> {
    let parsed: WebcastPayload =
        serde_json::from_value(payload).map_err(|e| format!("unexpected payload: {}", e))?;
    if parsed.status_code != 0 {
        return Err(format!("status_code {}", parsed.status_code));
    }

    let host = parsed
        .data
        .user
        .as_ref()
        .map(|u| u.nickname.clone())
        .unwrap_or_default();
    let room = parsed
        .data
        .data
        .into_iter()
        .next()
        .ok_or_else(|| "payload contains no room".to_string())?;

    let host = if host.is_empty() {
        room.owner
            .as_ref()
            .map(|o| o.nickname.clone())
            .unwrap_or_default()
    } else {
        host
    };
    Ok(build_info(room_id, room, host))
}

fn build_info(room_id: &str, room: RawRoom, host_nickname: String) -> RoomInfo {
    let viewer_count = room
        .user_count
        .as_ref()
        .and_then(viewer_count_from_value)
        .or_else(|| room.user_count_str.as_deref().and_then(parse_viewer_count))
        .unwrap_or(0);

    // FLV renditions are preferred; HLS is used only when no FLV is offered
    let stream_url = room.stream_url.unwrap_or_default();
    let variants = if stream_url.flv_pull_url.is_empty() {
        stream_url.hls_pull_url_map
    } else {
        stream_url.flv_pull_url
    };

    RoomInfo {
        room_id: room_id.to_string(),
        status: RoomStatus::from_code(room.status),
        title: room.title,
        host_nickname,
        viewer_count,
        variants: variants
            .into_iter()
            .filter(|(_, url)| !url.is_empty())
            .collect(),
        fetched_at: Utc::now(),
    }
}

fn viewer_count_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_viewer_count(s),
        _ => None,
    }
}

/// Parses counts like `1234`, `1.2万` or `10万+`
pub(crate) fn parse_viewer_count(raw: &str) -> Option<u64> {
    let trimmed = raw.trim().trim_end_matches('+');
    if let Some(number) = trimmed.strip_suffix('万') {
        let value: f64 = number.trim().parse().ok()?;
        return Some((value * 10_000.0).round() as u64);
    }
    trimmed.parse().ok()
}
