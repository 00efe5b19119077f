use std::sync::Arc;
use tracing::{debug, warn};

use super::settings::MonitorSettings;
use crate::resolve::{RoomInfoProvider, RoomStatus};

/// Outcome of one status poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorVerdict {
    /// Room is still broadcasting
    Live,
    /// Room reported a non-live status
    Ended(RoomStatus),
    /// Every attempt failed; treated as end of stream
    Exhausted(String),
}

impl MonitorVerdict {
    pub fn is_live(&self) -> bool {
        matches!(self, MonitorVerdict::Live)
    }
}

/// Periodically checks whether a recording room is still live
pub struct RoomStatusMonitor {
    provider: Arc<RoomInfoProvider>,
    settings: MonitorSettings,
}

impl RoomStatusMonitor {
    pub fn new(provider: Arc<RoomInfoProvider>, settings: MonitorSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Sleep one poll interval, then check
    pub async fn next_verdict(&self, room_id: &str) -> MonitorVerdict {
        tokio::time::sleep(self.settings.poll_interval).await;
        self.check(room_id).await
    }

    /// Poll the room now, retrying failed fetches with backoff
    ///
    /// Only `max_attempts` consecutive failures end the stream.
    pub async fn check(&self, room_id: &str) -> MonitorVerdict {
        let attempts = self.settings.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.provider.fetch(room_id).await {
                Ok(info) if info.status.is_live() => {
                    debug!("Room {} still live ({} viewers)", room_id, info.viewer_count);
                    return MonitorVerdict::Live;
                }
                Ok(info) => return MonitorVerdict::Ended(info.status),
                Err(e) => {
                    warn!(
                        "Status poll for room {} failed (attempt {}/{}): {}",
                        room_id, attempt, attempts, e
                    );
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.backoff * attempt).await;
                    }
                }
            }
        }

        MonitorVerdict::Exhausted(last_error)
    }
}
