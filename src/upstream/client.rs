use anyhow::{Context, Result};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::platform::{LivePlatform, UpstreamError, UserProfile};
use super::settings::UpstreamSettings;

/// `reqwest`-backed live platform client
pub struct HttpPlatform {
    client: Client,
    settings: UpstreamSettings,
    webcast_id_pattern: Regex,
}

impl HttpPlatform {
    pub fn new(settings: UpstreamSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            REFERER,
            HeaderValue::from_str(&settings.referer).context("Invalid referer header")?,
        );
        if !settings.cookie.is_empty() {
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&settings.cookie).context("Invalid cookie header")?,
            );
        }

        let mut builder = Client::builder()
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .timeout(settings.timeout);

        if let Some(proxy) = &settings.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy).context("Invalid proxy URL")?);
        }

        let client = builder.build().context("Failed to build HTTP client")?;
        let webcast_id_pattern = Regex::new(r"(?:live\.douyin\.com|/reflow)/(\d+)")
            .context("Invalid webcast id pattern")?;

        Ok(Self {
            client,
            settings,
            webcast_id_pattern,
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value, UpstreamError> {
        debug!("GET {}", url);
        let resp = self.client.get(url).send().await.map_err(classify)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound(url.to_string()));
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::Transient(format!("{} returned {}", url, status)));
        }
        if !status.is_success() {
            return Err(UpstreamError::Malformed(format!("{} returned {}", url, status)));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))
    }
}

fn classify(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        UpstreamError::Transient(err.to_string())
    } else {
        UpstreamError::Malformed(err.to_string())
    }
}

fn fill(template: &str, key: &str, value: &str) -> String {
    template.replace(&format!("{{{}}}", key), value)
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    user: Option<ProfileUser>,
}

#[derive(Debug, Deserialize)]
struct ProfileUser {
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    room_id: Option<u64>,
    #[serde(default)]
    room_id_str: Option<String>,
    #[serde(default)]
    live_status: Option<i64>,
}

#[async_trait::async_trait]
impl LivePlatform for HttpPlatform {
    async fn room_by_id(&self, room_id: &str) -> Result<Value, UpstreamError> {
        let url = fill(&self.settings.room_info_url, "room_id", room_id);
        self.get_json(&url).await
    }

    async fn webcast_room(&self, web_rid: &str) -> Result<Value, UpstreamError> {
        let url = fill(&self.settings.webcast_url, "web_rid", web_rid);
        self.get_json(&url).await
    }

    async fn resolve_webcast_id(&self, url: &str) -> Result<String, UpstreamError> {
        debug!("Resolving webcast id for {}", url);
        let resp = self.client.get(url).send().await.map_err(classify)?;

        if resp.status().is_server_error() {
            return Err(UpstreamError::Transient(format!(
                "{} returned {}",
                url,
                resp.status()
            )));
        }

        // Short links redirect to the live room; the id sits in the final URL
        let final_url = resp.url().as_str().to_string();
        self.webcast_id_pattern
            .captures(&final_url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| UpstreamError::NotFound(format!("no webcast id in {}", final_url)))
    }

    async fn user_profile(&self, sec_user_id: &str) -> Result<UserProfile, UpstreamError> {
        let url = fill(&self.settings.profile_url, "sec_user_id", sec_user_id);
        let payload = self.get_json(&url).await?;

        let parsed: ProfileResponse = serde_json::from_value(payload)
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        let user = parsed
            .user
            .filter(|u| !u.nickname.is_empty())
            .ok_or_else(|| UpstreamError::NotFound(format!("user {}", sec_user_id)))?;

        let room_id = user
            .room_id_str
            .filter(|id| !id.is_empty() && id != "0")
            .or_else(|| user.room_id.filter(|id| *id != 0).map(|id| id.to_string()));

        Ok(UserProfile {
            nickname: user.nickname,
            is_live: room_id.is_some() && user.live_status.map_or(true, |s| s == 1),
            room_id,
        })
    }
}
