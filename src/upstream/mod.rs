//! Consumed upstream capabilities
//!
//! The live platform is reached through the [`LivePlatform`] trait:
//! - Room info lookup by room id (primary) and by webcast id (secondary)
//! - Webcast-id resolution for short links and live URLs
//! - User profile lookup (live flag + room id)
//!
//! [`HttpPlatform`] is the `reqwest` implementation used in production.

mod client;
mod platform;
mod retry;
mod settings;

pub use client::HttpPlatform;
pub use platform::{LivePlatform, UpstreamError, UserProfile};
pub use retry::RetryPolicy;
pub use settings::UpstreamSettings;
