//! Turning user input into a live room and a playable stream
//!
//! - `strategy`: ordered fallback chain shared by the resolvers
//! - `identifier`: room ids, live URLs, webcast handles, profile URLs
//! - `room`: room status and stream variants with upstream fallback
//! - `variant`: quality selection

mod identifier;
mod room;
mod strategy;
mod variant;

pub use identifier::{IdentifierResolver, ResolutionMethod, RoomIdentifier};
pub use room::{RoomInfo, RoomInfoProvider, RoomStatus, LIVE_STATUS_CODE};
pub use strategy::{Attempt, ChainError, FallbackChain, Strategy};
pub use variant::{select_variant, SelectedVariant, QUALITY_PREFERENCE};
