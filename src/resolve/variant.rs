use std::collections::BTreeMap;

use crate::error::LiveError;

/// Quality labels in order of preference
pub const QUALITY_PREFERENCE: [&str; 4] = ["FULL_HD1", "HD1", "SD1", "SD2"];

/// A chosen stream rendition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedVariant {
    pub quality: String,
    pub url: String,
}

/// Pick the best stream URL from a quality map
///
/// Unknown labels are accepted as a last resort (first by sorted key);
/// only an empty map fails.
pub fn select_variant(
    room_id: &str,
    variants: &BTreeMap<String, String>,
) -> Result<SelectedVariant, LiveError> {
    let preferred = QUALITY_PREFERENCE
        .iter()
        .find_map(|label| variants.get_key_value(*label));

    preferred
        .or_else(|| variants.iter().next())
        .map(|(quality, url)| SelectedVariant {
            quality: quality.clone(),
            url: url.clone(),
        })
        .ok_or_else(|| LiveError::NoStreamAvailable(room_id.to_string()))
}
