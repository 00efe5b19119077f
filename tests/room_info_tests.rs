// Integration tests for room info lookup and stream variant selection

mod common;

use anyhow::Result;
use common::{live_room, room_payload, FakePlatform};
use live_recorder::resolve::{select_variant, RoomInfoProvider, RoomStatus};
use live_recorder::LiveError;
use serde_json::json;
use std::collections::BTreeMap;

fn variants(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_primary_lookup_populates_room_info() -> Result<()> {
    let platform = FakePlatform::new();
    platform.set_room("778899", live_room());
    let provider = RoomInfoProvider::new(platform.clone());

    let info = provider.fetch("778899").await?;
    assert_eq!(info.room_id, "778899");
    assert_eq!(info.status, RoomStatus::Live);
    assert_eq!(info.title, "Test stream");
    assert_eq!(info.host_nickname, "tester");
    assert_eq!(info.variants.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_falls_back_to_webcast_lookup() -> Result<()> {
    let platform = FakePlatform::new();
    platform.set_webcast_room(
        "5566",
        json!({
            "status_code": 0,
            "data": {
                "data": [{
                    "status": 4,
                    "title": "Replay",
                    "user_count_str": "2万",
                    "stream_url": {}
                }],
                "user": {"nickname": "backup"}
            }
        }),
    );
    let provider = RoomInfoProvider::new(platform.clone());

    let info = provider.fetch("5566").await?;
    assert_eq!(info.status, RoomStatus::Ended);
    assert_eq!(info.host_nickname, "backup");
    assert_eq!(info.viewer_count, 20_000);
    assert!(info.variants.is_empty());
    assert_eq!(platform.room_calls(), 1, "Primary lookup is tried first");
    Ok(())
}

#[tokio::test]
async fn test_unavailable_when_every_source_fails() -> Result<()> {
    let platform = FakePlatform::new();
    platform.set_room("1", json!({"status_code": 10011, "data": {}}));
    let provider = RoomInfoProvider::new(platform.clone());

    let err = provider.fetch("1").await.unwrap_err();
    match err {
        LiveError::RoomInfoUnavailable { room_id, reason } => {
            assert_eq!(room_id, "1");
            assert!(reason.contains("room_lookup"), "reason: {}", reason);
            assert!(reason.contains("webcast_lookup"), "reason: {}", reason);
        }
        other => panic!("unexpected error {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_offline_room_keeps_status() -> Result<()> {
    let platform = FakePlatform::new();
    platform.set_room("42", room_payload(0, &[]));
    let provider = RoomInfoProvider::new(platform.clone());

    let info = provider.fetch("42").await?;
    assert_eq!(info.status, RoomStatus::Offline);
    assert!(!info.status.is_live());
    Ok(())
}

#[test]
fn test_select_variant_prefers_higher_quality() {
    let map = variants(&[("HD1", "u1"), ("SD1", "u2")]);
    let selected = select_variant("1", &map).unwrap();
    assert_eq!(selected.url, "u1");
    assert_eq!(selected.quality, "HD1");

    let map = variants(&[("SD1", "a"), ("FULL_HD1", "b"), ("SD2", "c")]);
    assert_eq!(select_variant("1", &map).unwrap().url, "b");
}

#[test]
fn test_select_variant_uses_lowest_listed_quality() {
    let map = variants(&[("SD2", "u3")]);
    assert_eq!(select_variant("1", &map).unwrap().url, "u3");
}

#[test]
fn test_select_variant_accepts_unknown_labels_deterministically() {
    let map = variants(&[("ORIGION", "x"), ("LD", "y")]);
    let first = select_variant("1", &map).unwrap();
    assert_eq!(first.quality, "LD");
    assert_eq!(select_variant("1", &map).unwrap(), first);
}

#[test]
fn test_select_variant_empty_map_has_no_stream() {
    let err = select_variant("9", &BTreeMap::new()).unwrap_err();
    assert_eq!(err, LiveError::NoStreamAvailable("9".to_string()));
}
