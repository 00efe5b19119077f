// Integration tests for the REST API
//
// Requests go through the router in-process; no socket is opened.

mod common;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{
    live_room, quiet_monitor, recording_settings, upstream_settings, FakeBackend, FakePlatform,
};
use live_recorder::{create_router, AppState, LiveService};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

fn app(temp_dir: &TempDir) -> (Router, LiveService) {
    let platform = FakePlatform::new();
    platform.set_room("778899", live_room());
    platform.add_webcast_id("https://v.douyin.com/xyz/", "778899");
    let backend = FakeBackend::new(Duration::from_millis(20));

    let service = LiveService::new(
        platform,
        backend,
        &upstream_settings(),
        recording_settings(temp_dir.path()),
        quiet_monitor(),
    );
    (create_router(AppState::new(service.clone())), service)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => request.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Ok((status, json))
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (app, _) = app(&temp_dir);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_download_lifecycle() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (app, service) = app(&temp_dir);

    let (status, body) = send(&app, "POST", "/livestreams/users/778899/download", None).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["job_id"], "778899");
    assert_eq!(body["method"], "DIRECT");
    assert!(body["output_path"].as_str().is_some());

    // Same room through a short link is a duplicate
    let (status, body) = send(
        &app,
        "POST",
        "/livestreams/download",
        Some(json!({"identifier": "https://v.douyin.com/xyz/"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "ALREADY_RECORDING");

    let (status, body) = send(&app, "GET", "/livestreams/operations/778899", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "RECORDING");

    let (status, body) = send(&app, "GET", "/livestreams/operations", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    tokio::time::sleep(Duration::from_millis(60)).await;
    let (status, body) = send(&app, "POST", "/livestreams/operations/778899/cancel", None).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["cancel_requested"], true);

    let finished = tokio::time::timeout(Duration::from_secs(10), service.jobs().wait("778899")).await??;
    assert!(finished.state.is_terminal());

    let (status, body) = send(&app, "GET", "/livestreams/operations/778899", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], serde_json::to_value(finished.state)?);
    Ok(())
}

#[tokio::test]
async fn test_download_with_custom_output_path() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (app, service) = app(&temp_dir);

    let (status, body) = send(
        &app,
        "POST",
        "/livestreams/users/778899/download",
        Some(json!({"output_path": "../outside.ts"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_OUTPUT_PATH");

    let (status, body) = send(
        &app,
        "POST",
        "/livestreams/users/778899/download",
        Some(json!({"output_path": "shows/tonight.ts"})),
    )
    .await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    let expected = temp_dir.path().join("shows/tonight.ts");
    assert_eq!(body["output_path"], expected.display().to_string());

    service.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_unknown_operation_is_404() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (app, _) = app(&temp_dir);

    let (status, body) = send(&app, "GET", "/livestreams/operations/424242", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "JOB_NOT_FOUND");

    let (status, _) = send(&app, "POST", "/livestreams/operations/424242/cancel", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_room_lookup() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (app, _) = app(&temp_dir);

    let (status, body) = send(&app, "GET", "/livestreams/rooms/778899", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identifier"]["method"], "DIRECT");
    assert_eq!(body["room"]["status"], "LIVE");
    assert_eq!(body["room"]["host_nickname"], "tester");

    let (status, body) = send(&app, "GET", "/livestreams/rooms/555", None).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "ROOM_INFO_UNAVAILABLE");
    Ok(())
}
