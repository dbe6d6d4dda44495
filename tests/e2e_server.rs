//! Server end-to-end tests over real TCP connections.

mod common;

use serde_json::json;
use wiremock::MockServer;

use common::{serve_media, TestHarness, FAKE_GIF_HEADER};

#[tokio::test]
async fn health_over_tcp() {
    let (_harness, addr) = TestHarness::with_server().await;

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn convert_over_tcp_removes_scratch_files() {
    let upstream = MockServer::start().await;
    serve_media(&upstream, "/video.mp4", "video/mp4", &vec![1u8; 256 * 1024]).await;
    let (harness, addr) = TestHarness::with_server().await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/convert"))
        .json(&json!({"videoUrl": format!("{}/video.mp4", upstream.uri())}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.content_length(),
        Some((FAKE_GIF_HEADER.len() + 256 * 1024) as u64)
    );

    let body = response.bytes().await.unwrap();
    assert!(body.starts_with(FAKE_GIF_HEADER));

    // The server drops the body stream right after the last chunk.
    for _ in 0..50 {
        if harness.scratch_files().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(harness.scratch_files().is_empty());
}
