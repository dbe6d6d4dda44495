//! Media resolution, history and operational endpoints.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use cf_core::{MediaDescriptor, MediaItem, MediaKind};

use common::{body_json, get, json_request, FakeResolver, TestHarness};

const VIDEO_POST: &str = "https://x.com/someone/status/1";
const IMAGE_POST: &str = "https://x.com/someone/status/2";

fn harness() -> TestHarness {
    TestHarness::with_resolver(
        FakeResolver::default()
            .with(
                VIDEO_POST,
                MediaDescriptor {
                    found: true,
                    kind: MediaKind::Video,
                    items: vec![
                        MediaItem {
                            url: "https://video.twimg.com/720.mp4".into(),
                            mime_hint: Some("video/mp4".into()),
                        },
                        MediaItem {
                            url: "https://video.twimg.com/360.mp4".into(),
                            mime_hint: Some("video/mp4".into()),
                        },
                    ],
                },
            )
            .with(
                IMAGE_POST,
                MediaDescriptor {
                    found: true,
                    kind: MediaKind::ImageSet,
                    items: vec![MediaItem {
                        url: "https://pbs.twimg.com/media/a.jpg".into(),
                        mime_hint: None,
                    }],
                },
            )
            .with(
                "https://x.com/someone/status/empty",
                MediaDescriptor {
                    found: true,
                    kind: MediaKind::Gif,
                    items: vec![],
                },
            ),
    )
}

async fn lookup(harness: &TestHarness, url: &str) -> (StatusCode, serde_json::Value) {
    let response = harness
        .router()
        .oneshot(json_request(Method::POST, "/api/info", json!({ "url": url })))
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response.into_body()).await)
}

#[tokio::test]
async fn resolves_video_post() {
    let harness = harness();
    let (status, json) = lookup(&harness, VIDEO_POST).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["found"], true);
    assert_eq!(json["type"], "video");
    assert_eq!(json["video_url"], "https://video.twimg.com/720.mp4");
    assert_eq!(json["variants"].as_array().unwrap().len(), 2);
    assert_eq!(json["variants"][0]["type"], "video/mp4");
}

#[tokio::test]
async fn image_posts_report_image_type() {
    let harness = harness();
    let (status, json) = lookup(&harness, IMAGE_POST).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["type"], "image");
}

#[tokio::test]
async fn unknown_or_empty_is_404() {
    let harness = harness();

    let (status, json) = lookup(&harness, "https://x.com/someone/status/404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");

    let (status, _) = lookup(&harness, "https://x.com/someone/status/empty").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn resolver_failure_is_500() {
    let harness = harness();
    let (status, json) = lookup(&harness, "https://x.com/broken/status/1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "resolution_error");
}

#[tokio::test]
async fn missing_url_is_400() {
    let harness = harness();
    let response = harness
        .router()
        .oneshot(json_request(Method::POST, "/api/info", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn successful_lookups_are_remembered() {
    let harness = harness();
    lookup(&harness, VIDEO_POST).await;
    lookup(&harness, IMAGE_POST).await;
    lookup(&harness, VIDEO_POST).await;
    lookup(&harness, "https://x.com/someone/status/404").await;

    let response = harness.router().oneshot(get("/api/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response.into_body()).await;
    let entries = json.as_array().unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["url"], IMAGE_POST);
    assert_eq!(entries[0]["type"], "image");
    assert_eq!(entries[0]["thumbnail"], "https://pbs.twimg.com/media/a.jpg");
    assert_eq!(entries[1]["url"], VIDEO_POST);

    let response = harness
        .router()
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri("/api/history")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(harness.ctx.history.list().is_empty());
}

#[tokio::test]
async fn health_reports_version() {
    let harness = TestHarness::new();
    let response = harness.router().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let json = body_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn tools_lists_ffmpeg() {
    let harness = TestHarness::new();
    let response = harness.router().oneshot(get("/api/tools")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response.into_body()).await;
    assert_eq!(json[0]["name"], "ffmpeg");
    // The harness registry is empty.
    assert_eq!(json[0]["available"], false);
}

#[tokio::test]
async fn openapi_document_lists_routes() {
    let harness = TestHarness::new();
    let response = harness
        .router()
        .oneshot(get("/api-docs/openapi.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response.into_body()).await;
    for path in ["/api/info", "/api/convert", "/api/audio", "/api/proxy", "/api/zip"] {
        assert!(json["paths"].get(path).is_some(), "missing {path}");
    }
}
