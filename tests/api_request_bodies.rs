//! Malformed JSON bodies produce the structured validation error.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{body_json, json_request, raw_post, TestHarness};

const JSON_ROUTES: [&str; 3] = ["/api/convert", "/api/info", "/api/zip"];

async fn assert_validation_error(harness: &TestHarness, request: axum::http::Request<axum::body::Body>) {
    let uri = request.uri().to_string();
    let response = harness.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");

    let request_id = response.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .to_string();
    let json = body_json(response.into_body()).await;
    assert_eq!(json["code"], "validation_error", "{uri}");
    assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()), "{uri}");
    assert_eq!(json["request_id"], request_id.as_str(), "{uri}");
}

#[tokio::test]
async fn missing_content_type_is_validation_error() {
    let harness = TestHarness::new();
    for uri in JSON_ROUTES {
        assert_validation_error(&harness, raw_post(uri, None, r#"{"url":"https://x.com"}"#)).await;
    }
}

#[tokio::test]
async fn empty_untyped_body_is_validation_error() {
    let harness = TestHarness::new();
    for uri in JSON_ROUTES {
        assert_validation_error(&harness, raw_post(uri, None, "")).await;
    }
}

#[tokio::test]
async fn syntactically_broken_json_is_validation_error() {
    let harness = TestHarness::new();
    for uri in JSON_ROUTES {
        assert_validation_error(&harness, raw_post(uri, Some("application/json"), "{ not json")).await;
    }
}

#[tokio::test]
async fn mistyped_fields_are_validation_errors() {
    let harness = TestHarness::new();
    assert_validation_error(
        &harness,
        json_request(Method::POST, "/api/convert", json!({ "videoUrl": 5 })),
    )
    .await;
    assert_validation_error(
        &harness,
        json_request(Method::POST, "/api/info", json!({ "url": ["a", "b"] })),
    )
    .await;
}

#[tokio::test]
async fn no_scratch_files_for_rejected_bodies() {
    let harness = TestHarness::new();
    assert_validation_error(
        &harness,
        raw_post("/api/convert", Some("application/json"), "[1,2"),
    )
    .await;
    assert!(harness.scratch_files().is_empty());
}
