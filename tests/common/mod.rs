//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which wires a full [`AppContext`] around a
//! temporary scratch directory, a [`FakeTranscoder`] standing in for ffmpeg
//! and a [`FakeResolver`] with canned descriptors. Upstream media is served
//! by `wiremock`; requests go through the real router with
//! `tower::ServiceExt::oneshot`, or over TCP via [`TestHarness::with_server`].

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cf_av::{ToolRegistry, TranscodeMode, Transcoder};
use cf_core::config::Config;
use cf_core::history::MemoryStore;
use cf_core::{Error, MediaDescriptor};
use cf_server::context::{AppContext, HistoryService};
use cf_server::resolver::MediaResolver;
use cf_server::router::build_router;

/// Marker written at the start of every fake GIF.
pub const FAKE_GIF_HEADER: &[u8] = b"GIF89a";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// One recorded transcoder invocation.
#[derive(Debug, Clone)]
pub struct TranscodeCall {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mode: TranscodeMode,
}

/// Transcoder that copies the input behind a fixed header.
#[derive(Debug, Default)]
pub struct FakeTranscoder {
    fail: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<TranscodeCall>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeTranscoder {
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Writes a partial output, then fails like a crashed ffmpeg.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<TranscodeCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of runs observed at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn run(&self, input: &Path, output: &Path, mode: &TranscodeMode) -> cf_core::Result<()> {
        self.calls.lock().unwrap().push(TranscodeCall {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            mode: mode.clone(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            tokio::fs::write(output, b"partial").await?;
            return Err(Error::tool("ffmpeg", "exited with status 1: moov atom not found"));
        }

        let mut data = FAKE_GIF_HEADER.to_vec();
        data.extend(tokio::fs::read(input).await?);
        tokio::fs::write(output, data).await?;
        Ok(())
    }
}

/// Resolver answering from a fixed table.
///
/// Unknown URLs are `NotFound`; URLs containing `broken` fail like an
/// unreachable scraper.
#[derive(Debug, Default)]
pub struct FakeResolver {
    known: HashMap<String, MediaDescriptor>,
}

impl FakeResolver {
    pub fn with(mut self, page_url: &str, descriptor: MediaDescriptor) -> Self {
        self.known.insert(page_url.to_string(), descriptor);
        self
    }
}

#[async_trait]
impl MediaResolver for FakeResolver {
    async fn resolve(&self, page_url: &str) -> cf_core::Result<MediaDescriptor> {
        if page_url.contains("broken") {
            return Err(Error::Resolution("scraper unreachable".into()));
        }
        self.known
            .get(page_url)
            .cloned()
            .ok_or_else(|| Error::not_found("media", page_url))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A fully wired application around fakes and a temporary scratch dir.
pub struct TestHarness {
    pub ctx: AppContext,
    pub transcoder: Arc<FakeTranscoder>,
    scratch: PathBuf,
    _tmp: TempDir,
}

impl TestHarness {
    /// Succeeding transcoder, empty resolver.
    pub fn new() -> Self {
        Self::with_parts(FakeTranscoder::succeeding(), FakeResolver::default())
    }

    pub fn with_transcoder(transcoder: FakeTranscoder) -> Self {
        Self::with_parts(transcoder, FakeResolver::default())
    }

    pub fn with_resolver(resolver: FakeResolver) -> Self {
        Self::with_parts(FakeTranscoder::succeeding(), resolver)
    }

    pub fn with_parts(transcoder: FakeTranscoder, resolver: FakeResolver) -> Self {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        let scratch = tmp.path().join("scratch");

        let mut config = Config::default();
        config.server.static_dir = None;
        config.conversion.scratch_dir = scratch.clone();

        let transcoder = Arc::new(transcoder);
        let ctx = AppContext::new(
            config,
            ToolRegistry::default(),
            transcoder.clone(),
            Arc::new(resolver),
            HistoryService::new(Box::new(MemoryStore::default()), true),
        )
        .expect("failed to build context");

        Self {
            ctx,
            transcoder,
            scratch,
            _tmp: tmp,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.ctx.clone(), None)
    }

    /// Files currently left in the scratch directory.
    pub fn scratch_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.scratch)
            .expect("scratch dir missing")
            .map(|e| e.expect("bad dir entry").path())
            .collect()
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let app = harness.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a JSON request.
pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a POST with a raw body and an optional content type.
pub fn raw_post(uri: &str, content_type: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Build an empty GET request.
pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Collect a response body.
pub async fn body_bytes(body: Body) -> Bytes {
    body.collect().await.unwrap().to_bytes()
}

/// Collect a response body as JSON.
pub async fn body_json(body: Body) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(body).await).unwrap()
}

/// Serve `body` with `content_type` at `route` on `server`.
pub async fn serve_media(server: &MockServer, route: &str, content_type: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_vec(), content_type))
        .mount(server)
        .await;
}

/// Answer `route` with a bare status code.
pub async fn serve_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Minimal query-string escaping for test URLs.
pub fn encode(value: &str) -> String {
    let mut out = String::new();
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
