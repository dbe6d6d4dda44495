//! Clip conversion and audio extraction pipelines.
//!
//! Each request runs its own small state machine:
//!
//! ```text
//! Idle -> Downloading -> Transcoding -> Streaming -> Done
//!              \              \             \
//!               +--------------+-------------+--> Failed
//! ```
//!
//! The [`WorkspaceHandle`] allocated for a run travels with it until the
//! response body is dropped, so scratch files are removed on every exit
//! path: early errors, completed streams and disconnected clients alike.

use std::fmt;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use cf_av::{ScratchDir, TranscodeMode, Transcoder, WorkspaceHandle};
use cf_core::{ConversionRequest, Error};

use crate::fetch::{parse_remote_url, RemoteFetcher};

/// Download name for converted clips.
pub const GIF_FILENAME: &str = "twitter-convert.gif";
/// Download name for extracted audio.
pub const AUDIO_FILENAME: &str = "twitter-audio.mp3";

// ---------------------------------------------------------------------------
// Stage tracking
// ---------------------------------------------------------------------------

/// Where a conversion run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Downloading,
    Transcoding,
    Streaming,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Downloading => "downloading",
            Stage::Transcoding => "transcoding",
            Stage::Streaming => "streaming",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Stage::Idle, Stage::Downloading)
                | (Stage::Downloading, Stage::Transcoding)
                | (Stage::Transcoding, Stage::Streaming)
                | (Stage::Streaming, Stage::Done)
                | (Stage::Downloading, Stage::Failed)
                | (Stage::Transcoding, Stage::Failed)
                | (Stage::Streaming, Stage::Failed)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage tracker for one run; every transition is logged with the run id.
#[derive(Debug)]
struct PipelineRun {
    id: String,
    job: &'static str,
    stage: Stage,
}

impl PipelineRun {
    fn new(id: &str, job: &'static str) -> Self {
        Self {
            id: id.to_string(),
            job,
            stage: Stage::Idle,
        }
    }

    fn advance(&mut self, next: Stage) {
        if !self.stage.can_transition_to(next) {
            tracing::warn!(
                conversion = %self.id,
                job = self.job,
                from = %self.stage,
                to = %next,
                "Ignoring illegal stage transition"
            );
            return;
        }
        tracing::info!(
            conversion = %self.id,
            job = self.job,
            from = %self.stage,
            to = %next,
            "Stage transition"
        );
        self.stage = next;
    }

    fn fail(&mut self, reason: &dyn fmt::Display) {
        if self.stage.is_terminal() {
            return;
        }
        tracing::warn!(
            conversion = %self.id,
            job = self.job,
            stage = %self.stage,
            "Conversion failed: {reason}"
        );
        self.advance(Stage::Failed);
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Composes fetcher, transcoder and scratch workspaces into the clip and
/// audio workflows.
#[derive(Clone)]
pub struct ConversionOrchestrator {
    fetcher: RemoteFetcher,
    transcoder: Arc<dyn Transcoder>,
    scratch: ScratchDir,
    audio_bitrate: String,
}

impl ConversionOrchestrator {
    pub fn new(
        fetcher: RemoteFetcher,
        transcoder: Arc<dyn Transcoder>,
        scratch: ScratchDir,
        audio_bitrate: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            transcoder,
            scratch,
            audio_bitrate: audio_bitrate.into(),
        }
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Render the requested window of a remote video as a GIF.
    pub async fn convert(&self, request: &ConversionRequest) -> cf_core::Result<ConversionOutput> {
        let mode = TranscodeMode::Clip {
            window: request.window,
            profile: request.profile,
        };
        self.run(&request.source_url, "convert", mode, "image/gif", GIF_FILENAME)
            .await
    }

    /// Extract the full audio track of a remote video as MP3.
    pub async fn extract_audio(&self, source_url: &str) -> cf_core::Result<ConversionOutput> {
        let mode = TranscodeMode::Audio {
            bitrate: self.audio_bitrate.clone(),
        };
        self.run(source_url, "audio", mode, "audio/mpeg", AUDIO_FILENAME)
            .await
    }

    async fn run(
        &self,
        source_url: &str,
        job: &'static str,
        mode: TranscodeMode,
        content_type: &'static str,
        filename: &'static str,
    ) -> cf_core::Result<ConversionOutput> {
        // Reject bad input before any scratch paths exist.
        parse_remote_url(source_url)?;

        let workspace = self.scratch.allocate(job, mode.output_extension());
        let mut run = PipelineRun::new(workspace.id(), job);

        match self.produce(&mut run, &workspace, source_url, &mode).await {
            Ok((file, len)) => {
                run.advance(Stage::Streaming);
                Ok(ConversionOutput {
                    file,
                    len,
                    content_type,
                    filename,
                    workspace,
                    run,
                })
            }
            Err(e) => {
                run.fail(&e);
                Err(e)
            }
        }
    }

    async fn produce(
        &self,
        run: &mut PipelineRun,
        workspace: &WorkspaceHandle,
        source_url: &str,
        mode: &TranscodeMode,
    ) -> cf_core::Result<(File, u64)> {
        run.advance(Stage::Downloading);
        let downloaded = self
            .fetcher
            .fetch_to_file(source_url, workspace.input())
            .await?;
        tracing::debug!(conversion = %workspace.id(), bytes = downloaded, "Source downloaded");

        run.advance(Stage::Transcoding);
        self.transcoder
            .run(workspace.input(), workspace.output(), mode)
            .await?;

        let file = File::open(workspace.output()).await?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A finished transcode, ready to be streamed to the caller.
///
/// Owns the run's workspace; the scratch files live exactly as long as this
/// value (or the response body built from it).
#[derive(Debug)]
pub struct ConversionOutput {
    file: File,
    len: u64,
    content_type: &'static str,
    filename: &'static str,
    workspace: WorkspaceHandle,
    run: PipelineRun,
}

impl ConversionOutput {
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn filename(&self) -> &'static str {
        self.filename
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy the output to `dest` and finish the run.
    pub async fn write_to(mut self, dest: &Path) -> cf_core::Result<u64> {
        let result = async {
            let mut out = File::create(dest).await?;
            let copied = tokio::io::copy(&mut self.file, &mut out).await?;
            out.sync_all().await?;
            Ok::<_, io::Error>(copied)
        }
        .await;

        match result {
            Ok(copied) => {
                self.run.advance(Stage::Done);
                Ok(copied)
            }
            Err(e) => {
                self.run.fail(&e);
                Err(e.into())
            }
        }
    }
}

impl IntoResponse for ConversionOutput {
    fn into_response(self) -> Response {
        let headers = [
            (header::CONTENT_TYPE, self.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", self.filename),
            ),
            (header::CONTENT_LENGTH, self.len.to_string()),
        ];

        let stream = GuardedStream::new(ReaderStream::new(self.file), self.run, self.workspace);

        (headers, Body::from_stream(stream)).into_response()
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Output stream that keeps the workspace alive until the body is dropped.
struct GuardedStream {
    inner: ByteStream,
    run: PipelineRun,
    // Dropped after `run` records the final stage.
    _workspace: WorkspaceHandle,
}

impl GuardedStream {
    fn new(
        inner: impl Stream<Item = io::Result<Bytes>> + Send + 'static,
        run: PipelineRun,
        workspace: WorkspaceHandle,
    ) -> Self {
        Self {
            inner: Box::pin(inner),
            run,
            _workspace: workspace,
        }
    }
}

impl Stream for GuardedStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let polled = this.inner.as_mut().poll_next(cx);
        match &polled {
            Poll::Ready(None) => {
                if !this.run.stage.is_terminal() {
                    this.run.advance(Stage::Done);
                }
            }
            // Headers are out; the body just ends early.
            Poll::Ready(Some(Err(e))) => this.run.fail(&Error::Streaming(e.to_string())),
            _ => {}
        }
        polled
    }
}

impl Drop for GuardedStream {
    fn drop(&mut self) {
        if !self.run.stage.is_terminal() {
            self.run.fail(&Error::Streaming(
                "response body dropped before completion".into(),
            ));
        }
    }
}
