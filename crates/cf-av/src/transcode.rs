//! ffmpeg transcoding: GIF clips per quality profile and audio extraction.
//!
//! [`build_args`] is a pure mapping from a [`TranscodeMode`] to an ffmpeg
//! argument list. [`Transcoder`] is the async seam the orchestrator runs
//! against; [`FfmpegTranscoder`] is the production implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use cf_core::{QualityProfile, TimeWindow};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Bayer matrix scale used by the retro profile (0 = strongest pattern).
const RETRO_BAYER_SCALE: u32 = 2;

/// What a transcoder invocation should produce.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeMode {
    /// Animated GIF of `window`, rendered with `profile`.
    Clip {
        window: TimeWindow,
        profile: QualityProfile,
    },
    /// Full-length MP3 of the audio stream.
    Audio { bitrate: String },
}

impl TranscodeMode {
    /// File extension of the produced output.
    pub fn output_extension(&self) -> &'static str {
        match self {
            TranscodeMode::Clip { .. } => "gif",
            TranscodeMode::Audio { .. } => "mp3",
        }
    }
}

/// Build the `-vf` filter graph for a profile.
pub fn filter_graph(profile: QualityProfile) -> String {
    let fps = profile.fps();
    let width = profile.width();
    match profile {
        QualityProfile::Balanced => format!("fps={fps},scale={width}:-1"),
        QualityProfile::High => format!(
            "fps={fps},scale={width}:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse"
        ),
        QualityProfile::Retro => format!(
            "fps={fps},scale={width}:-1:flags=neighbor,split[s0][s1];[s0]palettegen=stats_mode=diff[p];[s1][p]paletteuse=dither=bayer:bayer_scale={RETRO_BAYER_SCALE}"
        ),
    }
}

/// Build the complete ffmpeg argument list (without the program name).
pub fn build_args(input: &Path, output: &Path, mode: &TranscodeMode) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-y".into()];

    match mode {
        TranscodeMode::Clip { window, profile } => {
            // Input-side seek: decoding starts at the window, -t bounds the output.
            args.extend([
                "-ss".to_string(),
                format_seconds(window.start_secs),
                "-t".to_string(),
                format_seconds(window.duration_secs),
                "-i".to_string(),
                input.to_string_lossy().to_string(),
                "-vf".to_string(),
                filter_graph(*profile),
                "-an".to_string(),
                "-f".to_string(),
                "gif".to_string(),
            ]);
        }
        TranscodeMode::Audio { bitrate } => {
            args.extend([
                "-i".to_string(),
                input.to_string_lossy().to_string(),
                "-vn".to_string(),
                "-c:a".to_string(),
                "libmp3lame".to_string(),
                "-b:a".to_string(),
                bitrate.clone(),
                "-f".to_string(),
                "mp3".to_string(),
            ]);
        }
    }

    args.push(output.to_string_lossy().to_string());
    args
}

/// Render seconds without float noise (`3`, `1.5`, `0.125`).
fn format_seconds(secs: f64) -> String {
    let rounded = (secs * 1000.0).round() / 1000.0;
    let mut s = format!("{rounded:.3}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// Something that turns a local input file into a local output file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run to completion.
    ///
    /// Resolves exactly once: `Ok(())` when `output` was produced, or
    /// [`cf_core::Error::Tool`] carrying the tool's diagnostics.
    async fn run(&self, input: &Path, output: &Path, mode: &TranscodeMode) -> cf_core::Result<()>;
}

/// [`Transcoder`] backed by the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Use the ffmpeg found by the registry.
    pub fn from_registry(tools: &ToolRegistry, timeout: Duration) -> cf_core::Result<Self> {
        Ok(Self::new(tools.require("ffmpeg")?, timeout))
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn run(&self, input: &Path, output: &Path, mode: &TranscodeMode) -> cf_core::Result<()> {
        let mut cmd = ToolCommand::new(self.program.clone());
        cmd.args(build_args(input, output, mode)).timeout(self.timeout);
        cmd.execute().await?;

        // ffmpeg can exit 0 without writing anything (e.g. a window past EOF).
        let produced = tokio::fs::metadata(output)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !produced {
            return Err(cf_core::Error::tool(
                cmd.program_name(),
                format!("no output written to {}", output.display()),
            ));
        }
        Ok(())
    }
}
