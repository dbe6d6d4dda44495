//! # cf-av
//!
//! External tool management and transcoding for the clipforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the path to
//!   ffmpeg.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Scratch workspaces** ([`ScratchDir`], [`WorkspaceHandle`]) -- unique
//!   per-request input/output paths with guaranteed removal.
//! - **Transcoding** ([`transcode`]) -- ffmpeg argument building per quality
//!   profile and the [`Transcoder`] seam used by the orchestrator.

pub mod command;
pub mod tools;
pub mod transcode;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use tools::{ToolInfo, ToolRegistry};
pub use transcode::{build_args, FfmpegTranscoder, TranscodeMode, Transcoder};
pub use workspace::{ScratchDir, WorkspaceHandle};
