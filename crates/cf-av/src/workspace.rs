//! Per-request scratch workspaces.
//!
//! A [`ScratchDir`] is the process-wide directory shared by all requests.
//! Each request allocates a [`WorkspaceHandle`] holding an input and an
//! output path namespaced by a unique id. The handle removes both files when
//! released or dropped, so cleanup happens on every exit path without any
//! per-stage bookkeeping.

use std::path::{Path, PathBuf};

/// Process-wide scratch directory.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Use `root` as the scratch directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> cf_core::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh pair of paths for one request.
    ///
    /// Nothing is created on disk; the paths are named
    /// `<prefix>_<id>_input` and `<prefix>_<id>_output.<output_ext>`.
    pub fn allocate(&self, prefix: &str, output_ext: &str) -> WorkspaceHandle {
        let id = unique_id();
        let input = self.root.join(format!("{prefix}_{id}_input"));
        let output = self.root.join(format!("{prefix}_{id}_output.{output_ext}"));
        tracing::debug!(workspace = %id, "Workspace allocated");
        WorkspaceHandle { id, input, output }
    }
}

/// Millisecond timestamp plus a random token.
fn unique_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let token: u64 = rand::random();
    format!("{millis}_{token:016x}")
}

/// Input/output paths owned by a single request.
///
/// Dropping the handle releases it.
#[derive(Debug)]
pub struct WorkspaceHandle {
    id: String,
    input: PathBuf,
    output: PathBuf,
}

impl WorkspaceHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Where the downloaded source is written.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Where the transcoder writes its result.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Remove both files if present.
    ///
    /// Failures are logged, never returned; calling this again after the
    /// files are gone does nothing.
    pub fn release(&mut self) {
        remove_best_effort(&self.input);
        remove_best_effort(&self.output);
    }
}

impl Drop for WorkspaceHandle {
    fn drop(&mut self) {
        self.release();
        tracing::debug!(workspace = %self.id, "Workspace released");
    }
}

fn remove_best_effort(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!("Failed to remove scratch file {}: {e}", path.display());
        }
    }
}
