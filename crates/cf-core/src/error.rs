//! Unified error type for clipforge.
//!
//! Every stage of the acquisition pipeline funnels its failures into
//! [`Error`], which carries enough context for API handlers to derive an HTTP
//! status code via [`Error::http_status`].

/// Unified error type covering all failure modes in clipforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required input was missing or malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The resolver found no usable media for a page.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "media").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The external media resolver failed.
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Downloading a remote resource failed.
    #[error("Fetch failed [{url}]: {message}")]
    Fetch {
        /// The remote URL that could not be fetched.
        url: String,
        /// Human-readable error description.
        message: String,
    },

    /// An external tool (ffmpeg) exited abnormally or could not be run.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Diagnostic text, usually the tool's stderr.
        message: String,
    },

    /// Writing the zip archive failed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// A failure after the response was committed.
    #[error("Streaming error: {0}")]
    Streaming(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::NotFound { .. } => 404,
            Error::Resolution(_) => 500,
            Error::Fetch { .. } => 500,
            Error::Tool { .. } => 500,
            Error::Archive(_) => 500,
            Error::Streaming(_) => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::NotFound { .. } => "not_found",
            Error::Resolution(_) => "resolution_error",
            Error::Fetch { .. } => "fetch_failed",
            Error::Tool { .. } => "transcode_failed",
            Error::Archive(_) => "archive_error",
            Error::Streaming(_) => "streaming_error",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Fetch`].
    pub fn fetch(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
