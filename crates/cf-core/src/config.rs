//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! sub-configs for the server, external tools, remote fetching, conversion,
//! media resolution and history. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub fetch: FetchConfig,
    pub conversion: ConversionConfig,
    pub resolver: ResolverConfig,
    pub history: HistoryConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Load configuration strictly: a missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.fetch.read_timeout_secs == 0 {
            warnings.push("fetch.read_timeout_secs is 0; stalled downloads will never time out".into());
        }

        if self.conversion.transcode_timeout_secs == 0 {
            warnings.push("conversion.transcode_timeout_secs is 0; ffmpeg will be killed immediately".into());
        }

        if let Some(ref endpoint) = self.resolver.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                warnings.push(format!(
                    "resolver.endpoint '{endpoint}' is not an http(s) URL"
                ));
            }
        } else {
            warnings.push("resolver.endpoint is not set; /api/info will always fail".into());
        }

        if let Some(ref path) = self.tools.ffmpeg_path {
            if !path.exists() {
                warnings.push(format!(
                    "tools.ffmpeg_path {} does not exist; falling back to PATH",
                    path.display()
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            static_dir: Some(PathBuf::from("public")),
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
}

/// Remote download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Longest pause between two reads of an upstream body. Transfers that
    /// keep making progress are never cut off.
    #[serde(alias = "timeout_secs")]
    pub read_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: 60,
            connect_timeout_secs: 10,
            user_agent: concat!("clipforge/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// Conversion pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Shared scratch directory for per-request workspaces.
    pub scratch_dir: PathBuf,
    #[serde(default = "default_transcode_timeout")]
    pub transcode_timeout_secs: u64,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_transcode_timeout() -> u64 {
    300
}
fn default_audio_bitrate() -> String {
    "192k".into()
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("clipforge"),
            transcode_timeout_secs: default_transcode_timeout(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

/// External media resolver settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Base URL of the scraper service; the page URL is sent as the `url`
    /// query parameter.
    pub endpoint: Option<String>,
}

/// Lookup history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// JSON file for persistence; `None` keeps history in memory only.
    pub path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}
