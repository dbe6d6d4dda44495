//! Media-domain types: the normalized descriptor produced by the resolver,
//! quality profiles, time windows, and conversion request parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Start offset used when the request's value is missing or unusable.
pub const DEFAULT_START_SECS: f64 = 0.0;

/// Clip length used when the request's value is missing or unusable.
pub const DEFAULT_DURATION_SECS: f64 = 3.0;

// ---------------------------------------------------------------------------
// Media descriptor
// ---------------------------------------------------------------------------

/// What kind of media a post carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Gif,
    /// One or more still images.
    #[serde(rename = "image")]
    ImageSet,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Gif => "gif",
            MediaKind::ImageSet => "image",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single downloadable media resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MediaItem {
    pub url: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_hint: Option<String>,
}

/// Normalized resolver output for one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub found: bool,
    pub kind: MediaKind,
    pub items: Vec<MediaItem>,
}

impl MediaDescriptor {
    /// Check that the descriptor actually carries media.
    ///
    /// A descriptor that was not found or has no items is reported as
    /// [`Error::NotFound`] for `page_url`.
    pub fn into_usable(self, page_url: &str) -> Result<Self> {
        if !self.found || self.items.is_empty() {
            return Err(Error::not_found("media", page_url));
        }
        Ok(self)
    }

    /// The item a player should show first.
    pub fn primary(&self) -> Option<&MediaItem> {
        self.items.first()
    }
}

// ---------------------------------------------------------------------------
// Quality profiles and windows
// ---------------------------------------------------------------------------

/// GIF rendering profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QualityProfile {
    /// Fast single-pass encode.
    #[default]
    Balanced,
    /// Lanczos scaling with a generated palette.
    High,
    /// Low-res nearest-neighbour scaling with Bayer dithering.
    Retro,
}

impl QualityProfile {
    /// Output frame rate.
    pub fn fps(&self) -> u32 {
        match self {
            QualityProfile::Balanced | QualityProfile::High => 15,
            QualityProfile::Retro => 10,
        }
    }

    /// Output width in pixels; height follows the aspect ratio.
    pub fn width(&self) -> u32 {
        match self {
            QualityProfile::Balanced | QualityProfile::High => 480,
            QualityProfile::Retro => 320,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityProfile::Balanced => "balanced",
            QualityProfile::High => "high",
            QualityProfile::Retro => "retro",
        }
    }

    /// Parse a profile name, falling back to [`QualityProfile::Balanced`].
    pub fn parse_lenient(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }
}

impl std::str::FromStr for QualityProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "balanced" => Ok(QualityProfile::Balanced),
            "high" => Ok(QualityProfile::High),
            "retro" => Ok(QualityProfile::Retro),
            other => Err(Error::Validation(format!("unknown quality profile '{other}'"))),
        }
    }
}

impl std::fmt::Display for QualityProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `[start, start + duration)` slice of the input to render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start_secs: f64,
    pub duration_secs: f64,
}

impl TimeWindow {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self {
            start_secs: DEFAULT_START_SECS,
            duration_secs: DEFAULT_DURATION_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion request
// ---------------------------------------------------------------------------

/// A validated clip conversion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub source_url: String,
    pub window: TimeWindow,
    pub profile: QualityProfile,
}

impl ConversionRequest {
    /// Build a request from loosely typed inputs.
    ///
    /// Only the source URL is required. Numeric fields accept JSON numbers or
    /// strings (parsed by their longest numeric prefix); anything missing,
    /// malformed, non-finite or out of range falls back to
    /// [`DEFAULT_START_SECS`] / [`DEFAULT_DURATION_SECS`].
    pub fn from_lenient(
        source_url: Option<&str>,
        start: Option<&Value>,
        duration: Option<&Value>,
        quality: Option<&str>,
    ) -> Result<Self> {
        let source_url = source_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Validation("Video URL is required".into()))?;

        let start_secs = lenient_number(start)
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_START_SECS);
        let duration_secs = lenient_number(duration)
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_DURATION_SECS);

        Ok(Self {
            source_url: source_url.to_string(),
            window: TimeWindow {
                start_secs,
                duration_secs,
            },
            profile: QualityProfile::parse_lenient(quality),
        })
    }
}

/// Interpret a JSON value as a finite number.
fn lenient_number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_leading_float(s),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Parse the longest prefix of `s` that forms a decimal number.
///
/// Leading whitespace is skipped; `"2.5s"` yields `2.5`, `"abc"` yields
/// `None`.
pub fn parse_leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start || has_digits {
            has_digits |= frac_end > frac_start;
            end = frac_end;
        }
    }
    if !has_digits {
        return None;
    }

    // Optional exponent, only taken when complete.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}
