//! Bounded lookup history.
//!
//! [`HistoryLog`] keeps the most recent successful media lookups, newest
//! first, de-duplicated by page URL. Persistence goes through the
//! [`HistoryStore`] trait so the log itself never touches ambient storage.

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::media::{MediaDescriptor, MediaKind};
use crate::Result;

/// Maximum number of entries retained.
pub const HISTORY_CAPACITY: usize = 10;

/// One remembered lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HistoryEntry {
    /// Millisecond timestamp of the lookup, unique enough for UI keys.
    pub id: i64,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub timestamp: DateTime<Utc>,
    /// Preview image for image sets.
    pub thumbnail: Option<String>,
}

impl HistoryEntry {
    /// Build an entry for a successful lookup of `page_url`.
    pub fn from_descriptor(page_url: &str, descriptor: &MediaDescriptor) -> Self {
        let now = Utc::now();
        let thumbnail = match descriptor.kind {
            MediaKind::ImageSet => descriptor.primary().map(|item| item.url.clone()),
            _ => None,
        };
        Self {
            id: now.timestamp_millis(),
            url: page_url.to_string(),
            kind: descriptor.kind,
            timestamp: now,
            thumbnail,
        }
    }
}

/// Most-recent-first log with a fixed capacity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from stored entries, keeping at most
    /// [`HISTORY_CAPACITY`] of them in their stored order.
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        let mut log = Self::new();
        for entry in entries {
            if log.entries.len() == HISTORY_CAPACITY {
                break;
            }
            if !log.contains(&entry.url) {
                log.entries.push_back(entry);
            }
        }
        log
    }

    /// Record a lookup at the front of the log.
    ///
    /// Returns `false` without changing anything when the URL is already
    /// present. The oldest entry is evicted once the log is full.
    pub fn record(&mut self, entry: HistoryEntry) -> bool {
        if self.contains(&entry.url) {
            return false;
        }
        self.entries.push_front(entry);
        self.entries.truncate(HISTORY_CAPACITY);
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.iter().any(|e| e.url == url)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

/// Persistence seam for [`HistoryLog`].
pub trait HistoryStore: Send + Sync {
    /// Load previously saved entries, newest first.
    fn load(&self) -> Result<Vec<HistoryEntry>>;

    /// Replace the stored entries.
    fn save(&self, entries: &[HistoryEntry]) -> Result<()>;
}

/// Keeps history for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl HistoryStore for MemoryStore {
    fn load(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.entries.lock().clone())
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        *self.entries.lock() = entries.to_vec();
        Ok(())
    }
}

/// Stores history as a pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self) -> Result<Vec<HistoryEntry>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                crate::Error::Internal(format!(
                    "history file {} is corrupt: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| crate::Error::Internal(format!("failed to serialize history: {e}")))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
