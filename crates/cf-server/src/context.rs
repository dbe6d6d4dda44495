//! Service-oriented application context.
//!
//! [`AppContext`] is the central struct shared across all route handlers via
//! Axum state. Infrastructure (tools, fetcher, orchestrator, resolver) is
//! immutable and wrapped in `Arc`s; the only mutable state is the lookup
//! history held by [`HistoryService`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use cf_av::{FfmpegTranscoder, ScratchDir, ToolRegistry, Transcoder};
use cf_core::config::{Config, HistoryConfig};
use cf_core::history::{HistoryEntry, HistoryLog, HistoryStore, JsonFileStore, MemoryStore};
use cf_core::MediaDescriptor;

use crate::convert::ConversionOrchestrator;
use crate::fetch::RemoteFetcher;
use crate::resolver::{HttpResolver, MediaResolver, UnconfiguredResolver};

// ---------------------------------------------------------------------------
// HistoryService
// ---------------------------------------------------------------------------

/// Bounded lookup history with best-effort persistence.
///
/// Saves happen under the write lock, so the store always ends up with the
/// latest snapshot. They do blocking file IO; async callers go through
/// `spawn_blocking`.
pub struct HistoryService {
    log: RwLock<HistoryLog>,
    store: Box<dyn HistoryStore>,
    enabled: bool,
}

impl HistoryService {
    /// Load the log from `store`. A store that cannot be read starts empty.
    pub fn new(store: Box<dyn HistoryStore>, enabled: bool) -> Self {
        let entries = if enabled {
            store.load().unwrap_or_else(|e| {
                tracing::warn!("Failed to load history, starting empty: {e}");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        Self {
            log: RwLock::new(HistoryLog::from_entries(entries)),
            store,
            enabled,
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        let store: Box<dyn HistoryStore> = match config.path {
            Some(ref path) => Box::new(JsonFileStore::new(path.clone())),
            None => Box::new(MemoryStore::default()),
        };
        Self::new(store, config.enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Remember a successful lookup. Duplicate URLs are ignored.
    pub fn record(&self, page_url: &str, descriptor: &MediaDescriptor) {
        if !self.enabled {
            return;
        }

        let mut log = self.log.write();
        if !log.record(HistoryEntry::from_descriptor(page_url, descriptor)) {
            return;
        }
        let snapshot = log.entries();

        tracing::debug!(url = %page_url, entries = snapshot.len(), "History updated");
        self.persist(&snapshot);
    }

    /// Newest first.
    pub fn list(&self) -> Vec<HistoryEntry> {
        self.log.read().entries()
    }

    pub fn clear(&self) {
        let mut log = self.log.write();
        log.clear();
        self.persist(&[]);
    }

    fn persist(&self, entries: &[HistoryEntry]) {
        if let Err(e) = self.store.save(entries) {
            tracing::warn!("Failed to persist history: {e}");
        }
    }
}

impl std::fmt::Debug for HistoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryService")
            .field("entries", &self.log.read().len())
            .field("enabled", &self.enabled)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// AppContext
// ---------------------------------------------------------------------------

/// Shared application state passed to every Axum handler.
///
/// Cheaply cloneable: every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppContext {
    /// Immutable configuration snapshot.
    pub config: Arc<Config>,
    /// Discovered external tools.
    pub tools: Arc<ToolRegistry>,
    /// Upstream HTTP client for proxying and archiving.
    pub fetcher: RemoteFetcher,
    /// Clip and audio pipelines.
    pub converter: Arc<ConversionOrchestrator>,
    /// Page URL to media descriptor lookup.
    pub resolver: Arc<dyn MediaResolver>,
    /// Recent successful lookups.
    pub history: Arc<HistoryService>,
}

impl AppContext {
    /// Wire a context from explicit collaborators.
    pub fn new(
        config: Config,
        tools: ToolRegistry,
        transcoder: Arc<dyn Transcoder>,
        resolver: Arc<dyn MediaResolver>,
        history: HistoryService,
    ) -> cf_core::Result<Self> {
        let fetcher = RemoteFetcher::new(&config.fetch);
        let scratch = ScratchDir::new(&config.conversion.scratch_dir)?;
        let converter = ConversionOrchestrator::new(
            fetcher.clone(),
            transcoder,
            scratch,
            config.conversion.audio_bitrate.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            tools: Arc::new(tools),
            fetcher,
            converter: Arc::new(converter),
            resolver,
            history: Arc::new(history),
        })
    }

    /// Build the production context: ffmpeg from the registry, the HTTP
    /// resolver when an endpoint is configured, and the configured history
    /// store.
    pub fn from_config(config: Config) -> cf_core::Result<Self> {
        let tools = ToolRegistry::discover(&config.tools);
        let timeout = Duration::from_secs(config.conversion.transcode_timeout_secs);

        let transcoder = match FfmpegTranscoder::from_registry(&tools, timeout) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("{e}; conversions will fail until ffmpeg is installed");
                FfmpegTranscoder::new("ffmpeg", timeout)
            }
        };

        let resolver: Arc<dyn MediaResolver> = match config.resolver.endpoint {
            Some(ref endpoint) => {
                let mut builder = reqwest::Client::builder()
                    .user_agent(config.fetch.user_agent.clone())
                    .connect_timeout(Duration::from_secs(config.fetch.connect_timeout_secs));
                if config.fetch.read_timeout_secs > 0 {
                    builder = builder
                        .read_timeout(Duration::from_secs(config.fetch.read_timeout_secs));
                }
                let client = builder
                    .build()
                    .map_err(|e| cf_core::Error::Internal(format!("failed to build resolver client: {e}")))?;
                Arc::new(HttpResolver::new(client, endpoint.clone()))
            }
            None => Arc::new(UnconfiguredResolver),
        };

        let history = HistoryService::from_config(&config.history);

        Self::new(config, tools, Arc::new(transcoder), resolver, history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::history::HISTORY_CAPACITY;
    use cf_core::{MediaItem, MediaKind};

    fn descriptor(kind: MediaKind) -> MediaDescriptor {
        MediaDescriptor {
            found: true,
            kind,
            items: vec![MediaItem {
                url: "https://pbs.twimg.com/media/1.jpg".into(),
                mime_hint: None,
            }],
        }
    }

    #[test]
    fn records_newest_first_without_duplicates() {
        let history = HistoryService::new(Box::new(MemoryStore::default()), true);
        history.record("https://x.com/a/status/1", &descriptor(MediaKind::Video));
        history.record("https://x.com/a/status/2", &descriptor(MediaKind::ImageSet));
        history.record("https://x.com/a/status/1", &descriptor(MediaKind::Video));

        let entries = history.list();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, "https://x.com/a/status/2");
        assert_eq!(
            entries[0].thumbnail.as_deref(),
            Some("https://pbs.twimg.com/media/1.jpg")
        );
        assert_eq!(entries[1].thumbnail, None);
    }

    #[test]
    fn capacity_is_enforced() {
        let history = HistoryService::new(Box::new(MemoryStore::default()), true);
        for i in 0..(HISTORY_CAPACITY + 5) {
            history.record(&format!("https://x.com/a/status/{i}"), &descriptor(MediaKind::Gif));
        }
        assert_eq!(history.list().len(), HISTORY_CAPACITY);
    }

    #[test]
    fn disabled_history_records_nothing() {
        let history = HistoryService::new(Box::new(MemoryStore::default()), false);
        history.record("https://x.com/a/status/1", &descriptor(MediaKind::Video));
        assert!(history.list().is_empty());
    }

    #[test]
    fn persists_through_file_store() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("history.json");

        let history = HistoryService::new(Box::new(JsonFileStore::new(&path)), true);
        history.record("https://x.com/a/status/9", &descriptor(MediaKind::Video));

        let reloaded = HistoryService::new(Box::new(JsonFileStore::new(&path)), true);
        assert_eq!(reloaded.list().len(), 1);

        reloaded.clear();
        let cleared = HistoryService::new(Box::new(JsonFileStore::new(&path)), true);
        assert!(cleared.list().is_empty());
    }

    #[test]
    fn corrupt_store_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("history.json");
        std::fs::write(&path, "{ not json").unwrap();

        let history = HistoryService::new(Box::new(JsonFileStore::new(&path)), true);
        assert!(history.list().is_empty());
    }

    /// Remembers every snapshot it was asked to save.
    #[derive(Default)]
    struct RecordingStore {
        saves: Arc<parking_lot::Mutex<Vec<Vec<HistoryEntry>>>>,
    }

    impl HistoryStore for RecordingStore {
        fn load(&self) -> cf_core::Result<Vec<HistoryEntry>> {
            Ok(Vec::new())
        }

        fn save(&self, entries: &[HistoryEntry]) -> cf_core::Result<()> {
            // Widen the window for a stale snapshot to overtake a newer one.
            std::thread::sleep(std::time::Duration::from_millis(2));
            self.saves.lock().push(entries.to_vec());
            Ok(())
        }
    }

    #[test]
    fn concurrent_records_persist_latest_snapshot() {
        let store = RecordingStore::default();
        let saves = store.saves.clone();
        let history = Arc::new(HistoryService::new(Box::new(store), true));

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let history = history.clone();
                std::thread::spawn(move || {
                    history.record(&format!("https://x.com/a/status/{i}"), &descriptor(MediaKind::Gif));
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let saves = saves.lock();
        assert_eq!(saves.len(), 8);
        // Each save extends the previous one, and the last matches memory.
        for pair in saves.windows(2) {
            assert_eq!(pair[1].len(), pair[0].len() + 1);
        }
        let last: Vec<_> = saves.last().unwrap().iter().map(|e| e.url.clone()).collect();
        let current: Vec<_> = history.list().into_iter().map(|e| e.url).collect();
        assert_eq!(last, current);
    }

    #[test]
    fn from_config_without_resolver_endpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.conversion.scratch_dir = tmp.path().join("scratch");

        let ctx = AppContext::from_config(config).unwrap();
        assert!(tmp.path().join("scratch").is_dir());
        assert!(ctx.history.is_enabled());
    }
}
