//! Page URL to media descriptor resolution.
//!
//! Scraping the host site is delegated to an external service; this module
//! only speaks its normalized JSON and turns it into a
//! [`MediaDescriptor`].

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use cf_core::{Error, MediaDescriptor, MediaItem, MediaKind};

/// Looks up the media attached to a post.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolve `page_url` to a usable descriptor.
    ///
    /// Returns [`Error::NotFound`] when the post has no supported media and
    /// [`Error::Resolution`] when the lookup itself failed.
    async fn resolve(&self, page_url: &str) -> cf_core::Result<MediaDescriptor>;
}

/// Resolver used when no scraper endpoint is configured.
#[derive(Debug, Default)]
pub struct UnconfiguredResolver;

#[async_trait]
impl MediaResolver for UnconfiguredResolver {
    async fn resolve(&self, _page_url: &str) -> cf_core::Result<MediaDescriptor> {
        Err(Error::Resolution("no media resolver endpoint configured".into()))
    }
}

/// Calls `GET <endpoint>?url=<page url>` on a scraper service.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ScraperResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    media: Vec<MediaItem>,
}

impl HttpResolver {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl MediaResolver for HttpResolver {
    async fn resolve(&self, page_url: &str) -> cf_core::Result<MediaDescriptor> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("url", page_url)])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Resolution(format!("resolver request failed: {e}")))?;

        let raw: ScraperResponse = response
            .json()
            .await
            .map_err(|e| Error::Resolution(format!("resolver returned invalid JSON: {e}")))?;

        let kind = match raw.kind.as_deref() {
            Some("video") => MediaKind::Video,
            Some("gif") => MediaKind::Gif,
            Some("image") => MediaKind::ImageSet,
            other => {
                tracing::debug!(page = %page_url, kind = ?other, "Resolver returned no supported media");
                return Err(Error::not_found("media", page_url));
            }
        };

        let descriptor = MediaDescriptor {
            found: raw.found,
            kind,
            items: raw.media,
        }
        .into_usable(page_url)?;

        tracing::info!(
            page = %page_url,
            kind = %descriptor.kind,
            items = descriptor.items.len(),
            "Media resolved"
        );
        Ok(descriptor)
    }
}
