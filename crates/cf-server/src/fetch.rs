//! Streaming downloads of remote media.
//!
//! [`RemoteFetcher`] issues a GET and hands back a [`FetchedMedia`] whose
//! body has not been read yet. Callers then either sink it into a scratch
//! file ([`RemoteFetcher::fetch_to_file`]) or relay it into an outbound
//! response ([`FetchedMedia::into_body`]). The payload is never buffered in
//! full.

use std::path::Path;
use std::time::Duration;

use axum::body::Body;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, Url};
use tokio::io::AsyncWriteExt;

use cf_core::config::FetchConfig;
use cf_core::Error;

/// HTTP client used for every upstream download.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: Client,
}

impl RemoteFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if config.read_timeout_secs > 0 {
            builder = builder.read_timeout(Duration::from_secs(config.read_timeout_secs));
        }

        let client = match builder.build() {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Failed to build HTTP client from config, using defaults: {e}");
                Client::new()
            }
        };
        Self { client }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Start a GET for `url` and return once the response headers arrived.
    ///
    /// Non-2xx statuses and transport errors are [`Error::Fetch`]; a URL that
    /// is not `http`/`https` is [`Error::Validation`].
    pub async fn fetch(&self, url: &str) -> cf_core::Result<FetchedMedia> {
        let parsed = parse_remote_url(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|e| Error::fetch(url, e))?;

        tracing::debug!(url = %url, status = %response.status(), "Upstream responded");

        Ok(FetchedMedia {
            url: url.to_string(),
            response,
        })
    }

    /// Download `url` into `path`, returning the number of bytes written.
    ///
    /// Resolves only after the file has been flushed. Fails with whichever
    /// error happens first: the transfer ([`Error::Fetch`]) or the file
    /// ([`Error::Io`]).
    pub async fn fetch_to_file(&self, url: &str, path: &Path) -> cf_core::Result<u64> {
        let mut media = self.fetch(url).await?;
        let mut file = tokio::fs::File::create(path).await?;

        let mut written: u64 = 0;
        while let Some(chunk) = media.next_chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        tracing::debug!(url = %url, bytes = written, path = %path.display(), "Download complete");
        Ok(written)
    }
}

/// Validate that `url` is an absolute `http` or `https` URL.
pub fn parse_remote_url(url: &str) -> cf_core::Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| Error::Validation(format!("invalid URL '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(Error::Validation(format!(
            "unsupported URL scheme '{other}' in '{url}'"
        ))),
    }
}

/// An upstream response whose body has not been consumed yet.
#[derive(Debug)]
pub struct FetchedMedia {
    url: String,
    response: Response,
}

impl FetchedMedia {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The upstream `Content-Type`, if it sent a readable one.
    pub fn content_type(&self) -> Option<&str> {
        self.response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Declared body length, when known.
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Read the next body chunk; `None` at end of body.
    pub async fn next_chunk(&mut self) -> cf_core::Result<Option<Bytes>> {
        self.response
            .chunk()
            .await
            .map_err(|e| Error::fetch(self.url.clone(), e))
    }

    /// Relay the body into an outbound response body.
    ///
    /// A transfer error after this point can only end the stream early; it is
    /// logged here because the status line has already been sent.
    pub fn into_body(self) -> Body {
        let url = self.url;
        let stream = self.response.bytes_stream().inspect_err(move |e| {
            tracing::warn!(url = %url, "Upstream body failed mid-stream: {e}");
        });
        Body::from_stream(stream)
    }
}
