//! Best-effort zip bundling of remote assets.
//!
//! The zip encoder is synchronous, so it runs on the blocking pool. Remote
//! bodies are pulled through the runtime handle chunk by chunk, and encoded
//! output is pushed through a bounded channel that backs the HTTP response
//! body. Nothing is buffered beyond one chunk per side.
//!
//! URLs are processed strictly in order. A URL whose request fails before
//! any body arrives is logged and skipped; entries are numbered over the
//! successful ones only. Once an entry has started, its bytes are already on
//! the wire, so a body that breaks mid-transfer aborts the whole archive
//! rather than skipping that URL. Aborts, like any failure of the archive
//! writer itself, end the stream with an error and no central directory.

use std::io::{self, Seek, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use cf_core::Error;

use crate::fetch::RemoteFetcher;

/// Download name for archives.
pub const ARCHIVE_FILENAME: &str = "twitter-media.zip";

/// Encoded bytes are handed to the body in chunks of about this size.
const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks in flight between the encoder and the response body.
const CHANNEL_DEPTH: usize = 16;

/// Maximum deflate effort.
const COMPRESSION_LEVEL: i64 = 9;

/// Name of the `n`th successful entry (1-based).
pub fn entry_name(n: usize) -> String {
    format!("image_{n}.jpg")
}

/// What ended up in a finished archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub written: usize,
    pub skipped: Vec<String>,
}

/// Start encoding `urls` into a zip and return the encoded byte stream.
///
/// Must be called from within a Tokio runtime.
pub fn stream_archive(
    fetcher: RemoteFetcher,
    urls: Vec<String>,
) -> ReceiverStream<io::Result<Bytes>> {
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
    let handle = Handle::current();

    tokio::task::spawn_blocking(move || {
        let error_tx = tx.clone();
        let aborted = Arc::new(AtomicBool::new(false));
        let mut zip = ZipWriter::new_stream(ChannelWriter::new(tx, aborted.clone()));

        let outcome = match write_entries(&handle, &fetcher, &urls, &mut zip) {
            Ok(summary) => zip
                .finish()
                .map(|_| summary)
                .map_err(|e| Error::Archive(format!("failed to finalize archive: {e}"))),
            Err(e) => {
                // Silence the writer before `zip` drops; its drop would
                // otherwise append a trailer after the error.
                abort(&error_tx, &aborted, e);
                drop(zip);
                return;
            }
        };

        match outcome {
            Ok(summary) => {
                if !summary.skipped.is_empty() {
                    tracing::warn!(
                        skipped = ?summary.skipped,
                        "Archive finished with skipped URLs"
                    );
                }
                tracing::info!(
                    entries = summary.written,
                    skipped = summary.skipped.len(),
                    "Archive finalized"
                );
            }
            Err(e) => abort(&error_tx, &aborted, e),
        }
    });

    ReceiverStream::new(rx)
}

/// End the byte stream with an error once output has been committed.
fn abort(tx: &mpsc::Sender<io::Result<Bytes>>, aborted: &AtomicBool, cause: Error) {
    aborted.store(true, Ordering::Release);
    let err = Error::Streaming(format!("archive aborted: {cause}"));
    tracing::error!("{err}");
    let _ = tx.blocking_send(Err(io::Error::other(err)));
}

/// Fetch each URL in order and copy it into its own deflated entry.
fn write_entries<W: Write + Seek>(
    handle: &Handle,
    fetcher: &RemoteFetcher,
    urls: &[String],
    zip: &mut ZipWriter<W>,
) -> cf_core::Result<ArchiveSummary> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    let mut summary = ArchiveSummary::default();

    for url in urls {
        let mut media = match handle.block_on(fetcher.fetch(url)) {
            Ok(media) => media,
            Err(e) => {
                tracing::warn!(url = %url, "Skipping archive entry: {e}");
                summary.skipped.push(url.clone());
                continue;
            }
        };

        let name = entry_name(summary.written + 1);
        zip.start_file(name.as_str(), options)
            .map_err(|e| Error::Archive(format!("failed to start {name}: {e}")))?;

        let mut bytes: u64 = 0;
        while let Some(chunk) = handle.block_on(media.next_chunk())? {
            zip.write_all(&chunk)
                .map_err(|e| Error::Archive(format!("failed to write {name}: {e}")))?;
            bytes += chunk.len() as u64;
        }

        summary.written += 1;
        tracing::debug!(url = %url, entry = %name, bytes, "Archive entry written");
    }

    Ok(summary)
}

/// `Write` adapter feeding a bounded channel from a blocking thread.
///
/// Once `aborted` is set, buffered bytes are discarded and every write fails.
struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    buf: Vec<u8>,
    aborted: Arc<AtomicBool>,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<io::Result<Bytes>>, aborted: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(CHUNK_SIZE),
            aborted,
        }
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.aborted.load(Ordering::Acquire) {
            self.buf.clear();
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "archive aborted"));
        }
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::replace(
            &mut self.buf,
            Vec::with_capacity(CHUNK_SIZE),
        ));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive receiver closed"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.aborted.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "archive aborted"));
        }
        self.buf.extend_from_slice(data);
        if self.buf.len() >= CHUNK_SIZE {
            self.send_buffered()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        if let Err(e) = self.send_buffered() {
            tracing::debug!("Dropping archive tail: {e}");
        }
    }
}
