//! Transport collaborators: manifest fetches and file downloads.
//!
//! The synchronizers only see the [`ManifestSource`] and [`DownloadExecutor`]
//! traits, so tests can swap in in-memory implementations. [`HttpTransport`]
//! is the production implementation built on `reqwest`'s blocking client.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;

use super::error::{SyncError, SyncResult};
use super::progress::{TransferCounters, TransferSnapshot};

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Fetches manifest documents as text.
pub trait ManifestSource: Send + Sync {
    /// Perform a GET against `url` and return the body as UTF-8 text.
    fn fetch_text(&self, url: &str) -> SyncResult<String>;
}

/// Starts file downloads that run in the background.
pub trait DownloadExecutor: Send + Sync {
    /// Begin downloading `url` into `dest`.
    ///
    /// Returns as soon as the transfer is underway; progress and completion
    /// are observed through the returned handle.
    fn start(&self, url: &str, dest: &Path) -> SyncResult<DownloadHandle>;
}

/// Outcome of waiting on a [`DownloadHandle`] for one interval.
#[derive(Debug)]
pub enum DownloadPoll {
    /// The transfer is still running.
    Pending,
    /// The transfer finished with the given byte count or error.
    Done(SyncResult<u64>),
}

/// Handle to an in-flight download.
#[derive(Debug)]
pub struct DownloadHandle {
    url: String,
    counters: Arc<TransferCounters>,
    done: Receiver<SyncResult<u64>>,
}

impl DownloadHandle {
    /// Run `transfer` on a worker thread and return a handle to observe it.
    pub fn spawn<F>(url: &str, transfer: F) -> Self
    where
        F: FnOnce(&TransferCounters) -> SyncResult<u64> + Send + 'static,
    {
        let counters = Arc::new(TransferCounters::new());
        let worker_counters = Arc::clone(&counters);
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = transfer(&worker_counters);
            // The receiver only goes away if the pipeline stopped observing.
            tx.send(result).ok();
        });

        Self {
            url: url.to_string(),
            counters,
            done: rx,
        }
    }

    /// The URL being downloaded.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Shared progress counters.
    pub fn counters(&self) -> &TransferCounters {
        &self.counters
    }

    /// Snapshot the current progress.
    pub fn snapshot(&self, declared_size: u64) -> TransferSnapshot {
        self.counters.snapshot(declared_size)
    }

    /// Wait up to `interval` for the transfer to complete.
    pub fn poll(&self, interval: Duration) -> DownloadPoll {
        match self.done.recv_timeout(interval) {
            Ok(result) => DownloadPoll::Done(result),
            Err(RecvTimeoutError::Timeout) => DownloadPoll::Pending,
            Err(RecvTimeoutError::Disconnected) => DownloadPoll::Done(Err(SyncError::Transport {
                url: self.url.clone(),
                reason: "download worker exited without reporting a result".to_string(),
            })),
        }
    }
}

/// HTTP transport using `reqwest`'s blocking client.
///
/// Implements both [`ManifestSource`] and [`DownloadExecutor`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Create a transport. `None` disables the request timeout.
    pub fn new(timeout: Option<Duration>) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::HttpClient(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// The configured request timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl ManifestSource for HttpTransport {
    fn fetch_text(&self, url: &str) -> SyncResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| request_error(url, e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Transport {
                url: url.to_string(),
                reason: format!("GET request failed with status {}", status),
            });
        }

        response
            .text()
            .map_err(|e| request_error(url, e, self.timeout))
    }
}

impl DownloadExecutor for HttpTransport {
    fn start(&self, url: &str, dest: &Path) -> SyncResult<DownloadHandle> {
        let client = self.client.clone();
        let timeout = self.timeout;
        let owned_url = url.to_string();
        let dest = dest.to_path_buf();

        Ok(DownloadHandle::spawn(url, move |counters| {
            stream_download(&client, &owned_url, &dest, timeout, counters)
        }))
    }
}

/// Stream the response body of `url` into `dest`.
///
/// The destination is only created once the server has answered with a
/// success status.
fn stream_download(
    client: &Client,
    url: &str,
    dest: &Path,
    timeout: Option<Duration>,
    counters: &TransferCounters,
) -> SyncResult<u64> {
    let mut response = client
        .get(url)
        .send()
        .map_err(|e| request_error(url, e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::Transport {
            url: url.to_string(),
            reason: format!("GET request failed with status {}", status),
        });
    }

    if let Some(length) = response.content_length() {
        counters.set_total_size(length);
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| SyncError::local_io(parent, e))?;
    }
    let file = File::create(dest).map_err(|e| SyncError::local_io(dest, e))?;
    counters.mark_destination_created();

    let mut writer = BufWriter::new(file);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut downloaded = 0u64;

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| SyncError::Transport {
                url: url.to_string(),
                reason: format!("read error: {}", e),
            })?;

        if bytes_read == 0 {
            break;
        }

        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|e| SyncError::local_io(dest, e))?;

        downloaded += bytes_read as u64;
        counters.add_bytes(bytes_read as u64);
    }

    writer.flush().map_err(|e| SyncError::local_io(dest, e))?;

    Ok(downloaded)
}

fn request_error(url: &str, e: reqwest::Error, timeout: Option<Duration>) -> SyncError {
    match timeout {
        Some(timeout) if e.is_timeout() => SyncError::Timeout {
            url: url.to_string(),
            timeout_secs: timeout.as_secs(),
        },
        _ => SyncError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        },
    }
}
