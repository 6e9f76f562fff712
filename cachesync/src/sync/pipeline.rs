//! Transfer pipeline: download, observe, decompress, clean up.
//!
//! One [`TransferTask`] runs at a time. While the download is in flight the
//! pipeline waits on whichever comes first: the progress interval elapsing
//! (emit a tick) or the completion signal (emit a final snapshot and stop).
//!
//! Compressed payloads land at `<final>.xz` and are decoded as a single xz
//! stream into the final path, after which the intermediate is removed. On
//! failure, a download target the transfer already wrote to (and a partial
//! final file) is removed, so a later run sees the file as absent and
//! fetches it again. A download that fails before opening its target, such
//! as an HTTP error status, leaves the existing local file as it was.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use xz2::read::XzDecoder;

use super::error::{SyncError, SyncResult};
use super::progress::SyncObserver;
use super::transport::{DownloadExecutor, DownloadPoll};

/// Suffix appended to the final path (and URL) of compressed payloads.
pub const COMPRESSED_SUFFIX: &str = ".xz";

/// Default interval between progress snapshots.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(50);

/// Buffer size for decompression (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Path where the compressed payload for `final_path` is downloaded.
pub fn intermediate_path(final_path: &Path) -> PathBuf {
    let mut path: OsString = final_path.as_os_str().to_owned();
    path.push(COMPRESSED_SUFFIX);
    PathBuf::from(path)
}

/// A single unit of transfer work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    /// Human-readable name used in progress output.
    pub label: String,
    /// Source URL.
    pub url: String,
    /// Where the downloaded bytes land.
    pub download_path: PathBuf,
    /// Where the usable file ends up.
    pub final_path: PathBuf,
    /// Whether `download_path` must be decompressed into `final_path`.
    pub decompress: bool,
    /// Declared transport size, used when the response has no length.
    pub expected_size: u64,
}

impl TransferTask {
    /// A task that downloads straight to `final_path`.
    pub fn plain(
        label: impl Into<String>,
        url: impl Into<String>,
        final_path: PathBuf,
        expected_size: u64,
    ) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            download_path: final_path.clone(),
            final_path,
            decompress: false,
            expected_size,
        }
    }

    /// A task that downloads beside `final_path` and then decompresses.
    pub fn compressed(
        label: impl Into<String>,
        url: impl Into<String>,
        final_path: PathBuf,
        expected_size: u64,
    ) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            download_path: intermediate_path(&final_path),
            final_path,
            decompress: true,
            expected_size,
        }
    }
}

/// Result of a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Bytes received over the wire.
    pub bytes_transferred: u64,
    /// Bytes in the final file.
    pub bytes_written: u64,
}

/// Runs transfer tasks one at a time through a [`DownloadExecutor`].
#[derive(Debug)]
pub struct TransferPipeline<D: DownloadExecutor> {
    downloader: D,
    progress_interval: Duration,
}

impl<D: DownloadExecutor> TransferPipeline<D> {
    /// Create a pipeline with the given progress interval.
    pub fn new(downloader: D, progress_interval: Duration) -> Self {
        Self {
            downloader,
            progress_interval,
        }
    }

    /// Get a reference to the underlying download executor.
    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    /// Interval between progress snapshots.
    pub fn progress_interval(&self) -> Duration {
        self.progress_interval
    }

    /// Execute `task`, reporting progress to `observer`.
    pub fn run(
        &self,
        task: &TransferTask,
        observer: &dyn SyncObserver,
    ) -> SyncResult<TransferOutcome> {
        if let Some(parent) = task.download_path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::local_io(parent, e))?;
        }

        tracing::info!(
            url = %task.url,
            path = %task.download_path.display(),
            decompress = task.decompress,
            "Starting transfer"
        );

        let handle = self.downloader.start(&task.url, &task.download_path)?;

        let result = loop {
            match handle.poll(self.progress_interval) {
                DownloadPoll::Pending => {
                    observer.transfer_progress(&task.label, &handle.snapshot(task.expected_size));
                }
                DownloadPoll::Done(result) => {
                    observer.transfer_finished(&task.label, &handle.snapshot(task.expected_size));
                    break result;
                }
            }
        };

        let bytes_transferred = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                // A transfer that never opened its target leaves any
                // existing file untouched.
                if handle.counters().destination_created() {
                    remove_partial(&task.download_path);
                }
                return Err(e);
            }
        };

        if task.expected_size > 0 && bytes_transferred != task.expected_size {
            tracing::warn!(
                url = %task.url,
                declared = task.expected_size,
                received = bytes_transferred,
                "Transfer size differs from declared size"
            );
        }

        if !task.decompress {
            return Ok(TransferOutcome {
                bytes_transferred,
                bytes_written: bytes_transferred,
            });
        }

        let bytes_written = match decompress_file(&task.download_path, &task.final_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_partial(&task.final_path);
                remove_partial(&task.download_path);
                return Err(e);
            }
        };

        fs::remove_file(&task.download_path)
            .map_err(|e| SyncError::local_io(&task.download_path, e))?;

        tracing::debug!(
            path = %task.final_path.display(),
            compressed = bytes_transferred,
            decompressed = bytes_written,
            "Decompressed payload"
        );

        Ok(TransferOutcome {
            bytes_transferred,
            bytes_written,
        })
    }
}

/// Decode the single xz stream in `src` into `dest`.
///
/// Returns the number of decompressed bytes written.
pub fn decompress_file(src: &Path, dest: &Path) -> SyncResult<u64> {
    let input = File::open(src).map_err(|e| SyncError::local_io(src, e))?;
    let mut decoder = XzDecoder::new(input);

    let output = File::create(dest).map_err(|e| SyncError::local_io(dest, e))?;
    let mut writer = BufWriter::new(output);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let bytes_read = match decoder.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(SyncError::Decompression {
                    path: src.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };

        if bytes_read == 0 {
            break;
        }

        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|e| SyncError::local_io(dest, e))?;

        written += bytes_read as u64;
    }

    writer.flush().map_err(|e| SyncError::local_io(dest, e))?;

    Ok(written)
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove partial file"
        ),
    }
}
