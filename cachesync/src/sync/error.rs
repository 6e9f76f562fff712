//! Error types for the synchronization engine.
//!
//! Failures fall into four families: transport (manifest or file fetch),
//! manifest parsing (including per-file declaration checks), local
//! filesystem I/O and decompression. Where a failure
//! is absorbed (per file, per partition) is decided by the synchronizers, not
//! by the error itself.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised while parsing a manifest document.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The document is not well-formed or misses a required attribute.
    #[error("malformed manifest: {0}")]
    Malformed(String),
}

impl From<quick_xml::DeError> for ManifestError {
    fn from(e: quick_xml::DeError) -> Self {
        ManifestError::Malformed(e.to_string())
    }
}

/// Errors that can occur while synchronizing against a remote manifest.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A manifest or file fetch failed (network error, HTTP status).
    #[error("failed to fetch {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),

    /// A fetch exceeded the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// A manifest document could not be parsed.
    #[error("failed to parse manifest from {url}: {source}")]
    ManifestParse {
        url: String,
        #[source]
        source: ManifestError,
    },

    /// A local path could not be read, written or removed.
    #[error("I/O error on {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A compressed payload was corrupt or truncated.
    #[error("failed to decompress {}: {reason}", path.display())]
    Decompression { path: PathBuf, reason: String },

    /// A declared file name would escape the output directory.
    #[error("refusing unsafe file name {name:?}")]
    UnsafePath { name: String },

    /// A declared digest is not a 160-bit hexadecimal value.
    #[error("invalid digest {digest:?} for {name}")]
    InvalidDigest { name: String, digest: String },
}

impl SyncError {
    pub(crate) fn local_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::HttpClient(_)
        )
    }
}
