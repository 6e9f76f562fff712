//! Skip-or-fetch decision for a single declared file.

use super::checksum::digests_match;
use super::manifest::DeclaredFile;

/// What to do with one declared file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Local content already matches the declared digest.
    Skip,
    /// Download the payload directly to the final path.
    FetchPlain,
    /// Download the compressed payload beside the final path, then decompress.
    FetchCompressed,
}

impl SyncDecision {
    /// Whether this decision involves a transfer.
    pub fn needs_fetch(&self) -> bool {
        !matches!(self, Self::Skip)
    }
}

/// Decide what to do with `file` given the digest of the local copy, if any.
///
/// Compression is inferred from the declared sizes alone.
pub fn decide(file: &DeclaredFile, local_digest: Option<&str>) -> SyncDecision {
    match local_digest {
        Some(local) if digests_match(local, &file.digest) => SyncDecision::Skip,
        _ if file.is_compressed() => SyncDecision::FetchCompressed,
        _ => SyncDecision::FetchPlain,
    }
}
