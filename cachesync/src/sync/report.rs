//! Outcome summaries of a synchronization pass.

use super::error::SyncError;
use super::manifest::Partition;
use super::pipeline::TransferOutcome;

/// A file whose processing was aborted.
#[derive(Debug)]
pub struct FileFailure {
    /// Declared file name.
    pub name: String,
    /// Why it failed.
    pub error: SyncError,
}

/// Summary of one partition.
#[derive(Debug)]
pub struct PartitionReport {
    /// The partition that was processed.
    pub partition: Partition,
    /// Files already up to date.
    pub skipped: usize,
    /// Files downloaded (and decompressed where needed).
    pub fetched: usize,
    /// Files whose processing failed.
    pub failures: Vec<FileFailure>,
    /// Set when the partition's file list could not be fetched or parsed.
    pub manifest_error: Option<SyncError>,
}

impl PartitionReport {
    /// Create an empty report for `partition`.
    pub fn new(partition: Partition) -> Self {
        Self {
            partition,
            skipped: 0,
            fetched: 0,
            failures: Vec::new(),
            manifest_error: None,
        }
    }

    /// Number of failures, counting a manifest failure as one.
    pub fn failure_count(&self) -> usize {
        self.failures.len() + usize::from(self.manifest_error.is_some())
    }

    /// Whether every file of the partition is now up to date.
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Summary of a full pass.
#[derive(Debug)]
pub struct SyncReport {
    /// Per-partition summaries, in document order.
    pub partitions: Vec<PartitionReport>,
    /// Result of the executable update.
    pub executable: Result<TransferOutcome, SyncError>,
}

impl SyncReport {
    /// Total files skipped across partitions.
    pub fn files_skipped(&self) -> usize {
        self.partitions.iter().map(|p| p.skipped).sum()
    }

    /// Total files fetched across partitions.
    pub fn files_fetched(&self) -> usize {
        self.partitions.iter().map(|p| p.fetched).sum()
    }

    /// Total failures, including the executable update.
    pub fn failure_count(&self) -> usize {
        self.partitions
            .iter()
            .map(PartitionReport::failure_count)
            .sum::<usize>()
            + usize::from(self.executable.is_err())
    }

    /// Whether the pass completed without any failure.
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}
