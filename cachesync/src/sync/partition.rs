//! Per-partition synchronization.
//!
//! Files are processed in document order. A failure on one file is logged
//! and recorded, and processing moves on to the next file.

use super::checksum::local_digest;
use super::decision::{decide, SyncDecision};
use super::error::{SyncError, SyncResult};
use super::manifest::{parse_file_list, DeclaredFile, Partition};
use super::pipeline::{TransferOutcome, TransferPipeline, TransferTask, COMPRESSED_SUFFIX};
use super::progress::SyncObserver;
use super::report::{FileFailure, PartitionReport};
use super::transport::{DownloadExecutor, ManifestSource};
use crate::config::SyncConfig;

/// What happened to a single declared file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Local content already matched.
    Skipped,
    /// The file was transferred.
    Fetched(TransferOutcome),
}

/// Synchronizes the files of one partition.
pub struct PartitionSynchronizer<'a, M: ManifestSource, D: DownloadExecutor> {
    source: &'a M,
    pipeline: &'a TransferPipeline<D>,
    config: &'a SyncConfig,
}

impl<'a, M: ManifestSource, D: DownloadExecutor> PartitionSynchronizer<'a, M, D> {
    /// Create a partition synchronizer.
    pub fn new(source: &'a M, pipeline: &'a TransferPipeline<D>, config: &'a SyncConfig) -> Self {
        Self {
            source,
            pipeline,
            config,
        }
    }

    /// Fetch and parse the partition's file list.
    pub fn fetch_files(&self, partition: &Partition) -> SyncResult<Vec<DeclaredFile>> {
        let url = self.config.file_list_url(&partition.id);
        let xml = self.source.fetch_text(&url)?;
        parse_file_list(&xml).map_err(|source| SyncError::ManifestParse { url, source })
    }

    /// Bring every file of `partition` up to date.
    pub fn sync(&self, partition: &Partition, observer: &dyn SyncObserver) -> PartitionReport {
        let mut report = PartitionReport::new(partition.clone());
        observer.partition_started(partition);

        tracing::info!(
            partition = %partition.id,
            version = partition.version,
            "Synchronizing partition"
        );

        let files = match self.fetch_files(partition) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(
                    partition = %partition.id,
                    error = %e,
                    "Skipping partition, file list unavailable"
                );
                report.manifest_error = Some(e);
                return report;
            }
        };

        for file in &files {
            match self.sync_file(partition, file, observer) {
                Ok(FileOutcome::Skipped) => report.skipped += 1,
                Ok(FileOutcome::Fetched(_)) => report.fetched += 1,
                Err(e) => {
                    tracing::warn!(
                        partition = %partition.id,
                        file = %file.name,
                        error = %e,
                        "Failed to synchronize file"
                    );
                    observer.file_failed(&file.name, &e);
                    report.failures.push(FileFailure {
                        name: file.name.clone(),
                        error: e,
                    });
                }
            }
        }

        tracing::info!(
            partition = %partition.id,
            skipped = report.skipped,
            fetched = report.fetched,
            failed = report.failures.len(),
            "Partition done"
        );

        report
    }

    /// Bring a single declared file up to date.
    pub fn sync_file(
        &self,
        partition: &Partition,
        file: &DeclaredFile,
        observer: &dyn SyncObserver,
    ) -> SyncResult<FileOutcome> {
        file.check_digest()?;
        let final_path = file.local_path(&self.config.output_dir)?;
        let local = local_digest(&final_path)?;
        let decision = decide(file, local.as_deref());

        tracing::debug!(
            file = %file.name,
            local = local.as_deref().unwrap_or("-"),
            declared = %file.digest,
            ?decision,
            "Sync decision"
        );

        let task = match decision {
            SyncDecision::Skip => {
                tracing::info!(file = %file.name, "Already exists");
                observer.file_skipped(file);
                return Ok(FileOutcome::Skipped);
            }
            SyncDecision::FetchPlain => TransferTask::plain(
                file.name.as_str(),
                self.config.file_url(&partition.id, &file.name, ""),
                final_path,
                file.compressed_size,
            ),
            SyncDecision::FetchCompressed => TransferTask::compressed(
                file.name.as_str(),
                self.config
                    .file_url(&partition.id, &file.name, COMPRESSED_SUFFIX),
                final_path,
                file.compressed_size,
            ),
        };

        let outcome = self.pipeline.run(&task, observer)?;
        Ok(FileOutcome::Fetched(outcome))
    }
}
