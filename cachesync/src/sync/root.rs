//! Top-level synchronization pass.
//!
//! ```text
//! Start → FetchingPartitionList ─┬─► Failed (fatal)
//!                                └─► SyncingPartitions (sequential)
//!                                        └─► UpdatingExecutable ─┬─► Failed
//!                                                                └─► Done
//! ```
//!
//! Only the partition list is fatal. Partition and file failures are
//! recorded in the [`SyncReport`] and never stop sibling work.

use std::fs::File;

use super::error::{SyncError, SyncResult};
use super::manifest::{parse_partition_list, Partition};
use super::partition::PartitionSynchronizer;
use super::pipeline::{TransferOutcome, TransferPipeline, TransferTask};
use super::progress::SyncObserver;
use super::report::SyncReport;
use super::transport::{DownloadExecutor, HttpTransport, ManifestSource};
use crate::config::SyncConfig;

/// Drives a full synchronization pass.
#[derive(Debug)]
pub struct RootSynchronizer<M: ManifestSource, D: DownloadExecutor> {
    source: M,
    pipeline: TransferPipeline<D>,
    config: SyncConfig,
}

impl RootSynchronizer<HttpTransport, HttpTransport> {
    /// Create a synchronizer that talks HTTP.
    pub fn over_http(config: SyncConfig) -> SyncResult<Self> {
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::new(transport.clone(), transport, config))
    }
}

impl<M: ManifestSource, D: DownloadExecutor> RootSynchronizer<M, D> {
    /// Create a synchronizer from its collaborators.
    pub fn new(source: M, downloader: D, config: SyncConfig) -> Self {
        let pipeline = TransferPipeline::new(downloader, config.progress_interval);
        Self {
            source,
            pipeline,
            config,
        }
    }

    /// The manifest source.
    pub fn source(&self) -> &M {
        &self.source
    }

    /// The transfer pipeline.
    pub fn pipeline(&self) -> &TransferPipeline<D> {
        &self.pipeline
    }

    /// The configuration in use.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Fetch and parse the partition list.
    pub fn fetch_partitions(&self) -> SyncResult<Vec<Partition>> {
        let url = self.config.partition_list_url();
        let xml = self.source.fetch_text(&url)?;
        parse_partition_list(&xml).map_err(|source| SyncError::ManifestParse { url, source })
    }

    /// Run a full pass.
    ///
    /// Returns `Err` only when the partition list cannot be fetched or
    /// parsed; everything else is reported in the [`SyncReport`].
    pub fn run(&self, observer: &dyn SyncObserver) -> SyncResult<SyncReport> {
        tracing::info!(
            url = %self.config.base_url,
            output = %self.config.output_dir.display(),
            "Starting synchronization"
        );

        let partitions = match self.fetch_partitions() {
            Ok(partitions) => partitions,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch partition list");
                return Err(e);
            }
        };

        tracing::debug!(count = partitions.len(), "Fetched partition list");

        let partition_sync = PartitionSynchronizer::new(&self.source, &self.pipeline, &self.config);
        let reports = partitions
            .iter()
            .map(|partition| partition_sync.sync(partition, observer))
            .collect();

        let executable = self.update_executable(observer);
        if let Err(e) = &executable {
            tracing::warn!(error = %e, "Failed to update executable");
            observer.file_failed(&self.config.executable.local_name, e);
        }

        let report = SyncReport {
            partitions: reports,
            executable,
        };

        tracing::info!(
            fetched = report.files_fetched(),
            skipped = report.files_skipped(),
            failed = report.failure_count(),
            "Synchronization finished"
        );

        Ok(report)
    }

    /// Download and decompress the distinguished executable, then create
    /// its marker file.
    pub fn update_executable(&self, observer: &dyn SyncObserver) -> SyncResult<TransferOutcome> {
        let target = &self.config.executable;
        let final_path = self.config.output_dir.join(&target.local_name);

        let task = TransferTask::compressed(
            target.local_name.as_str(),
            self.config.executable_url(),
            final_path,
            0,
        );
        let outcome = self.pipeline.run(&task, observer)?;

        let marker = self.config.output_dir.join(&target.marker_name);
        File::create(&marker).map_err(|e| SyncError::local_io(&marker, e))?;

        tracing::info!(path = %task.final_path.display(), "Executable updated");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::pipeline::tests::xz;
    use crate::sync::progress::tests::{Event, RecordingObserver};
    use crate::sync::progress::NoopObserver;
    use crate::sync::transport::tests::{MockDownloader, MockManifestSource};
    use sha1::{Digest, Sha1};
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    const BASE: &str = "http://cdn.example.com/content";
    const EXE: &[u8] = b"MZ\x90\x00 pretend executable";

    fn sha1_hex(data: &[u8]) -> String {
        format!("{:X}", Sha1::digest(data))
    }

    fn content(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    fn entry(name: &str, data: &[u8], compressed_size: usize) -> String {
        format!(
            r#"<ContentFile Name="{}" Size="{}" SHA1Hash="{}" CompressedSize="{}" />"#,
            name,
            data.len(),
            sha1_hex(data),
            compressed_size
        )
    }

    fn config(out: &Path) -> SyncConfig {
        SyncConfig::new(BASE, out).with_progress_interval(Duration::from_millis(1))
    }

    fn downloads_under(sync: &RootSynchronizer<MockManifestSource, MockDownloader>, prefix: &str) -> usize {
        sync.pipeline()
            .downloader()
            .requests()
            .iter()
            .filter(|(url, _)| url.starts_with(prefix))
            .count()
    }

    #[test]
    fn test_end_to_end_then_idempotent() {
        let temp = TempDir::new().unwrap();
        let data = content(1000, 3);
        let packed = xz(&data);

        let source = MockManifestSource::default()
            .with_document(
                &format!("{BASE}/caches.xml"),
                r#"<Caches><Cache ID="base" Version="3" /></Caches>"#,
            )
            .with_document(
                &format!("{BASE}/diff/base/info.xml"),
                &format!("<CacheInfo>{}</CacheInfo>", entry("data.bin", &data, packed.len())),
            );
        let downloader = MockDownloader::default()
            .with_payload(&format!("{BASE}/diff/base/data.bin.xz"), packed.clone())
            .with_payload(&format!("{BASE}/CitizenFX.exe.xz"), xz(EXE));

        let sync = RootSynchronizer::new(source, downloader, config(temp.path()));
        let observer = RecordingObserver::default();

        let report = sync.run(&observer).unwrap();

        assert!(report.is_success(), "{report:?}");
        assert_eq!(report.partitions.len(), 1);
        assert_eq!(report.partitions[0].fetched, 1);
        assert_eq!(fs::read(temp.path().join("data.bin")).unwrap(), data);
        assert!(!temp.path().join("data.bin.xz").exists());
        assert_eq!(fs::read(temp.path().join("FiveM.exe")).unwrap(), EXE);
        assert!(!temp.path().join("FiveM.exe.xz").exists());
        assert_eq!(
            fs::metadata(temp.path().join("FiveM.exe.formaldev")).unwrap().len(),
            0
        );

        let finished = observer.finished();
        assert_eq!(finished[0].0, "data.bin");
        assert_eq!(finished[0].1.bytes_complete, packed.len() as u64);

        // Second pass: nothing under diff/ is downloaded again
        let observer = RecordingObserver::default();
        let report = sync.run(&observer).unwrap();

        assert_eq!(report.partitions[0].skipped, 1);
        assert_eq!(report.partitions[0].fetched, 0);
        assert_eq!(downloads_under(&sync, &format!("{BASE}/diff/")), 1);
        assert_eq!(observer.skipped(), vec!["data.bin".to_string()]);
    }

    #[test]
    fn test_partition_failure_does_not_block_next_partition() {
        let temp = TempDir::new().unwrap();
        let plain = content(64, 1);
        let big = content(20_000, 2);
        let packed = xz(&big);

        let source = MockManifestSource::default()
            .with_document(
                &format!("{BASE}/caches.xml"),
                r#"<Caches><Cache ID="A" Version="1" /><Cache ID="B" Version="7" /></Caches>"#,
            )
            .with_failure(
                &format!("{BASE}/diff/A/info.xml"),
                "GET request failed with status 500 Internal Server Error",
            )
            .with_document(
                &format!("{BASE}/diff/B/info.xml"),
                &format!(
                    "<CacheInfo>{}{}</CacheInfo>",
                    entry("plain.dat", &plain, plain.len()),
                    entry("sub/big.dat", &big, packed.len())
                ),
            );
        let downloader = MockDownloader::default()
            .with_payload(&format!("{BASE}/diff/B/plain.dat"), plain.clone())
            .with_payload(&format!("{BASE}/diff/B/sub/big.dat.xz"), packed)
            .with_payload(&format!("{BASE}/CitizenFX.exe.xz"), xz(EXE));

        let sync = RootSynchronizer::new(source, downloader, config(temp.path()));
        let observer = RecordingObserver::default();
        let report = sync.run(&observer).unwrap();

        assert!(report.partitions[0].manifest_error.is_some());
        assert_eq!(report.partitions[1].fetched, 2);
        assert_eq!(report.failure_count(), 1);
        assert!(!report.is_success());
        assert_eq!(fs::read(temp.path().join("plain.dat")).unwrap(), plain);
        assert_eq!(fs::read(temp.path().join("sub").join("big.dat")).unwrap(), big);

        assert_eq!(
            sync.source().requests(),
            vec![
                format!("{BASE}/caches.xml"),
                format!("{BASE}/diff/A/info.xml"),
                format!("{BASE}/diff/B/info.xml"),
            ]
        );

        let started: Vec<_> = observer
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::PartitionStarted(id) => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_partition_list_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let sync = RootSynchronizer::new(
            MockManifestSource::default(),
            MockDownloader::default().with_payload(&format!("{BASE}/CitizenFX.exe.xz"), xz(EXE)),
            config(temp.path()),
        );

        let result = sync.run(&NoopObserver);

        assert!(result.unwrap_err().is_transport());
        assert_eq!(sync.pipeline().downloader().request_count(), 0);
        assert!(!temp.path().join("FiveM.exe").exists());
    }

    #[test]
    fn test_malformed_partition_list_is_fatal() {
        let temp = TempDir::new().unwrap();
        let source = MockManifestSource::default()
            .with_document(&format!("{BASE}/caches.xml"), "<Caches><Cache ID=");
        let sync = RootSynchronizer::new(source, MockDownloader::default(), config(temp.path()));

        let result = sync.run(&NoopObserver);
        assert!(matches!(result, Err(SyncError::ManifestParse { .. })));
    }

    #[test]
    fn test_executable_failure_is_reported_without_marker() {
        let temp = TempDir::new().unwrap();
        let source = MockManifestSource::default()
            .with_document(&format!("{BASE}/caches.xml"), "<Caches></Caches>");
        let sync = RootSynchronizer::new(source, MockDownloader::default(), config(temp.path()));
        let observer = RecordingObserver::default();

        let report = sync.run(&observer).unwrap();

        assert!(report.executable.is_err());
        assert_eq!(report.failure_count(), 1);
        assert!(!temp.path().join("FiveM.exe").exists());
        assert!(!temp.path().join("FiveM.exe.formaldev").exists());
        assert!(observer
            .events()
            .contains(&Event::Failed("FiveM.exe".to_string())));
    }

    #[test]
    fn test_executable_is_always_refreshed() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("FiveM.exe"), b"old build").unwrap();

        let source = MockManifestSource::default()
            .with_document(&format!("{BASE}/caches.xml"), "<Caches></Caches>");
        let downloader =
            MockDownloader::default().with_payload(&format!("{BASE}/CitizenFX.exe.xz"), xz(EXE));
        let sync = RootSynchronizer::new(source, downloader, config(temp.path()));

        let outcome = sync.update_executable(&NoopObserver).unwrap();

        assert_eq!(outcome.bytes_written, EXE.len() as u64);
        assert_eq!(fs::read(temp.path().join("FiveM.exe")).unwrap(), EXE);
        assert!(temp.path().join("FiveM.exe.formaldev").exists());
    }
}
