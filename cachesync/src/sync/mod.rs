//! Incremental synchronization of a local directory against remote
//! manifests.
//!
//! The remote side publishes a partition list (`caches.xml`) and, per
//! partition, a file list (`diff/<id>/info.xml`). Each declared file is
//! compared with its local copy by SHA-1 digest and fetched only when it
//! differs, either plain or as an xz-compressed payload.
//!
//! # Architecture
//!
//! ```text
//! RootSynchronizer
//!         │
//!         ├── ManifestSource (trait)      caches.xml, info.xml
//!         │
//!         ├── PartitionSynchronizer       one per partition, in order
//!         │       ├── local_digest + decide
//!         │       └── TransferPipeline
//!         │               ├── DownloadExecutor (trait)
//!         │               └── decompress_file
//!         │
//!         └── SyncObserver (trait)        progress and outcomes
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cachesync::config::SyncConfig;
//! use cachesync::sync::{NoopObserver, RootSynchronizer};
//!
//! let config = SyncConfig::new("http://cdn.example.com/content", "./game");
//! let sync = RootSynchronizer::over_http(config)?;
//! let report = sync.run(&NoopObserver)?;
//! println!("{} fetched, {} failed", report.files_fetched(), report.failure_count());
//! ```

mod checksum;
mod decision;
mod error;
mod manifest;
mod partition;
mod pipeline;
mod progress;
mod report;
mod root;
mod transport;

pub use checksum::{digests_match, local_digest, DIGEST_HEX_LEN};
pub use decision::{decide, SyncDecision};
pub use error::{ManifestError, SyncError, SyncResult};
pub use manifest::{parse_file_list, parse_partition_list, DeclaredFile, Partition};
pub use partition::{FileOutcome, PartitionSynchronizer};
pub use pipeline::{
    decompress_file, intermediate_path, TransferOutcome, TransferPipeline, TransferTask,
    COMPRESSED_SUFFIX, DEFAULT_PROGRESS_INTERVAL,
};
pub use progress::{NoopObserver, SyncObserver, TransferCounters, TransferSnapshot};
pub use report::{FileFailure, PartitionReport, SyncReport};
pub use root::RootSynchronizer;
pub use transport::{DownloadExecutor, DownloadHandle, DownloadPoll, HttpTransport, ManifestSource};
