//! Progress snapshots and the observer interface.
//!
//! Transfers run on a worker thread and publish their byte count through
//! atomic counters. The pipeline samples those counters at a fixed interval
//! and hands each sample to a [`SyncObserver`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::error::SyncError;
use super::manifest::{DeclaredFile, Partition};

/// Shared byte counters for one in-flight transfer.
#[derive(Debug, Default)]
pub struct TransferCounters {
    bytes_complete: AtomicU64,
    /// Total size from the response headers; 0 when unknown.
    total_size: AtomicU64,
    /// Set once the destination file has been created or truncated.
    destination_created: AtomicBool,
}

impl TransferCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written to the destination so far.
    pub fn bytes_complete(&self) -> u64 {
        self.bytes_complete.load(Ordering::SeqCst)
    }

    /// Total size reported by the remote, if known.
    pub fn total_size(&self) -> Option<u64> {
        match self.total_size.load(Ordering::SeqCst) {
            0 => None,
            n => Some(n),
        }
    }

    /// Record `bytes` more written.
    pub fn add_bytes(&self, bytes: u64) {
        self.bytes_complete.fetch_add(bytes, Ordering::SeqCst);
    }

    /// Record the total size announced by the remote.
    pub fn set_total_size(&self, total: u64) {
        self.total_size.store(total, Ordering::SeqCst);
    }

    /// Record that the destination file was opened for writing.
    pub fn mark_destination_created(&self) {
        self.destination_created.store(true, Ordering::SeqCst);
    }

    /// Whether the transfer touched the destination file.
    pub fn destination_created(&self) -> bool {
        self.destination_created.load(Ordering::SeqCst)
    }

    /// Take a snapshot, falling back to `declared_size` for the total.
    pub fn snapshot(&self, declared_size: u64) -> TransferSnapshot {
        let total = self.total_size().unwrap_or(declared_size);
        TransferSnapshot::new(self.bytes_complete(), total)
    }
}

/// Point-in-time view of a transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferSnapshot {
    /// Bytes transferred so far.
    pub bytes_complete: u64,
    /// Expected total bytes (0 when unknown).
    pub total_size: u64,
    /// Fraction complete, 0.0 to 1.0.
    pub fraction: f64,
}

impl TransferSnapshot {
    /// Build a snapshot from a byte count and total.
    pub fn new(bytes_complete: u64, total_size: u64) -> Self {
        let fraction = if total_size == 0 {
            0.0
        } else {
            (bytes_complete as f64 / total_size as f64).min(1.0)
        };
        Self {
            bytes_complete,
            total_size,
            fraction,
        }
    }

    /// Progress as a percentage.
    pub fn percent(&self) -> f64 {
        self.fraction * 100.0
    }
}

/// Receives human-facing events from a synchronization pass.
///
/// All methods default to no-ops.
pub trait SyncObserver {
    /// A partition's file list is about to be fetched.
    fn partition_started(&self, _partition: &Partition) {}

    /// A file was skipped because its local digest already matches.
    fn file_skipped(&self, _file: &DeclaredFile) {}

    /// Periodic sample of an in-flight transfer.
    fn transfer_progress(&self, _label: &str, _snapshot: &TransferSnapshot) {}

    /// Final sample of a transfer, emitted once whether it succeeded or not.
    fn transfer_finished(&self, _label: &str, _snapshot: &TransferSnapshot) {}

    /// Processing of one file (or the executable) failed.
    fn file_failed(&self, _label: &str, _error: &SyncError) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Observer event captured by [`RecordingObserver`].
    #[derive(Debug, Clone, PartialEq)]
    pub enum Event {
        PartitionStarted(String),
        Skipped(String),
        Progress(String, TransferSnapshot),
        Finished(String, TransferSnapshot),
        Failed(String),
    }

    /// Observer that records every event for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        pub events: Mutex<Vec<Event>>,
    }

    impl RecordingObserver {
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        pub fn finished(&self) -> Vec<(String, TransferSnapshot)> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Finished(label, s) => Some((label, s)),
                    _ => None,
                })
                .collect()
        }

        pub fn skipped(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Skipped(name) => Some(name),
                    _ => None,
                })
                .collect()
        }
    }

    impl SyncObserver for RecordingObserver {
        fn partition_started(&self, partition: &Partition) {
            self.events
                .lock()
                .unwrap()
                .push(Event::PartitionStarted(partition.id.clone()));
        }

        fn file_skipped(&self, file: &DeclaredFile) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Skipped(file.name.clone()));
        }

        fn transfer_progress(&self, label: &str, snapshot: &TransferSnapshot) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Progress(label.to_string(), *snapshot));
        }

        fn transfer_finished(&self, label: &str, snapshot: &TransferSnapshot) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Finished(label.to_string(), *snapshot));
        }

        fn file_failed(&self, label: &str, _error: &SyncError) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Failed(label.to_string()));
        }
    }

    #[test]
    fn test_counters_start_empty() {
        let counters = TransferCounters::new();
        assert_eq!(counters.bytes_complete(), 0);
        assert_eq!(counters.total_size(), None);
    }

    #[test]
    fn test_counters_accumulate() {
        let counters = TransferCounters::new();
        counters.set_total_size(1000);
        counters.add_bytes(300);
        counters.add_bytes(200);

        assert_eq!(counters.bytes_complete(), 500);
        assert_eq!(counters.total_size(), Some(1000));
    }

    #[test]
    fn test_snapshot_uses_declared_size_when_unknown() {
        let counters = TransferCounters::new();
        counters.add_bytes(100);

        let snapshot = counters.snapshot(400);
        assert_eq!(snapshot.total_size, 400);
        assert_eq!(snapshot.percent(), 25.0);
    }

    #[test]
    fn test_snapshot_prefers_reported_size() {
        let counters = TransferCounters::new();
        counters.set_total_size(200);
        counters.add_bytes(100);

        let snapshot = counters.snapshot(400);
        assert_eq!(snapshot.total_size, 200);
        assert_eq!(snapshot.fraction, 0.5);
    }

    #[test]
    fn test_snapshot_unknown_total_is_zero_fraction() {
        let snapshot = TransferSnapshot::new(123, 0);
        assert_eq!(snapshot.fraction, 0.0);
    }

    #[test]
    fn test_noop_observer_accepts_events() {
        let observer = NoopObserver;
        observer.transfer_progress("a", &TransferSnapshot::new(1, 2));
        observer.transfer_finished("a", &TransferSnapshot::new(2, 2));
    }
}
