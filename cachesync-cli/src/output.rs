//! Terminal rendering of synchronization progress.
//!
//! ```text
//!   Partition fivereborn (version 12)
//!     Skipped readme.txt already exists
//! data/archive.rpf: 1.20 MiB / 3.45 MiB (34%)
//!      Synced 2 fetched, 1 skipped in 3.21s
//! ```

use std::sync::Mutex;
use std::time::Instant;

use cachesync::sync::{
    DeclaredFile, Partition, SyncError, SyncObserver, SyncReport, TransferSnapshot,
};
use console::{Style, Term};
use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Status verbs, right-aligned to 12 columns.
struct Status;

impl Status {
    const PARTITION: &'static str = "Partition";
    const SKIPPED: &'static str = "Skipped";
    const FAILED: &'static str = "Failed";
    const SYNCED: &'static str = "Synced";
    const FINISHED: &'static str = "Finished";
}

/// Format a progress line: `name: bytes / total (pct%)`.
pub fn progress_line(label: &str, snapshot: &TransferSnapshot) -> String {
    format!(
        "{}: {} / {} ({:.0}%)",
        label,
        HumanBytes(snapshot.bytes_complete),
        HumanBytes(snapshot.total_size),
        snapshot.percent()
    )
}

/// Format an elapsed time the way the summary line shows it.
pub fn format_elapsed(secs: f64) -> String {
    if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{}ms", (secs * 1000.0).round() as u64)
    }
}

fn write_line(term: &Term, line: &str) {
    // A closed terminal must not abort the sync; tracing still records events.
    term.write_line(line).ok();
}

/// One progress line per active transfer.
struct ActiveBar {
    label: String,
    bar: ProgressBar,
}

/// Observer that renders to the terminal.
pub struct ConsoleObserver {
    term: Term,
    err_term: Term,
    hidden: bool,
    active: Mutex<Option<ActiveBar>>,
    start: Instant,
}

impl ConsoleObserver {
    /// Render status lines to stdout and progress to stderr.
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
            err_term: Term::stderr(),
            hidden: false,
            active: Mutex::new(None),
            start: Instant::now(),
        }
    }

    /// An observer that draws nothing.
    pub fn hidden() -> Self {
        Self {
            hidden: true,
            ..Self::new()
        }
    }

    fn status(&self, term: &Term, style: Style, status: &str, message: &str) {
        if self.hidden {
            return;
        }
        let line = format!("{:>12} {}", style.apply_to(status), message);
        match self.active.lock() {
            Ok(active) => match active.as_ref() {
                Some(active) => active.bar.println(line),
                None => write_line(term, &line),
            },
            Err(_) => write_line(term, &line),
        }
    }

    fn new_bar(&self, label: &str) -> ProgressBar {
        let target = if self.hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };
        let bar = ProgressBar::with_draw_target(None, target);
        bar.set_style(ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()));
        bar.set_message(label.to_string());
        bar
    }

    /// Print the end-of-run summary.
    pub fn summary(&self, report: &SyncReport) {
        let elapsed = format_elapsed(self.start.elapsed().as_secs_f64());
        let failures = report.failure_count();

        if failures == 0 {
            self.status(
                &self.term,
                Style::new().green().bold(),
                Status::SYNCED,
                &format!(
                    "{} fetched, {} skipped in {}",
                    report.files_fetched(),
                    report.files_skipped(),
                    elapsed
                ),
            );
        } else {
            self.status(
                &self.err_term,
                Style::new().yellow().bold(),
                Status::FINISHED,
                &format!(
                    "{} fetched, {} skipped, {} failed in {}",
                    report.files_fetched(),
                    report.files_skipped(),
                    failures,
                    elapsed
                ),
            );
        }
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncObserver for ConsoleObserver {
    fn partition_started(&self, partition: &Partition) {
        self.status(
            &self.term,
            Style::new().cyan().bold(),
            Status::PARTITION,
            &format!("{} (version {})", partition.id, partition.version),
        );
    }

    fn file_skipped(&self, file: &DeclaredFile) {
        self.status(
            &self.term,
            Style::new().dim(),
            Status::SKIPPED,
            &format!("{} already exists", file.name),
        );
    }

    fn transfer_progress(&self, label: &str, snapshot: &TransferSnapshot) {
        let Ok(mut active) = self.active.lock() else {
            return;
        };
        if active.as_ref().map(|a| a.label.as_str()) != Some(label) {
            if let Some(previous) = active.take() {
                previous.bar.finish_and_clear();
            }
            *active = Some(ActiveBar {
                label: label.to_string(),
                bar: self.new_bar(label),
            });
        }
        if let Some(active) = active.as_ref() {
            active.bar.set_message(progress_line(label, snapshot));
        }
    }

    fn transfer_finished(&self, label: &str, snapshot: &TransferSnapshot) {
        let finished = match self.active.lock() {
            Ok(mut active) => active.take(),
            Err(_) => return,
        };
        let line = progress_line(label, snapshot);
        match finished {
            Some(active) => active.bar.finish_with_message(line),
            None if !self.hidden => write_line(&self.err_term, &line),
            None => {}
        }
    }

    fn file_failed(&self, label: &str, error: &SyncError) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(previous) = active.take() {
                previous.bar.abandon();
            }
        }
        self.status(
            &self.err_term,
            Style::new().red().bold(),
            Status::FAILED,
            &format!("{}: {}", label, error),
        );
    }
}
