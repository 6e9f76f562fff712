//! CacheSync CLI - Command-line interface
//!
//! Synchronizes a local directory against a manifest-driven HTTP source.

mod error;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use cachesync::config::{ConfigFile, SyncConfig};
use cachesync::logging::{init_logging, LoggingConfig};
use cachesync::sync::{RootSynchronizer, SyncReport};
use clap::Parser;
use console::style;

use crate::error::CliError;
use crate::output::ConsoleObserver;

/// Exit code for a run that could not start or could not read the
/// partition list.
const EXIT_FATAL: u8 = 1;

/// Exit code for a run that completed with failures.
const EXIT_PARTIAL: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "cachesync")]
#[command(version, about = "Incrementally synchronize a directory from remote XML manifests", long_about = None)]
struct Cli {
    /// Base URL of the content source (hosts caches.xml)
    url: String,

    /// Local directory to synchronize
    #[arg(short = 'o', long = "out-path", alias = "outPath", default_value = ".")]
    out_path: PathBuf,

    /// Config file (default: <config dir>/cachesync/config.ini)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Request timeout in seconds (0 disables)
    #[arg(long)]
    timeout: Option<u64>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn load_config_file(&self) -> Result<ConfigFile, CliError> {
        let file = match &self.config {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };
        Ok(file)
    }

    fn logging_config(&self, file: &ConfigFile) -> LoggingConfig {
        let mut logging = file.logging_config();
        if self.verbose {
            logging.level = "debug".to_string();
        }
        if let Some(path) = &self.log_file {
            logging.file = Some(path.clone());
        }
        logging
    }

    /// Command-line flags override file settings.
    fn sync_config(&self, file: &ConfigFile) -> SyncConfig {
        let config = file.apply(SyncConfig::new(self.url.clone(), self.out_path.clone()));
        match self.timeout {
            Some(secs) => config.with_timeout((secs > 0).then(|| Duration::from_secs(secs))),
            None => config,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(report) => exit_code(&report),
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(cli: &Cli) -> Result<SyncReport, CliError> {
    let file = cli.load_config_file()?;
    let _logging = init_logging(&cli.logging_config(&file))?;

    let config = cli.sync_config(&file);
    tracing::debug!(?config, "Resolved configuration");

    let sync = RootSynchronizer::over_http(config)?;
    let observer = ConsoleObserver::new();
    let report = sync.run(&observer)?;
    observer.summary(&report);

    Ok(report)
}

fn exit_code(report: &SyncReport) -> ExitCode {
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL)
    }
}
