//! CLI error type.

use cachesync::config::ConfigError;
use cachesync::logging::LoggingError;
use cachesync::sync::SyncError;
use thiserror::Error;

/// Errors that abort the command before or during a run.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}
