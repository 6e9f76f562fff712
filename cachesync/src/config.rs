//! Configuration for a synchronization run.
//!
//! [`SyncConfig`] is the value threaded through every synchronizer. It is
//! built from defaults, then an optional INI file ([`ConfigFile`]), then
//! command-line overrides.
//!
//! ```text
//! [sync]
//! timeout_secs = 0
//! progress_interval_ms = 50
//!
//! [executable]
//! remote_name = CitizenFX.exe.xz
//! local_name = FiveM.exe
//! marker_name = FiveM.exe.formaldev
//!
//! [logging]
//! level = info
//! file = /var/log/cachesync.log
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::logging::LoggingConfig;
use crate::sync::DEFAULT_PROGRESS_INTERVAL;

/// Remote name of the distinguished executable (always xz-compressed).
pub const DEFAULT_EXECUTABLE_REMOTE_NAME: &str = "CitizenFX.exe.xz";

/// Local name of the distinguished executable.
pub const DEFAULT_EXECUTABLE_LOCAL_NAME: &str = "FiveM.exe";

/// Zero-byte marker created beside the executable after an update.
pub const DEFAULT_EXECUTABLE_MARKER_NAME: &str = "FiveM.exe.formaldev";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The explicitly requested config file does not exist.
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The config file could not be read or parsed.
    #[error("failed to load config file {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    /// A value in the config file is invalid.
    #[error("invalid value {value:?} for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Names of the distinguished executable artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableTarget {
    /// Name under the base URL.
    pub remote_name: String,
    /// Name in the output directory after decompression.
    pub local_name: String,
    /// Companion marker file name.
    pub marker_name: String,
}

impl Default for ExecutableTarget {
    fn default() -> Self {
        Self {
            remote_name: DEFAULT_EXECUTABLE_REMOTE_NAME.to_string(),
            local_name: DEFAULT_EXECUTABLE_LOCAL_NAME.to_string(),
            marker_name: DEFAULT_EXECUTABLE_MARKER_NAME.to_string(),
        }
    }
}

/// Configuration for one synchronization pass.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the remote content.
    pub base_url: String,

    /// Local directory that mirrors the remote content.
    pub output_dir: PathBuf,

    /// HTTP request timeout. `None` means no deadline.
    pub timeout: Option<Duration>,

    /// Interval between progress snapshots of an in-flight transfer.
    pub progress_interval: Duration,

    /// The distinguished executable updated after all partitions.
    pub executable: ExecutableTarget,
}

impl SyncConfig {
    /// Create a configuration for `base_url`, writing into `output_dir`.
    pub fn new(base_url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            output_dir: output_dir.into(),
            timeout: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            executable: ExecutableTarget::default(),
        }
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the progress interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Set the executable target.
    pub fn with_executable(mut self, executable: ExecutableTarget) -> Self {
        self.executable = executable;
        self
    }

    /// Base URL without trailing slashes.
    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// URL of the partition list.
    pub fn partition_list_url(&self) -> String {
        format!("{}/caches.xml", self.base())
    }

    /// URL of a partition's file list.
    pub fn file_list_url(&self, partition_id: &str) -> String {
        format!("{}/diff/{}/info.xml", self.base(), partition_id)
    }

    /// URL of a declared file's payload, with `suffix` appended.
    pub fn file_url(&self, partition_id: &str, name: &str, suffix: &str) -> String {
        format!("{}/diff/{}/{}{}", self.base(), partition_id, name, suffix)
    }

    /// URL of the distinguished executable.
    pub fn executable_url(&self) -> String {
        format!("{}/{}", self.base(), self.executable.remote_name)
    }
}

/// `[sync]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSection {
    /// Request timeout in seconds; 0 disables it.
    pub timeout_secs: Option<u64>,
    /// Progress interval in milliseconds.
    pub progress_interval_ms: Option<u64>,
}

/// `[executable]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutableSection {
    pub remote_name: Option<String>,
    pub local_name: Option<String>,
    pub marker_name: Option<String>,
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSection {
    /// Default log level when `RUST_LOG` is unset.
    pub level: Option<String>,
    /// Optional log file.
    pub file: Option<PathBuf>,
}

/// Settings read from the INI config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub sync: SyncSection,
    pub executable: ExecutableSection,
    pub logging: LoggingSection,
}

impl ConfigFile {
    /// Default location: `<config dir>/cachesync/config.ini`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cachesync").join("config.ini"))
    }

    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_ini(&ini)
    }

    /// Parse from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Load {
            path: PathBuf::from("<inline>"),
            source: ini::Error::Parse(e),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let get = |section: &str, key: &str| {
            ini.section(Some(section))
                .and_then(|props| props.get(key))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            sync: SyncSection {
                timeout_secs: parse_u64("sync", "timeout_secs", get("sync", "timeout_secs"))?,
                progress_interval_ms: parse_u64(
                    "sync",
                    "progress_interval_ms",
                    get("sync", "progress_interval_ms"),
                )?,
            },
            executable: ExecutableSection {
                remote_name: get("executable", "remote_name"),
                local_name: get("executable", "local_name"),
                marker_name: get("executable", "marker_name"),
            },
            logging: LoggingSection {
                level: get("logging", "level"),
                file: get("logging", "file").map(PathBuf::from),
            },
        })
    }

    /// Apply file settings on top of `config`.
    pub fn apply(&self, mut config: SyncConfig) -> SyncConfig {
        if let Some(secs) = self.sync.timeout_secs {
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(ms) = self.sync.progress_interval_ms {
            config.progress_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(name) = &self.executable.remote_name {
            config.executable.remote_name = name.clone();
        }
        if let Some(name) = &self.executable.local_name {
            config.executable.local_name = name.clone();
        }
        if let Some(name) = &self.executable.marker_name {
            config.executable.marker_name = name.clone();
        }
        config
    }

    /// Logging settings from the file, with defaults filled in.
    pub fn logging_config(&self) -> LoggingConfig {
        let mut logging = LoggingConfig::default();
        if let Some(level) = &self.logging.level {
            logging.level = level.clone();
        }
        logging.file = self.logging.file.clone();
        logging
    }
}

fn parse_u64(section: &str, key: &str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    value
        .map(|v| {
            v.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                section: section.to_string(),
                key: key.to_string(),
                value: v.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
