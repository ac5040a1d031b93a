//! Configuration module for gdsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for gdsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Local directory mirrored to the remote folder.
    #[serde(alias = "localRootFolder")]
    pub local_root: PathBuf,
    /// Drive file ID of the remote folder receiving the mirror.
    #[serde(alias = "gDriveRootFolderFileId")]
    pub remote_root_id: String,
    /// Maximum number of uploads in flight at once.
    pub max_concurrency: usize,
    /// Location of the persisted sync state cache.
    pub state_file: PathBuf,
}

/// Timing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Milliseconds to wait before re-issuing a redirected, throttled or failed call.
    #[serde(alias = "retransmit_interval")]
    pub retransmit_interval_ms: u64,
    /// Minutes between periodic flushes of the sync state cache.
    #[serde(alias = "sync_state_save")]
    pub sync_state_save_minutes: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Authentication / OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Google "installed application" client secret JSON.
    pub client_secret_file: PathBuf,
    /// Where OAuth tokens are persisted between runs.
    pub token_file: PathBuf,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/gdsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        config_dir().join("config.yaml")
    }

    /// Delay between retransmissions as a [`Duration`].
    pub fn retransmit_interval(&self) -> Duration {
        Duration::from_millis(self.schedule.retransmit_interval_ms)
    }

    /// Period of the cache autosave as a [`Duration`].
    pub fn sync_state_save_period(&self) -> Duration {
        Duration::from_secs(self.schedule.sync_state_save_minutes.saturating_mul(60))
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("gdsync")
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("gdsync")
}

/// Expands a leading `~` to the user's home directory.
///
/// Paths without a leading tilde are returned unchanged.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

// Config derives Default because all its fields implement Default.

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("GoogleDrive"),
            remote_root_id: String::new(),
            max_concurrency: 5,
            state_file: data_dir().join("sync_state.yml"),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            retransmit_interval_ms: 1000,
            sync_state_save_minutes: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_secret_file: config_dir().join("client_secret.json"),
            token_file: data_dir().join("token.json"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.max_concurrency"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Longest accepted autosave period (one week)
const MAX_SYNC_STATE_SAVE_MINUTES: u64 = 7 * 24 * 60;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.remote_root_id.trim().is_empty() {
            errors.push(ValidationError {
                field: "sync.remote_root_id".into(),
                message: "must be set to the Drive ID of the target folder".into(),
            });
        }
        if self.sync.max_concurrency == 0 {
            errors.push(ValidationError {
                field: "sync.max_concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }

        // Check local root only when it does not start with `~` (tilde is expanded at runtime).
        let root_str = self.sync.local_root.to_string_lossy();
        if !root_str.starts_with('~') && !self.sync.local_root.is_dir() {
            errors.push(ValidationError {
                field: "sync.local_root".into(),
                message: format!(
                    "directory does not exist: {}",
                    self.sync.local_root.display()
                ),
            });
        }

        // --- schedule ---
        if self.schedule.retransmit_interval_ms == 0 {
            errors.push(ValidationError {
                field: "schedule.retransmit_interval_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.schedule.sync_state_save_minutes == 0 {
            errors.push(ValidationError {
                field: "schedule.sync_state_save_minutes".into(),
                message: "must be greater than 0".into(),
            });
        } else if self.schedule.sync_state_save_minutes > MAX_SYNC_STATE_SAVE_MINUTES {
            errors.push(ValidationError {
                field: "schedule.sync_state_save_minutes".into(),
                message: format!("must be at most {MAX_SYNC_STATE_SAVE_MINUTES}"),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use gdsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .local_root(PathBuf::from("/home/user/Documents"))
///     .remote_root_id("1A2b3C4d5E6f")
///     .max_concurrency(8)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an existing configuration (e.g. one loaded from disk).
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- sync ---

    pub fn local_root(mut self, root: PathBuf) -> Self {
        self.config.sync.local_root = root;
        self
    }

    pub fn remote_root_id(mut self, id: impl Into<String>) -> Self {
        self.config.sync.remote_root_id = id.into();
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.sync.max_concurrency = n;
        self
    }

    pub fn state_file(mut self, path: PathBuf) -> Self {
        self.config.sync.state_file = path;
        self
    }

    // --- schedule ---

    pub fn retransmit_interval_ms(mut self, ms: u64) -> Self {
        self.config.schedule.retransmit_interval_ms = ms;
        self
    }

    pub fn sync_state_save_minutes(mut self, minutes: u64) -> Self {
        self.config.schedule.sync_state_save_minutes = minutes;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- auth ---

    pub fn client_secret_file(mut self, path: PathBuf) -> Self {
        self.config.auth.client_secret_file = path;
        self
    }

    pub fn token_file(mut self, path: PathBuf) -> Self {
        self.config.auth.token_file = path;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
