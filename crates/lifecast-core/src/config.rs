//! Configuration loading and typed config structures for lifecast.
//!
//! The configuration lives in `lifecast-config.yaml` next to the binary's
//! working directory. Every section is optional; missing fields fall back
//! to the defaults below. A handful of environment variables override the
//! file so containers can be reconfigured without editing YAML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level lifecast configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LifecastConfig {
    /// Grid dimensions.
    #[serde(default)]
    pub grid: GridConfig,

    /// Autoplay cadence.
    #[serde(default)]
    pub autoplay: AutoplayConfig,

    /// Event queue storage and retention.
    #[serde(default)]
    pub queue: QueueConfig,

    /// HTTP listener settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LifecastConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values:
    /// - `LIFECAST_HOST` overrides `http.host`
    /// - `LIFECAST_PORT` overrides `http.port`
    /// - `LIFECAST_STATIC_DIR` overrides `http.static_dir`
    /// - `LIFECAST_TMPDIR` overrides `queue.tmp_dir`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_file_with(path, |key| std::env::var(key).ok())
    }

    /// Load a YAML file, apply overrides from `lookup`, then validate.
    ///
    /// # Errors
    ///
    /// Same as [`LifecastConfig::from_file`].
    pub fn from_file_with<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::deserialize_yaml(&contents)?;
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, validated. Used when no config
    /// file exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override is unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config = Self::deserialize_yaml(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn deserialize_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            Ok(Self::default())
        } else {
            Ok(serde_yml::from_str(yaml)?)
        }
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override cannot be parsed.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `LIFECAST_PORT` is not a valid port.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("LIFECAST_HOST") {
            self.http.host = host;
        }
        if let Some(port) = lookup("LIFECAST_PORT") {
            self.http.port = port.parse().map_err(|e| ConfigError::Invalid {
                reason: format!("LIFECAST_PORT={port}: {e}"),
            })?;
        }
        if let Some(dir) = lookup("LIFECAST_STATIC_DIR") {
            self.http.static_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("LIFECAST_TMPDIR") {
            self.queue.tmp_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Check values that deserialize fine but cannot run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.rows == 0 || self.grid.cols == 0 {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "grid must be at least 1x1, got {}x{}",
                    self.grid.rows, self.grid.cols
                ),
            });
        }
        if self.autoplay.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "autoplay.interval_ms must be at least 1".to_owned(),
            });
        }
        if self.queue.retention_steps == 0 {
            return Err(ConfigError::Invalid {
                reason: "queue.retention_steps must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Grid dimensions, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GridConfig {
    /// Number of rows.
    #[serde(default = "default_rows")]
    pub rows: usize,

    /// Number of columns.
    #[serde(default = "default_cols")]
    pub cols: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            cols: default_cols(),
        }
    }
}

/// Autoplay ticker settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AutoplayConfig {
    /// Milliseconds between automatic steps.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl AutoplayConfig {
    /// The interval as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

/// Event queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueueConfig {
    /// Number of most recent steps kept available for replay.
    #[serde(default = "default_retention_steps")]
    pub retention_steps: u64,

    /// Base directory for step files. `None` uses the system temp dir.
    #[serde(default)]
    pub tmp_dir: Option<PathBuf>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retention_steps: default_retention_steps(),
            tmp_dir: None,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory of static assets served at `/`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit one JSON object per line instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const fn default_rows() -> usize {
    25
}

const fn default_cols() -> usize {
    40
}

const fn default_interval_ms() -> u64 {
    500
}

const fn default_retention_steps() -> u64 {
    1000
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("web")
}

fn default_log_level() -> String {
    "info".to_owned()
}
