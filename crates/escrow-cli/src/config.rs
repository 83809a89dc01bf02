//! # CLI Configuration
//!
//! Resolution order, lowest to highest precedence:
//!
//! 1. Built-in defaults.
//! 2. An optional YAML file (`--config`).
//! 3. Environment variables:
//!    - `ESCROW_DEFAULT_DEADLINE_SECS`: deadline for `create` steps that
//!      give none (default: 7 days).
//!    - `ESCROW_DEFAULT_GRACE_SECS`: grace window for `create` steps that
//!      give none; `0` or `none` disables it (default: none).
//!    - `ESCROW_LOG_FORMAT`: `text` or `json` (default: `text`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const DEFAULT_DEADLINE_SECS: i64 = 7 * 24 * 60 * 60;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidValue {
                key: "log_format".to_string(),
                value: other.to_string(),
                reason: "expected `text` or `json`".to_string(),
            }),
        }
    }
}

/// Resolved CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// Deadline, in seconds from creation, for escrows created without one.
    pub default_deadline_secs: i64,
    /// Grace window, in seconds from creation, for escrows created without
    /// one. `None` creates escrows without a grace window.
    pub default_grace_secs: Option<i64>,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            default_deadline_secs: DEFAULT_DEADLINE_SECS,
            default_grace_secs: None,
            log_format: LogFormat::Text,
        }
    }
}

impl EscrowConfig {
    /// Load from an optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve(path, |key| std::env::var(key).ok())
    }

    /// Load from an optional file, with overrides read through `env`.
    pub fn resolve(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(raw) = env("ESCROW_DEFAULT_DEADLINE_SECS") {
            config.default_deadline_secs = parse_secs("ESCROW_DEFAULT_DEADLINE_SECS", &raw)?;
        }
        if let Some(raw) = env("ESCROW_DEFAULT_GRACE_SECS") {
            config.default_grace_secs = match raw.trim() {
                "" | "none" | "0" => None,
                _ => Some(parse_secs("ESCROW_DEFAULT_GRACE_SECS", &raw)?),
            };
        }
        if let Some(raw) = env("ESCROW_LOG_FORMAT") {
            config.log_format = raw.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_deadline_secs < 0 {
            return Err(ConfigError::InvalidValue {
                key: "default_deadline_secs".to_string(),
                value: self.default_deadline_secs.to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        if let Some(grace) = self.default_grace_secs {
            if grace < 0 {
                return Err(ConfigError::InvalidValue {
                    key: "default_grace_secs".to_string(),
                    value: grace.to_string(),
                    reason: "must not be negative".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<i64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: "expected an integer number of seconds".to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        /// The config path.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The config file is not valid YAML for [`EscrowConfig`].
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        /// The config path.
        path: PathBuf,
        /// The underlying error.
        source: serde_yaml::Error,
    },
    /// A setting has an unacceptable value.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}
