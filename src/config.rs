//! Configuration management for pocketlm
//!
//! Settings load from environment variables with sensible defaults.
//!
//! # Environment Variables
//!
//! - `POCKETLM_DATA_DIR`: directory for model files and the credential file -
//!   default: system data dir + "pocketlm"
//! - `POCKETLM_BACKEND`: preferred accelerator backend (NPU|GPU|CPU) -
//!   default: unset (full NPU → GPU → CPU fallback chain)
//! - `POCKETLM_CONNECT_TIMEOUT`: HTTP connect timeout in seconds - default: "30"
//! - `POCKETLM_LOG_LEVEL`: logging level - default: "info"

use crate::engine::BackendKind;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse a configuration value
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    /// The data directory could not be created
    #[error("Failed to prepare data directory {path}: {error}")]
    DataDir { path: PathBuf, error: String },
}

/// Main configuration structure for pocketlm
#[derive(Debug, Clone)]
pub struct PocketlmConfig {
    /// Directory holding downloaded model files and the credential file
    pub data_dir: PathBuf,

    /// Preferred accelerator backend; overrides a descriptor's own preference
    /// when set
    pub preferred_backend: Option<BackendKind>,

    /// HTTP connect timeout in seconds (transfers themselves are unbounded;
    /// model files run to gigabytes)
    pub connect_timeout_secs: u64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl PocketlmConfig {
    /// Loads configuration from environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = match env::var("POCKETLM_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::data_dir()
                .unwrap_or_else(env::temp_dir)
                .join("pocketlm"),
        };

        let preferred_backend = match env::var("POCKETLM_BACKEND") {
            Ok(value) => Some(value.parse::<BackendKind>().map_err(|e| {
                ConfigError::ParseError {
                    field: "POCKETLM_BACKEND".to_string(),
                    error: e,
                }
            })?),
            Err(_) => None,
        };

        let connect_timeout_secs = match env::var("POCKETLM_CONNECT_TIMEOUT") {
            Ok(value) => value.parse::<u64>().map_err(|e| ConfigError::ParseError {
                field: "POCKETLM_CONNECT_TIMEOUT".to_string(),
                error: e.to_string(),
            })?,
            Err(_) => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        let log_level =
            env::var("POCKETLM_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        Ok(Self {
            data_dir,
            preferred_backend,
            connect_timeout_secs,
            log_level,
        })
    }

    /// Uses an explicit data directory, keeping everything else at defaults.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            preferred_backend: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    /// Creates the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| ConfigError::DataDir {
            path: self.data_dir.clone(),
            error: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        env::remove_var("POCKETLM_DATA_DIR");
        env::remove_var("POCKETLM_BACKEND");
        env::remove_var("POCKETLM_CONNECT_TIMEOUT");
        env::remove_var("POCKETLM_LOG_LEVEL");

        let config = PocketlmConfig::from_env().unwrap();
        assert!(config.preferred_backend.is_none());
        assert_eq!(config.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert_eq!(config.log_level, "info");
        assert!(config.data_dir.ends_with("pocketlm"));
    }

    #[test]
    #[serial]
    fn test_backend_override_from_env() {
        env::set_var("POCKETLM_BACKEND", "gpu");
        let config = PocketlmConfig::from_env().unwrap();
        assert_eq!(config.preferred_backend, Some(BackendKind::Gpu));
        env::remove_var("POCKETLM_BACKEND");
    }

    #[test]
    #[serial]
    fn test_invalid_backend_is_a_parse_error() {
        env::set_var("POCKETLM_BACKEND", "TPU");
        let result = PocketlmConfig::from_env();
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
        env::remove_var("POCKETLM_BACKEND");
    }

    #[test]
    fn test_ensure_data_dir_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = PocketlmConfig::with_data_dir(dir.path().join("nested").join("models"));
        config.ensure_data_dir().unwrap();
        assert!(config.data_dir.is_dir());
    }
}
