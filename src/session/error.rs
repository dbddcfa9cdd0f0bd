//! Caller-facing error taxonomy

use crate::config::ConfigError;
use crate::engine::{EngineError, SelectError};
use crate::model::DownloadError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the session manager and inference session
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The model file is missing or unreadable; nothing was attempted
    #[error("model file not usable at {path}: {message}")]
    Precondition { path: PathBuf, message: String },

    /// Every backend in the fallback chain failed for this initialize call
    #[error("{0}")]
    BackendExhausted(SelectError),

    /// Acquisition failed and the status suggests a missing credential
    #[error("model download failed: {0} (an access token is likely required)")]
    AuthRequired(DownloadError),

    /// Acquisition failed for network or I/O reasons
    #[error("model download failed: {0}")]
    Download(DownloadError),

    /// An operation was attempted before a session exists
    #[error("no inference session is initialized")]
    NotInitialized,

    /// A second `send` was attempted while a response stream is still live
    #[error("a response is already being generated")]
    Busy,

    /// The engine failed mid-generation; output delivered so far is kept
    #[error("generation interrupted: {0}")]
    StreamInterrupted(EngineError),

    /// Engine-side failure outside generation (conversation setup)
    #[error("engine error: {0}")]
    Engine(EngineError),

    /// Configuration problem detected while composing the manager
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<DownloadError> for ManagerError {
    fn from(e: DownloadError) -> Self {
        if e.needs_credentials() {
            ManagerError::AuthRequired(e)
        } else {
            ManagerError::Download(e)
        }
    }
}

impl From<SelectError> for ManagerError {
    fn from(e: SelectError) -> Self {
        match e {
            SelectError::Precondition { path, message } => {
                ManagerError::Precondition { path, message }
            }
            exhausted @ SelectError::Exhausted { .. } => ManagerError::BackendExhausted(exhausted),
        }
    }
}
