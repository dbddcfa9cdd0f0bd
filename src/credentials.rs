//! Bearer-token storage for gated model downloads
//!
//! The secure storage mechanism itself is the embedding application's
//! concern; the core only needs a get/set accessor for one opaque token,
//! safe for concurrent use. A file-backed implementation is provided for the
//! CLI, and an in-memory one for tests.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;

const TOKEN_FILE: &str = ".hf_token";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to persist credential to {path}: {error}")]
    Persist { path: PathBuf, error: String },
}

/// Get/set accessor for the opaque bearer token used on gated downloads.
///
/// Implementations must be safe for concurrent get/set from unrelated
/// callers.
pub trait CredentialStore: Send + Sync {
    /// Returns the stored token, if any. Blank tokens read as `None`.
    fn token(&self) -> Option<String>;

    /// Replaces the stored token.
    fn set_token(&self, token: &str) -> Result<(), CredentialError>;
}

/// Token persisted as a single file under the data directory
pub struct FileCredentialStore {
    path: PathBuf,
    cached: RwLock<Option<String>>,
}

impl FileCredentialStore {
    /// Opens (or prepares) the token file under `data_dir`.
    pub fn new(data_dir: &Path) -> Self {
        let path = data_dir.join(TOKEN_FILE);
        let cached = std::fs::read_to_string(&path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if cached.is_some() {
            debug!(path = %path.display(), "Loaded stored credential");
        }

        Self {
            path,
            cached: RwLock::new(cached),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn token(&self) -> Option<String> {
        self.cached.read().unwrap().clone()
    }

    fn set_token(&self, token: &str) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CredentialError::Persist {
                path: self.path.clone(),
                error: e.to_string(),
            })?;
        }

        std::fs::write(&self.path, token).map_err(|e| CredentialError::Persist {
            path: self.path.clone(),
            error: e.to_string(),
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600));
        }

        let trimmed = token.trim().to_string();
        *self.cached.write().unwrap() = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        };
        Ok(())
    }
}

/// Non-persistent store for tests and embedding applications that manage the
/// token themselves
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<String> {
        self.token.read().unwrap().clone()
    }

    fn set_token(&self, token: &str) -> Result<(), CredentialError> {
        let trimmed = token.trim().to_string();
        *self.token.write().unwrap() = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        };
        Ok(())
    }
}
