//! Backend selection and ordered fallback
//!
//! Walks the NPU → GPU → CPU chain (or the suffix starting at a preferred
//! backend) and returns the first engine that both initializes and passes
//! verification. Verification creates a throwaway conversation with default
//! settings and closes it immediately: a backend can construct and
//! "initialize" successfully yet be unable to serve a conversation, e.g. a
//! missing accelerator driver that only surfaces at first real use.

use super::api::{ConversationConfig, Engine, EngineConfig, EngineError, EngineProvider};
use super::backend::BackendKind;
use super::handle::EngineHandle;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Failure modes of backend selection
#[derive(Debug)]
pub enum SelectError {
    /// The model file is missing or unreadable; no backend was attempted
    Precondition { path: PathBuf, message: String },

    /// Every candidate in the fallback chain failed. The reported cause is
    /// the last attempt's; earlier causes are retained for inspection.
    Exhausted {
        attempts: Vec<(BackendKind, EngineError)>,
    },
}

impl SelectError {
    /// The failure from the last attempted backend, if any were attempted.
    pub fn last_cause(&self) -> Option<&EngineError> {
        match self {
            SelectError::Precondition { .. } => None,
            SelectError::Exhausted { attempts } => attempts.last().map(|(_, e)| e),
        }
    }
}

impl fmt::Display for SelectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectError::Precondition { path, message } => {
                write!(f, "model file not usable at {}: {}", path.display(), message)
            }
            SelectError::Exhausted { attempts } => match attempts.last() {
                Some((backend, cause)) => write!(
                    f,
                    "all {} backend(s) failed; last attempt ({}): {}",
                    attempts.len(),
                    backend,
                    cause
                ),
                None => write!(f, "no backend was available to attempt"),
            },
        }
    }
}

impl std::error::Error for SelectError {}

/// Tries backends in preference order until one can actually serve
pub struct BackendSelector {
    provider: Arc<dyn EngineProvider>,
}

impl BackendSelector {
    pub fn new(provider: Arc<dyn EngineProvider>) -> Self {
        Self { provider }
    }

    /// Attempts engine construction, initialization, and verification per
    /// candidate backend, returning the first one that passes all three.
    ///
    /// The model file must exist and be readable before any backend is
    /// touched; that check is reported as `Precondition` and is never masked
    /// by the fallback loop.
    pub async fn select_and_initialize(
        &self,
        model_path: &Path,
        preferred: Option<BackendKind>,
    ) -> Result<EngineHandle, SelectError> {
        if let Err(e) = std::fs::File::open(model_path) {
            return Err(SelectError::Precondition {
                path: model_path.to_path_buf(),
                message: e.to_string(),
            });
        }

        let chain = BackendKind::fallback_chain(preferred);
        debug!(?chain, model = %model_path.display(), "Selecting backend");

        let mut attempts: Vec<(BackendKind, EngineError)> = Vec::new();
        for &backend in chain {
            match self.try_backend(model_path, backend).await {
                Ok(engine) => {
                    info!(backend = %backend, "Backend initialized and verified");
                    return Ok(EngineHandle::new(engine, backend));
                }
                Err(e) => {
                    warn!(backend = %backend, error = %e, "Backend failed, falling back");
                    attempts.push((backend, e));
                }
            }
        }

        Err(SelectError::Exhausted { attempts })
    }

    /// One fallback attempt. On any failure the engine instance created for
    /// this attempt is closed before returning, so no handle is carried
    /// across attempts.
    async fn try_backend(
        &self,
        model_path: &Path,
        backend: BackendKind,
    ) -> Result<Box<dyn Engine>, EngineError> {
        let config = EngineConfig {
            model_path: model_path.to_path_buf(),
            backend,
        };

        let mut engine = self.provider.create(config).await?;

        if let Err(e) = engine.initialize().await {
            engine.close();
            return Err(e);
        }

        // Verification step: prove the backend can serve a conversation.
        match engine.create_conversation(ConversationConfig::default()).await {
            Ok(mut probe) => {
                probe.close();
                Ok(engine)
            }
            Err(e) => {
                engine.close();
                Err(e)
            }
        }
    }
}
