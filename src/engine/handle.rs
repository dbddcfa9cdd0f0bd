//! Exclusive ownership of one initialized engine

use super::api::{Conversation, ConversationConfig, Engine, EngineError};
use super::backend::BackendKind;
use tracing::debug;

/// Owns one initialized native engine and the backend it runs on.
///
/// The handle is created only by the fallback controller, after both
/// initialization and verification succeeded, and is then handed to an
/// inference session. Release is explicit and idempotent: cleanup of a
/// half-initialized state is unavoidable, so a second `release` is a no-op
/// rather than an error. `Drop` releases as a safety net.
pub struct EngineHandle {
    engine: Option<Box<dyn Engine>>,
    backend: BackendKind,
}

impl EngineHandle {
    pub(crate) fn new(engine: Box<dyn Engine>, backend: BackendKind) -> Self {
        Self {
            engine: Some(engine),
            backend,
        }
    }

    /// The backend that passed initialization and verification.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// True until `release` has been called.
    pub fn is_live(&self) -> bool {
        self.engine.is_some()
    }

    /// Creates a conversation on the owned engine.
    pub async fn create_conversation(
        &mut self,
        config: ConversationConfig,
    ) -> Result<Box<dyn Conversation>, EngineError> {
        match self.engine.as_mut() {
            Some(engine) => engine.create_conversation(config).await,
            None => Err(EngineError::Conversation(
                "engine already released".to_string(),
            )),
        }
    }

    /// Closes the engine. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            debug!(backend = %self.backend, "Releasing engine");
            engine.close();
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("backend", &self.backend)
            .field("live", &self.engine.is_some())
            .finish()
    }
}
