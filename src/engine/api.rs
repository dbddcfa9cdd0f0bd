//! Capability interface to the native inference runtime
//!
//! The native engine and its accelerator delegates live outside this crate.
//! They are reached through the narrow trait seam defined here: a provider
//! constructs engines, an engine is initialized once and hands out
//! conversations, a conversation streams generated text. The interface is
//! pinned at compile time; there is no runtime capability probing.

use super::backend::BackendKind;
use async_trait::async_trait;
use futures_util::stream::Stream;
use std::path::PathBuf;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by the native engine through the capability seam
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Engine construction failed for the requested backend
    #[error("engine construction failed on {backend}: {message}")]
    Construct {
        backend: BackendKind,
        message: String,
    },

    /// Engine was constructed but explicit initialization failed
    #[error("engine initialization failed on {backend}: {message}")]
    Initialize {
        backend: BackendKind,
        message: String,
    },

    /// Conversation creation failed (also the verification-step failure)
    #[error("conversation setup failed: {0}")]
    Conversation(String),

    /// The engine failed while generating a response
    #[error("generation failed: {0}")]
    Generation(String),
}

/// Configuration an engine is constructed with: one model file, one backend
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model_path: PathBuf,
    pub backend: BackendKind,
}

/// Sampling parameters, constant per build
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.9,
        }
    }
}

/// Settings a conversation is created with
#[derive(Debug, Clone, Default)]
pub struct ConversationConfig {
    pub sampler: SamplerConfig,
    pub system_prompt: Option<String>,
}

/// Ordered, finite stream of generated text chunks.
///
/// The stream ends after the engine signals end-of-generation, or after one
/// terminal `Err` when generation fails midway. Dropping the stream is the
/// cancellation signal: implementations must stop generation (best-effort)
/// and release any per-request resources when the stream is dropped.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, EngineError>> + Send>>;

/// A stateful conversational context derived from one engine
#[async_trait]
pub trait Conversation: Send {
    /// Sends one user turn and returns the streamed response.
    ///
    /// Chunks arrive in generation order. Each call starts an independent
    /// finite stream, logically appended after the prior turn in the
    /// conversation history.
    async fn send_message(&mut self, text: &str) -> Result<TokenStream, EngineError>;

    /// Releases the conversation. Called at most once by the owner.
    fn close(&mut self);
}

/// One initialized native engine bound to a backend and a model file
#[async_trait]
pub trait Engine: Send {
    /// Explicit initialization; may block on native calls for seconds.
    async fn initialize(&mut self) -> Result<(), EngineError>;

    /// Creates a conversation. Requires a successful `initialize`.
    async fn create_conversation(
        &mut self,
        config: ConversationConfig,
    ) -> Result<Box<dyn Conversation>, EngineError>;

    /// Releases the engine and everything it owns. Called at most once.
    fn close(&mut self);
}

/// Constructs engines for whatever backends the device actually has
#[async_trait]
pub trait EngineProvider: Send + Sync {
    /// Constructs (but does not initialize) an engine for the given config.
    async fn create(&self, config: EngineConfig) -> Result<Box<dyn Engine>, EngineError>;
}
