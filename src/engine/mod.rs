//! Engine capability seam, backend fallback, and engine ownership
//!
//! The native inference runtime is an external collaborator. This module
//! defines the trait seam it plugs into, the accelerator fallback logic that
//! picks a working backend, and the exclusive-ownership handle an inference
//! session receives.

mod api;
mod backend;
mod fallback;
mod handle;
pub mod mock;

pub use api::{
    Conversation, ConversationConfig, Engine, EngineConfig, EngineError, EngineProvider,
    SamplerConfig, TokenStream,
};
pub use backend::{BackendKind, FALLBACK_ORDER};
pub use fallback::{BackendSelector, SelectError};
pub use handle::EngineHandle;
