//! pocketlm - on-device LLM session management
//!
//! This library runs a local large-language-model inference engine on
//! whichever accelerator the device actually has, recovering automatically
//! when a preferred accelerator is missing or fails, and exposes responses
//! as live, cancelable token streams. A model acquisition pipeline fetches
//! multi-gigabyte weight files over HTTP (with progress reporting and
//! credential-gated access) before an engine can be built.
//!
//! # Core Concepts
//!
//! - **Acquisition pipeline**: materializes a model's weight file locally,
//!   reporting progress as a stream of [`model::DownloadState`] events.
//! - **Backend fallback**: tries NPU → GPU → CPU (or a suffix of that chain)
//!   until a backend both initializes *and* verifies it can actually serve a
//!   conversation.
//! - **Inference session**: owns one engine and at most one conversation;
//!   each send yields an ordered, finite, cancelable chunk stream.
//! - **Capability seam**: the native engine plugs in behind the
//!   [`engine::EngineProvider`] traits; this crate never reimplements the
//!   runtime, the tokenizer, or the accelerator kernels.
//!
//! # Example
//!
//! ```no_run
//! use pocketlm::config::PocketlmConfig;
//! use pocketlm::credentials::MemoryCredentialStore;
//! use pocketlm::engine::mock::MockProvider;
//! use pocketlm::model::ModelDescriptor;
//! use pocketlm::session::SessionManager;
//! use futures_util::StreamExt;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = SessionManager::new(
//!     PocketlmConfig::from_env()?,
//!     Arc::new(MockProvider::new()),
//!     Arc::new(MemoryCredentialStore::new()),
//! )?;
//!
//! let model = ModelDescriptor::find_builtin("gemma-3n").expect("known model");
//! let backend = manager.initialize(&model).await?;
//! println!("running on {}", backend);
//!
//! let mut response = manager.send("Hello!").await?;
//! while let Some(chunk) = response.next().await {
//!     print!("{}", chunk?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod model;
pub mod session;

pub use chat::{ChatMessage, MessageSender};
pub use config::PocketlmConfig;
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use engine::{BackendKind, EngineHandle, EngineProvider};
pub use model::{DownloadState, ModelDescriptor, ModelFetcher};
pub use session::{ManagerError, ResponseStream, SessionManager};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
