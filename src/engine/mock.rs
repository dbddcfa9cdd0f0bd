//! Scriptable engine provider for tests and offline demos
//!
//! Mirrors the capability seam end to end: per-backend failures can be
//! injected at construction, initialization, or conversation setup (the
//! verification step), and responses are scripted as chunk sequences with an
//! optional mid-stream error. The provider records every construction
//! attempt and counts live engines/conversations so tests can assert that
//! fallback never leaks a handle.

use super::api::{
    Conversation, ConversationConfig, Engine, EngineConfig, EngineError, EngineProvider,
    TokenStream,
};
use super::backend::BackendKind;
use async_trait::async_trait;
use futures_util::stream::Stream;
use std::collections::{HashSet, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

/// One scripted response turn
#[derive(Debug, Clone)]
pub struct MockReply {
    /// Chunks delivered in order
    pub chunks: Vec<String>,
    /// When set, the stream ends with this generation error after the chunks
    pub error: Option<String>,
}

impl MockReply {
    pub fn text(chunks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            error: None,
        }
    }

    pub fn interrupted(
        chunks: impl IntoIterator<Item = impl Into<String>>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            error: Some(error.into()),
        }
    }
}

#[derive(Default)]
struct MockState {
    fail_construct: Mutex<HashSet<BackendKind>>,
    fail_initialize: Mutex<HashSet<BackendKind>>,
    fail_conversation: Mutex<HashSet<BackendKind>>,
    replies: Mutex<VecDeque<MockReply>>,
    attempts: Mutex<Vec<BackendKind>>,
    live_engines: AtomicUsize,
    live_conversations: AtomicUsize,
    cancelled_streams: AtomicUsize,
}

/// Engine provider backed by scripted behavior instead of a native runtime
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<MockState>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes engine construction fail for the given backend.
    pub fn fail_construct(&self, backend: BackendKind) -> &Self {
        self.state.fail_construct.lock().unwrap().insert(backend);
        self
    }

    /// Makes `Engine::initialize` fail for the given backend.
    pub fn fail_initialize(&self, backend: BackendKind) -> &Self {
        self.state.fail_initialize.lock().unwrap().insert(backend);
        self
    }

    /// Makes conversation creation fail for the given backend, which is what
    /// the verification step trips over.
    pub fn fail_verification(&self, backend: BackendKind) -> &Self {
        self.state.fail_conversation.lock().unwrap().insert(backend);
        self
    }

    /// Queues a scripted reply for the next `send_message`.
    pub fn script(&self, reply: MockReply) -> &Self {
        self.state.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Backends for which construction was attempted, in order.
    pub fn attempts(&self) -> Vec<BackendKind> {
        self.state.attempts.lock().unwrap().clone()
    }

    /// Engines constructed and not yet closed or dropped.
    pub fn live_engines(&self) -> usize {
        self.state.live_engines.load(Ordering::SeqCst)
    }

    /// Conversations created and not yet closed or dropped.
    pub fn live_conversations(&self) -> usize {
        self.state.live_conversations.load(Ordering::SeqCst)
    }

    /// Response streams dropped before reaching their end.
    pub fn cancelled_streams(&self) -> usize {
        self.state.cancelled_streams.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineProvider for MockProvider {
    async fn create(&self, config: EngineConfig) -> Result<Box<dyn Engine>, EngineError> {
        self.state.attempts.lock().unwrap().push(config.backend);

        if self.state.fail_construct.lock().unwrap().contains(&config.backend) {
            return Err(EngineError::Construct {
                backend: config.backend,
                message: "scripted construction failure".to_string(),
            });
        }

        self.state.live_engines.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockEngine {
            backend: config.backend,
            state: Arc::clone(&self.state),
            initialized: false,
            closed: false,
        }))
    }
}

struct MockEngine {
    backend: BackendKind,
    state: Arc<MockState>,
    initialized: bool,
    closed: bool,
}

#[async_trait]
impl Engine for MockEngine {
    async fn initialize(&mut self) -> Result<(), EngineError> {
        if self.state.fail_initialize.lock().unwrap().contains(&self.backend) {
            return Err(EngineError::Initialize {
                backend: self.backend,
                message: "scripted initialization failure".to_string(),
            });
        }
        self.initialized = true;
        Ok(())
    }

    async fn create_conversation(
        &mut self,
        _config: ConversationConfig,
    ) -> Result<Box<dyn Conversation>, EngineError> {
        if !self.initialized {
            return Err(EngineError::Conversation(
                "engine not initialized".to_string(),
            ));
        }
        if self.state.fail_conversation.lock().unwrap().contains(&self.backend) {
            return Err(EngineError::Conversation(
                "scripted conversation failure".to_string(),
            ));
        }

        self.state.live_conversations.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConversation {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.live_engines.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        self.close();
    }
}

struct MockConversation {
    state: Arc<MockState>,
    closed: bool,
}

#[async_trait]
impl Conversation for MockConversation {
    async fn send_message(&mut self, text: &str) -> Result<TokenStream, EngineError> {
        let reply = self.state.replies.lock().unwrap().pop_front();

        // Unscripted sends echo the input word by word so the CLI demo has
        // something to stream.
        let reply = reply.unwrap_or_else(|| {
            let mut chunks = vec!["echo:".to_string()];
            chunks.extend(text.split_whitespace().map(|w| format!(" {}", w)));
            MockReply {
                chunks,
                error: None,
            }
        });

        let mut items: VecDeque<Result<String, EngineError>> =
            reply.chunks.into_iter().map(Ok).collect();
        if let Some(message) = reply.error {
            items.push_back(Err(EngineError::Generation(message)));
        }

        Ok(Box::pin(MockTokenStream {
            items,
            state: Arc::clone(&self.state),
            finished: false,
        }))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.live_conversations.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockConversation {
    fn drop(&mut self) {
        self.close();
    }
}

struct MockTokenStream {
    items: VecDeque<Result<String, EngineError>>,
    state: Arc<MockState>,
    finished: bool,
}

impl Stream for MockTokenStream {
    type Item = Result<String, EngineError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.items.pop_front() {
            Some(item) => Poll::Ready(Some(item)),
            None => {
                self.finished = true;
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for MockTokenStream {
    fn drop(&mut self) {
        // Dropping the stream before exhaustion is the cancellation signal.
        if !self.finished {
            self.state.cancelled_streams.fetch_add(1, Ordering::SeqCst);
        }
    }
}
