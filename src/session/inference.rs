//! Inference session: one engine, at most one conversation, streamed sends

use super::error::ManagerError;
use crate::engine::{Conversation, ConversationConfig, EngineHandle, SamplerConfig};
use crate::engine::BackendKind;
use futures_util::stream::Stream;
use futures_util::StreamExt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Wraps one initialized engine and manages its conversation lifecycle.
///
/// At most one response stream is in flight at a time; a second `send`
/// before the prior stream finishes (or is dropped) is rejected with `Busy`.
pub struct InferenceSession {
    engine: EngineHandle,
    conversation: Option<Box<dyn Conversation>>,
    conversation_config: ConversationConfig,
    busy: Arc<AtomicBool>,
}

impl InferenceSession {
    /// Builds a session over an engine the fallback controller produced.
    pub fn new(engine: EngineHandle, system_prompt: Option<String>) -> Self {
        Self {
            engine,
            conversation: None,
            conversation_config: ConversationConfig {
                sampler: SamplerConfig::default(),
                system_prompt,
            },
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The backend this session's engine runs on.
    pub fn backend(&self) -> BackendKind {
        self.engine.backend()
    }

    /// Starts a fresh conversation, replacing (and closing) any prior one.
    pub async fn start_conversation(&mut self) -> Result<(), ManagerError> {
        if !self.engine.is_live() {
            return Err(ManagerError::NotInitialized);
        }

        if let Some(mut old) = self.conversation.take() {
            debug!("Replacing prior conversation");
            old.close();
        }

        let conversation = self
            .engine
            .create_conversation(self.conversation_config.clone())
            .await
            .map_err(ManagerError::Engine)?;
        self.conversation = Some(conversation);
        Ok(())
    }

    /// Sends one user turn, returning the streamed response.
    ///
    /// The conversation is created implicitly on the first send. Chunks are
    /// delivered in generation order; an engine-side failure mid-generation
    /// arrives as the terminal `Err` item on the same stream, never
    /// out-of-band. Dropping the stream cancels generation best-effort.
    pub async fn send(&mut self, text: &str) -> Result<ResponseStream, ManagerError> {
        if !self.engine.is_live() {
            return Err(ManagerError::NotInitialized);
        }
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(ManagerError::Busy);
        }

        match self.send_inner(text).await {
            Ok(stream) => Ok(stream),
            Err(e) => {
                self.busy.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn send_inner(&mut self, text: &str) -> Result<ResponseStream, ManagerError> {
        if self.conversation.is_none() {
            debug!("Lazily starting conversation on first send");
            let conversation = self
                .engine
                .create_conversation(self.conversation_config.clone())
                .await
                .map_err(ManagerError::Engine)?;
            self.conversation = Some(conversation);
        }

        let upstream = self
            .conversation
            .as_mut()
            .expect("conversation created above")
            .send_message(text)
            .await
            .map_err(ManagerError::Engine)?;

        // Forward on a background task so the caller's loop never blocks on
        // generation. The bounded channel provides backpressure without
        // reordering.
        let (tx, rx) = mpsc::channel::<Result<String, ManagerError>>(32);
        let forwarder = tokio::spawn(async move {
            let mut upstream = upstream;
            while let Some(item) = upstream.next().await {
                let item = item.map_err(ManagerError::StreamInterrupted);
                let terminal = item.is_err();
                if tx.send(item).await.is_err() {
                    // Consumer dropped the stream; dropping `upstream` here
                    // signals the engine to stop generating.
                    break;
                }
                if terminal {
                    break;
                }
            }
        });

        Ok(ResponseStream {
            rx,
            busy: Arc::clone(&self.busy),
            forwarder,
            finished: false,
        })
    }

    /// Releases the conversation, then the engine. Idempotent.
    pub fn release(&mut self) {
        if let Some(mut conversation) = self.conversation.take() {
            conversation.close();
        }
        self.engine.release();
    }
}

impl Drop for InferenceSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Ordered, finite stream of response chunks from one `send`.
///
/// Ends after the engine signals end-of-generation, or after one terminal
/// `Err(StreamInterrupted)`. Dropping it cancels generation best-effort and
/// releases the session's in-flight guard.
pub struct ResponseStream {
    rx: mpsc::Receiver<Result<String, ManagerError>>,
    busy: Arc<AtomicBool>,
    forwarder: JoinHandle<()>,
    finished: bool,
}

impl Stream for ResponseStream {
    type Item = Result<String, ManagerError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(None) => {
                if !self.finished {
                    self.finished = true;
                    self.busy.store(false, Ordering::SeqCst);
                }
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        self.forwarder.abort();
        self.busy.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockProvider, MockReply};
    use crate::engine::BackendSelector;
    use std::sync::Arc as StdArc;
    use tempfile::TempDir;

    async fn session_over_mock(provider: &MockProvider) -> InferenceSession {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"weights").unwrap();

        let selector = BackendSelector::new(StdArc::new(provider.clone()));
        let handle = selector.select_and_initialize(&path, None).await.unwrap();
        InferenceSession::new(handle, None)
    }

    #[tokio::test]
    async fn test_lazy_conversation_on_first_send() {
        let provider = MockProvider::new();
        provider.script(MockReply::text(["hello"]));

        let mut session = session_over_mock(&provider).await;
        assert_eq!(provider.live_conversations(), 0);

        let mut stream = session.send("hi").await.unwrap();
        assert_eq!(provider.live_conversations(), 1);
        while stream.next().await.is_some() {}
    }

    #[tokio::test]
    async fn test_send_after_release_is_not_initialized() {
        let provider = MockProvider::new();
        let mut session = session_over_mock(&provider).await;
        session.release();

        let result = session.send("hi").await;
        assert!(matches!(result, Err(ManagerError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_release_closes_conversation_before_engine() {
        let provider = MockProvider::new();
        provider.script(MockReply::text(["x"]));

        let mut session = session_over_mock(&provider).await;
        let mut stream = session.send("hi").await.unwrap();
        while stream.next().await.is_some() {}

        session.release();
        assert_eq!(provider.live_conversations(), 0);
        assert_eq!(provider.live_engines(), 0);

        // Second release is a no-op.
        session.release();
    }

    #[tokio::test]
    async fn test_explicit_start_replaces_prior_conversation() {
        let provider = MockProvider::new();
        let mut session = session_over_mock(&provider).await;

        session.start_conversation().await.unwrap();
        assert_eq!(provider.live_conversations(), 1);

        session.start_conversation().await.unwrap();
        // The prior conversation was closed, not leaked.
        assert_eq!(provider.live_conversations(), 1);
    }
}
