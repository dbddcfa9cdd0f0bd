//! End-to-end manager scenarios
//!
//! Exercises the full initialize path over a local HTTP stub and a
//! scriptable engine provider: acquisition, backend fallback, streaming
//! sends, and teardown.

mod support;

use futures_util::StreamExt;
use pocketlm::config::PocketlmConfig;
use pocketlm::credentials::{CredentialStore, MemoryCredentialStore};
use pocketlm::engine::mock::{MockProvider, MockReply};
use pocketlm::engine::BackendKind;
use pocketlm::model::{DownloadState, ModelDescriptor};
use pocketlm::session::{ManagerError, ProgressHandler, SessionManager};
use std::sync::{Arc, Mutex};
use support::{test_body, StubServer};
use tempfile::TempDir;

fn descriptor(url: String, filename: &str) -> ModelDescriptor {
    ModelDescriptor {
        id: "it-model".to_string(),
        display_name: "Integration Model".to_string(),
        filename: filename.to_string(),
        url,
        system_prompt: None,
        preferred_backend: None,
    }
}

fn manager(
    dir: &TempDir,
    provider: &MockProvider,
    credentials: Arc<dyn CredentialStore>,
) -> SessionManager {
    SessionManager::new(
        PocketlmConfig::with_data_dir(dir.path()),
        Arc::new(provider.clone()),
        credentials,
    )
    .unwrap()
}

#[derive(Default)]
struct RecordingHandler {
    events: Mutex<Vec<DownloadState>>,
}

impl ProgressHandler for RecordingHandler {
    fn on_progress(&self, event: &DownloadState) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[tokio::test]
async fn test_initialize_downloads_then_chats() {
    let body = test_body(64 * 1024);
    let server = StubServer::serve(200, "OK", body).await;

    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new();
    provider.script(MockReply::text(["It ", "works."]));
    let manager = manager(&dir, &provider, Arc::new(MemoryCredentialStore::new()));

    let descriptor = descriptor(server.url("/model.bin"), "model.bin");
    let handler = RecordingHandler::default();

    let backend = manager
        .initialize_with_progress(&descriptor, &handler)
        .await
        .unwrap();
    assert_eq!(backend, BackendKind::Npu);
    assert_eq!(manager.active_model_id().await.as_deref(), Some("it-model"));
    assert!(manager.is_downloaded(&descriptor));

    // The handler saw the whole event contract: Started first, exactly one
    // terminal Complete last.
    let events = handler.events.lock().unwrap();
    assert!(matches!(events.first(), Some(DownloadState::Started)));
    assert!(matches!(events.last(), Some(DownloadState::Complete { .. })));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    drop(events);

    let mut stream = manager.send("hello").await.unwrap();
    let mut reply = String::new();
    while let Some(chunk) = stream.next().await {
        reply.push_str(&chunk.unwrap());
    }
    assert_eq!(reply, "It works.");
}

#[tokio::test]
async fn test_gated_model_without_token_reports_auth_requirement() {
    let server = StubServer::serve(403, "Forbidden", Vec::new()).await;

    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new();
    let manager = manager(&dir, &provider, Arc::new(MemoryCredentialStore::new()));

    let descriptor = descriptor(server.url("/gated.bin"), "gated.bin");
    let err = manager.initialize(&descriptor).await.unwrap_err();

    assert!(matches!(err, ManagerError::AuthRequired(_)));
    assert!(err.to_string().contains("token"));

    // Failure leaves the manager uninitialized; no engine was ever attempted.
    assert_eq!(manager.active_backend_name().await, "none");
    assert!(provider.attempts().is_empty());
    assert!(matches!(
        manager.send("hi").await,
        Err(ManagerError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_preferred_backend_skips_earlier_chain_entries() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("model.bin"), b"weights").unwrap();

    let provider = MockProvider::new();
    let manager = manager(&dir, &provider, Arc::new(MemoryCredentialStore::new()));

    let mut descriptor = descriptor("http://127.0.0.1:9/unused".to_string(), "model.bin");
    descriptor.preferred_backend = Some(BackendKind::Gpu);

    let backend = manager.initialize(&descriptor).await.unwrap();
    assert_eq!(backend, BackendKind::Gpu);
    assert_eq!(manager.active_backend_name().await, "GPU");
    assert_eq!(provider.attempts(), vec![BackendKind::Gpu]);
}

#[tokio::test]
async fn test_fallback_lands_on_cpu_when_accelerators_fail() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("model.bin"), b"weights").unwrap();

    let provider = MockProvider::new();
    provider.fail_verification(BackendKind::Npu);
    provider.fail_initialize(BackendKind::Gpu);
    let manager = manager(&dir, &provider, Arc::new(MemoryCredentialStore::new()));

    let descriptor = descriptor("http://127.0.0.1:9/unused".to_string(), "model.bin");
    let backend = manager.initialize(&descriptor).await.unwrap();

    assert_eq!(backend, BackendKind::Cpu);
    assert_eq!(manager.active_backend_name().await, "CPU");
    assert_eq!(
        provider.attempts(),
        vec![BackendKind::Npu, BackendKind::Gpu, BackendKind::Cpu]
    );
    // Only the winning engine stayed live; failed candidates were closed.
    assert_eq!(provider.live_engines(), 1);
}

#[tokio::test]
async fn test_cleanup_returns_manager_to_uninitialized() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("model.bin"), b"weights").unwrap();

    let provider = MockProvider::new();
    provider.script(MockReply::text(["hi"]));
    let manager = manager(&dir, &provider, Arc::new(MemoryCredentialStore::new()));

    let descriptor = descriptor("http://127.0.0.1:9/unused".to_string(), "model.bin");
    manager.initialize(&descriptor).await.unwrap();

    let mut stream = manager.send("hello").await.unwrap();
    while stream.next().await.is_some() {}
    drop(stream);

    manager.cleanup().await;
    assert_eq!(provider.live_engines(), 0);
    assert_eq!(provider.live_conversations(), 0);
    assert!(manager.active_model_id().await.is_none());
    assert!(matches!(
        manager.send("again").await,
        Err(ManagerError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_stored_token_unlocks_gated_download() {
    let body = test_body(512);
    let server = StubServer::serve(200, "OK", body).await;

    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new();
    let manager = manager(
        &dir,
        &provider,
        Arc::new(MemoryCredentialStore::with_token("hf_integration")),
    );

    let descriptor = descriptor(server.url("/gated.bin"), "gated.bin");
    manager.initialize(&descriptor).await.unwrap();

    assert_eq!(
        server.auth_headers(),
        vec![Some("Bearer hf_integration".to_string())]
    );
}
