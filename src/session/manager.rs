//! Session manager façade
//!
//! Composes the acquisition pipeline, the backend fallback controller, and
//! the inference session behind one explicitly owned context object. The
//! embedding application decides how it is shared (typically `Arc`); there
//! is no process-global instance.

use super::error::ManagerError;
use super::inference::{InferenceSession, ResponseStream};
use super::progress::{NoOpHandler, ProgressHandler};
use crate::config::PocketlmConfig;
use crate::credentials::CredentialStore;
use crate::engine::{BackendKind, BackendSelector, EngineProvider};
use crate::model::{DownloadState, DownloadStream, ModelDescriptor, ModelFetcher};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

#[derive(Default)]
struct ManagerState {
    session: Option<InferenceSession>,
    active_model: Option<String>,
}

/// Process-wide entry point: initialize a model, send messages, clean up.
///
/// `initialize`, `send`, and `cleanup` are serialized against each other by
/// an internal async mutex, so no handle is ever replaced while another call
/// still uses it.
pub struct SessionManager {
    config: PocketlmConfig,
    fetcher: ModelFetcher,
    selector: BackendSelector,
    state: Mutex<ManagerState>,
}

impl SessionManager {
    /// Composes a manager from configuration, an engine provider, and a
    /// credential store.
    pub fn new(
        config: PocketlmConfig,
        provider: Arc<dyn EngineProvider>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ManagerError> {
        config.ensure_data_dir()?;
        let fetcher = ModelFetcher::new(&config, credentials)?;
        let selector = BackendSelector::new(provider);

        Ok(Self {
            config,
            fetcher,
            selector,
            state: Mutex::new(ManagerState::default()),
        })
    }

    /// Materializes the model file, selects a backend, and builds the live
    /// session. Returns the backend that won the fallback chain.
    ///
    /// A session that is already live is released first. On failure the
    /// manager is left uninitialized with no partially-live engine.
    pub async fn initialize(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<BackendKind, ManagerError> {
        self.initialize_with_progress(descriptor, &NoOpHandler).await
    }

    /// Like [`initialize`](Self::initialize), forwarding every acquisition
    /// event to `handler`.
    pub async fn initialize_with_progress(
        &self,
        descriptor: &ModelDescriptor,
        handler: &dyn ProgressHandler,
    ) -> Result<BackendKind, ManagerError> {
        let mut state = self.state.lock().await;

        if let Some(mut old) = state.session.take() {
            info!(model = ?state.active_model, "Releasing previous session before initialize");
            old.release();
        }
        state.active_model = None;

        let local_path = self.run_acquisition(descriptor, handler).await?;

        let preferred = self
            .config
            .preferred_backend
            .or(descriptor.preferred_backend);
        let handle = self
            .selector
            .select_and_initialize(&local_path, preferred)
            .await?;
        let backend = handle.backend();

        state.session = Some(InferenceSession::new(
            handle,
            descriptor.system_prompt.clone(),
        ));
        state.active_model = Some(descriptor.id.clone());

        info!(model = %descriptor.id, backend = %backend, "Session initialized");
        Ok(backend)
    }

    async fn run_acquisition(
        &self,
        descriptor: &ModelDescriptor,
        handler: &dyn ProgressHandler,
    ) -> Result<PathBuf, ManagerError> {
        let mut events = self.fetcher.acquire(descriptor);
        let mut local_path = None;

        while let Some(event) = events.next().await {
            handler.on_progress(&event);
            match event {
                DownloadState::Complete { path } => local_path = Some(path),
                DownloadState::Error(e) => return Err(e.into()),
                DownloadState::Started | DownloadState::Progress { .. } => {}
            }
        }

        local_path.ok_or_else(|| {
            ManagerError::Download(crate::model::DownloadError::Network(
                "download ended without a terminal event".to_string(),
            ))
        })
    }

    /// Streams the model's response to one user turn.
    pub async fn send(&self, text: &str) -> Result<ResponseStream, ManagerError> {
        let mut state = self.state.lock().await;
        match state.session.as_mut() {
            Some(session) => session.send(text).await,
            None => Err(ManagerError::NotInitialized),
        }
    }

    /// Pass-through acquisition for callers that want to drive the progress
    /// stream themselves (e.g. a download screen).
    pub fn acquire(&self, descriptor: &ModelDescriptor) -> DownloadStream {
        self.fetcher.acquire(descriptor)
    }

    /// Whether the descriptor's weights are already present locally.
    pub fn is_downloaded(&self, descriptor: &ModelDescriptor) -> bool {
        self.fetcher.is_downloaded(descriptor)
    }

    /// The backend serving the live session, if any.
    pub async fn active_backend(&self) -> Option<BackendKind> {
        self.state.lock().await.session.as_ref().map(|s| s.backend())
    }

    /// Display name of the active backend, or "none".
    pub async fn active_backend_name(&self) -> String {
        match self.active_backend().await {
            Some(backend) => backend.as_str().to_string(),
            None => "none".to_string(),
        }
    }

    /// Identity of the currently initialized model, if any.
    pub async fn active_model_id(&self) -> Option<String> {
        self.state.lock().await.active_model.clone()
    }

    /// Approximate process memory usage in megabytes. Derived from process
    /// RSS, not from the native engine.
    pub fn memory_usage_mb(&self) -> u64 {
        let mut sys = sysinfo::System::new();
        match sysinfo::get_current_pid() {
            Ok(pid) => {
                sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
                sys.process(pid)
                    .map(|p| p.memory() / (1024 * 1024))
                    .unwrap_or(0)
            }
            Err(e) => {
                warn!(error = %e, "Could not resolve current pid for memory telemetry");
                0
            }
        }
    }

    /// Releases the live session if any. Safe to call repeatedly and before
    /// any `initialize`; release failures are logged, never propagated.
    pub async fn cleanup(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut session) = state.session.take() {
            debug!(model = ?state.active_model, "Cleaning up session");
            session.release();
        }
        state.active_model = None;
    }
}
