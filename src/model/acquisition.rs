//! Model acquisition pipeline
//!
//! Materializes a descriptor's weight file locally before an engine can be
//! built. The transfer runs in a spawned task and reports through an event
//! stream; dropping the stream cancels the transfer, closing the connection
//! and the file handle. A failed transfer keeps the partial file on disk and
//! is retried from the top by the caller.
//!
//! A file that already exists at the derived path is accepted as a complete
//! model with no checksum or size validation. A crash mid-download therefore
//! leaves a partial file that later surfaces as an engine initialization
//! failure rather than an acquisition error.

use crate::config::PocketlmConfig;
use crate::credentials::CredentialStore;
use crate::model::catalog::ModelDescriptor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Acquisition failures, surfaced verbatim so callers can classify them
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// The server answered with a non-2xx status
    #[error("Server returned HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// Connection or transfer-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Local file I/O failure
    #[error("File error: {0}")]
    Io(String),
}

impl DownloadError {
    /// True when the failure likely means a credential is needed: gated
    /// repositories answer 401/403, and sometimes 404, to anonymous reads.
    pub fn needs_credentials(&self) -> bool {
        matches!(
            self,
            DownloadError::HttpStatus {
                status: 401 | 403 | 404,
                ..
            }
        )
    }
}

/// Progress events for one acquisition call
///
/// Exactly one terminal event (`Complete` or `Error`) ends the stream.
/// `Progress.bytes_done` is cumulative and monotone; only the latest value
/// matters to a consumer.
#[derive(Debug, Clone)]
pub enum DownloadState {
    Started,
    Progress {
        bytes_done: u64,
        /// Declared Content-Length; absent when the server did not send one
        bytes_total: Option<u64>,
    },
    Complete {
        path: PathBuf,
    },
    Error(DownloadError),
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadState::Complete { .. } | DownloadState::Error(_))
    }
}

/// Ordered event stream of one acquisition call
pub type DownloadStream = ReceiverStream<DownloadState>;

/// Downloads model weight files to the data directory
pub struct ModelFetcher {
    client: reqwest::Client,
    data_dir: PathBuf,
    credentials: Arc<dyn CredentialStore>,
}

impl ModelFetcher {
    pub fn new(
        config: &PocketlmConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        Ok(Self {
            client,
            data_dir: config.data_dir.clone(),
            credentials,
        })
    }

    /// Deterministic local path for a descriptor's weights.
    pub fn model_path(&self, descriptor: &ModelDescriptor) -> PathBuf {
        self.data_dir.join(&descriptor.filename)
    }

    /// Whether the weights are already present locally.
    pub fn is_downloaded(&self, descriptor: &ModelDescriptor) -> bool {
        self.model_path(descriptor).exists()
    }

    /// Ensures the descriptor's weight file exists locally, streaming
    /// progress events.
    ///
    /// Idempotent: an already-present file yields `Started` then `Complete`
    /// with no network I/O. Dropping the returned stream cancels an
    /// in-flight transfer.
    pub fn acquire(&self, descriptor: &ModelDescriptor) -> DownloadStream {
        let (tx, rx) = mpsc::channel(32);

        let client = self.client.clone();
        let path = self.model_path(descriptor);
        let url = descriptor.url.clone();
        let token = self.credentials.token();
        let id = descriptor.id.clone();

        tokio::spawn(async move {
            let _ = tx.send(DownloadState::Started).await;

            if path.exists() {
                debug!(model = %id, path = %path.display(), "Model already present");
                let _ = tx.send(DownloadState::Complete { path }).await;
                return;
            }

            info!(model = %id, url = %url, "Downloading model");
            match transfer(&client, &url, token.as_deref(), &path, &tx).await {
                Ok(Some(path)) => {
                    info!(model = %id, path = %path.display(), "Model downloaded");
                    let _ = tx.send(DownloadState::Complete { path }).await;
                }
                Ok(None) => {
                    // Consumer dropped the stream; the partial file stays for
                    // a later retry.
                    debug!(model = %id, "Download cancelled by consumer");
                }
                Err(e) => {
                    warn!(model = %id, error = %e, "Download failed");
                    let _ = tx.send(DownloadState::Error(e)).await;
                }
            }
        });

        ReceiverStream::new(rx)
    }
}

/// Runs one transfer. Returns `Ok(None)` when the consumer went away.
async fn transfer(
    client: &reqwest::Client,
    url: &str,
    token: Option<&str>,
    path: &PathBuf,
    tx: &mpsc::Sender<DownloadState>,
) -> Result<Option<PathBuf>, DownloadError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::Io(e.to_string()))?;
    }

    let mut request = client.get(url);
    if let Some(token) = token {
        debug!("Attaching bearer token to download request");
        request = request.bearer_auth(token);
    }

    let mut response = request
        .send()
        .await
        .map_err(|e| DownloadError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::HttpStatus {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string(),
        });
    }

    let bytes_total = response.content_length();
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| DownloadError::Io(e.to_string()))?;

    let mut bytes_done: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| DownloadError::Network(e.to_string()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::Io(e.to_string()))?;
        bytes_done += chunk.len() as u64;

        let progress = DownloadState::Progress {
            bytes_done,
            bytes_total,
        };
        if tx.send(progress).await.is_err() {
            // Receiver dropped: stop here. Dropping the response closes the
            // connection and the file handle closes with `file`.
            return Ok(None);
        }
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::Io(e.to_string()))?;

    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
    Ok(Some(absolute))
}
