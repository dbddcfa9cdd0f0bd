//! Model descriptors and the built-in catalog

use crate::engine::BackendKind;
use serde::{Deserialize, Serialize};

/// Identity and source of one downloadable model
///
/// Descriptors are immutable and created at config-load time; many may
/// exist, and the session manager tracks which one is current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Stable identifier, e.g. "gemma-3n"
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Local filename the weights are stored under
    pub filename: String,
    /// Remote source URL (may require a bearer token)
    pub url: String,
    /// Optional system prompt injected when a conversation starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Optional starting point of the backend fallback chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_backend: Option<BackendKind>,
}

impl ModelDescriptor {
    /// Models known out of the box.
    pub fn builtin() -> Vec<ModelDescriptor> {
        vec![ModelDescriptor {
            id: "gemma-3n".to_string(),
            display_name: "Gemma 3n (Int4)".to_string(),
            filename: "gemma-3n-E2B-it-int4.litertlm".to_string(),
            url: "https://huggingface.co/google/gemma-3n-it-int4/resolve/main/gemma-3n-it-int4.litertlm"
                .to_string(),
            system_prompt: None,
            preferred_backend: Some(BackendKind::Npu),
        }]
    }

    /// Looks up a built-in descriptor by id.
    pub fn find_builtin(id: &str) -> Option<ModelDescriptor> {
        Self::builtin().into_iter().find(|m| m.id == id)
    }

    /// Parses a JSON catalog (an array of descriptors).
    pub fn load_catalog(json: &str) -> Result<Vec<ModelDescriptor>, serde_json::Error> {
        serde_json::from_str(json)
    }
}
