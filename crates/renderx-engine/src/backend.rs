use std::fmt;
use std::path::{Path, PathBuf};

use renderx_contracts::models::GenerationRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::ApiKey;
use crate::error::{DownloadError, PollError, SubmissionError};

/// Server-assigned operation name, e.g. `models/veo-2.0-generate-001/operations/abc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationHandle(String);

impl OperationHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded `GET {operation}` body. `response` keeps whatever shape the API
/// returned; see [`crate::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl OperationStatus {
    pub fn running() -> Self {
        Self::default()
    }

    pub fn completed(response: Value) -> Self {
        Self {
            done: true,
            response: Some(response),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
    pub content_type: Option<String>,
    pub warnings: Vec<String>,
}

/// Transport for one long-running video generation service.
///
/// Each method is exactly one remote interaction; looping, timeouts and
/// bookkeeping live in the callers.
pub trait VideoBackend: Send + Sync {
    fn name(&self) -> &str;

    fn submit(
        &self,
        credential: &ApiKey,
        request: &GenerationRequest,
    ) -> Result<OperationHandle, SubmissionError>;

    fn fetch_operation(
        &self,
        credential: &ApiKey,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, PollError>;

    fn download(
        &self,
        credential: &ApiKey,
        uri: &str,
        destination: &Path,
    ) -> Result<DownloadedArtifact, DownloadError>;
}
