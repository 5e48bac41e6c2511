use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

use renderx_contracts::models::GenerationRequest;
use serde_json::json;

use crate::auth::ApiKey;
use crate::backend::{DownloadedArtifact, OperationHandle, OperationStatus, VideoBackend};
use crate::download::stream_to_file;
use crate::error::{DownloadError, PollError, SubmissionError};

const DRYRUN_SCHEME: &str = "dryrun://";

/// Offline backend: operations finish after `polls_before_done` fetches and
/// "download" a minimal MP4 container holding the prompt as a free box.
pub struct DryrunBackend {
    polls_before_done: u32,
    operations: Mutex<HashMap<String, DryrunOperation>>,
}

#[derive(Debug, Clone)]
struct DryrunOperation {
    prompt: String,
    polls: u32,
}

impl DryrunBackend {
    pub fn new(polls_before_done: u32) -> Self {
        Self {
            polls_before_done,
            operations: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for DryrunBackend {
    fn default() -> Self {
        Self::new(1)
    }
}

impl VideoBackend for DryrunBackend {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn submit(
        &self,
        _credential: &ApiKey,
        request: &GenerationRequest,
    ) -> Result<OperationHandle, SubmissionError> {
        let mut operations = self
            .operations
            .lock()
            .map_err(|_| SubmissionError::Transport("dryrun state poisoned".to_string()))?;
        let name = format!(
            "models/{}/operations/dryrun-{}",
            request.model,
            operations.len() + 1
        );
        operations.insert(
            name.clone(),
            DryrunOperation {
                prompt: request.prompt.clone(),
                polls: 0,
            },
        );
        Ok(OperationHandle::new(name))
    }

    fn fetch_operation(
        &self,
        _credential: &ApiKey,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, PollError> {
        let mut operations = self
            .operations
            .lock()
            .map_err(|_| PollError::Transport("dryrun state poisoned".to_string()))?;
        let Some(operation) = operations.get_mut(handle.as_str()) else {
            return Err(PollError::Http {
                status: 404,
                body: format!("unknown operation {handle}"),
            });
        };
        operation.polls += 1;
        if operation.polls <= self.polls_before_done {
            return Ok(OperationStatus::running());
        }
        let mut status = OperationStatus::completed(json!({
            "generatedVideos": [{"video": {"uri": format!("{DRYRUN_SCHEME}{handle}")}}]
        }));
        status.name = Some(handle.to_string());
        Ok(status)
    }

    fn download(
        &self,
        _credential: &ApiKey,
        uri: &str,
        destination: &Path,
    ) -> Result<DownloadedArtifact, DownloadError> {
        let Some(name) = uri.strip_prefix(DRYRUN_SCHEME) else {
            return Err(DownloadError::InvalidUri {
                uri: uri.to_string(),
                reason: "not a dryrun uri".to_string(),
            });
        };
        let prompt = self
            .operations
            .lock()
            .map_err(|_| DownloadError::Transport("dryrun state poisoned".to_string()))?
            .get(name)
            .map(|operation| operation.prompt.clone())
            .ok_or_else(|| DownloadError::Rejected {
                status: 404,
                message: "HTTP 404".to_string(),
            })?;
        let mut reader = Cursor::new(placeholder_mp4(&prompt));
        let (bytes, sha256) = stream_to_file(&mut reader, destination)?;
        Ok(DownloadedArtifact {
            path: destination.to_path_buf(),
            bytes,
            sha256,
            content_type: Some("video/mp4".to_string()),
            warnings: Vec::new(),
        })
    }
}

/// `ftyp` box followed by a `free` box carrying the prompt.
fn placeholder_mp4(prompt: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let ftyp_body: &[u8] = b"isom\x00\x00\x02\x00isomiso2mp41";
    push_box(&mut out, b"ftyp", ftyp_body);
    push_box(&mut out, b"free", prompt.as_bytes());
    out
}

fn push_box(out: &mut Vec<u8>, kind: &[u8; 4], body: &[u8]) {
    let size = (body.len() + 8) as u32;
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
}
