use renderx_contracts::models::GenerationRequest;

use crate::auth::ApiKey;
use crate::backend::{OperationHandle, VideoBackend};
use crate::error::SubmissionError;

const PROMPT_PREVIEW_CHARS: usize = 80;

/// Kicks off one generation. No retry: a failed kickoff is reported to the
/// caller as-is.
pub fn submit_job(
    backend: &dyn VideoBackend,
    credential: &ApiKey,
    request: &GenerationRequest,
) -> Result<OperationHandle, SubmissionError> {
    tracing::info!(
        backend = backend.name(),
        model = %request.model,
        aspect_ratio = %request.aspect_ratio,
        duration_secs = request.effective_duration(),
        prompt = %prompt_preview(&request.prompt),
        "kickoff"
    );
    for warning in &request.warnings {
        tracing::warn!(model = %request.model, "{warning}");
    }
    match backend.submit(credential, request) {
        Ok(handle) => {
            tracing::info!(operation = %handle, "kickoff ok");
            Ok(handle)
        }
        Err(err) => {
            tracing::error!(error = %credential.redact(&err.to_string()), "kickoff failed");
            Err(err)
        }
    }
}

/// Prompt with whitespace collapsed, cut to 80 characters.
pub fn prompt_preview(prompt: &str) -> String {
    let single_line = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= PROMPT_PREVIEW_CHARS {
        return single_line;
    }
    let mut preview: String = single_line.chars().take(PROMPT_PREVIEW_CHARS).collect();
    preview.push('…');
    preview
}
