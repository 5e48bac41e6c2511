use std::path::Path;
use std::time::Duration;

use renderx_contracts::models::GenerationRequest;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use crate::auth::{redact_url, with_credential, ApiKey};
use crate::backend::{DownloadedArtifact, OperationHandle, OperationStatus, VideoBackend};
use crate::download::{is_expected_media_type, rejection_message, stream_to_file};
use crate::error::{DownloadError, PollError, SubmissionError};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_HEADER: &str = "x-goog-api-key";

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(90);
const OPERATION_TIMEOUT: Duration = Duration::from_secs(60);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Veo through the Gemini API `predictLongRunning` surface.
pub struct GeminiVeoBackend {
    api_base: String,
    http: HttpClient,
}

impl GeminiVeoBackend {
    pub fn new(api_base: impl Into<String>) -> Self {
        let api_base = api_base.into();
        let trimmed = api_base.trim().trim_end_matches('/');
        Self {
            api_base: if trimmed.is_empty() {
                DEFAULT_API_BASE.to_string()
            } else {
                trimmed.to_string()
            },
            http: HttpClient::new(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn submit_endpoint(&self, model: &str) -> String {
        let trimmed = model.trim().trim_start_matches("models/");
        format!("{}/models/{}:predictLongRunning", self.api_base, trimmed)
    }

    fn operation_endpoint(&self, handle: &OperationHandle) -> String {
        format!(
            "{}/{}",
            self.api_base,
            handle.as_str().trim().trim_start_matches('/')
        )
    }
}

impl Default for GeminiVeoBackend {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

impl VideoBackend for GeminiVeoBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn submit(
        &self,
        credential: &ApiKey,
        request: &GenerationRequest,
    ) -> Result<OperationHandle, SubmissionError> {
        let endpoint = self.submit_endpoint(&request.model);
        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, credential.expose())
            .timeout(SUBMIT_TIMEOUT)
            .json(&request.payload())
            .send()
            .map_err(|err| SubmissionError::Transport(err.without_url().to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| SubmissionError::Transport(err.without_url().to_string()))?;
        if !status.is_success() {
            return Err(SubmissionError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: Value = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) => return Err(SubmissionError::MalformedResponse { body }),
        };
        let name = parsed
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty());
        match name {
            Some(name) => Ok(OperationHandle::new(name)),
            None => Err(SubmissionError::MalformedResponse { body }),
        }
    }

    fn fetch_operation(
        &self,
        credential: &ApiKey,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, PollError> {
        let endpoint = self.operation_endpoint(handle);
        let response = self
            .http
            .get(&endpoint)
            .header(API_KEY_HEADER, credential.expose())
            .timeout(OPERATION_TIMEOUT)
            .send()
            .map_err(|err| PollError::Transport(err.without_url().to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| PollError::Transport(err.without_url().to_string()))?;
        if !status.is_success() {
            return Err(PollError::Http {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|err| PollError::Decode(err.to_string()))
    }

    fn download(
        &self,
        credential: &ApiKey,
        uri: &str,
        destination: &Path,
    ) -> Result<DownloadedArtifact, DownloadError> {
        let url = with_credential(uri, credential)?;
        tracing::info!(
            url = %redact_url(&url),
            destination = %destination.display(),
            "download started"
        );
        let mut response = self
            .http
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .map_err(|err| DownloadError::Transport(err.without_url().to_string()))?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let content_type_text = content_type.clone().unwrap_or_default();

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DownloadError::Rejected {
                status: status.as_u16(),
                message: rejection_message(status.as_u16(), &content_type_text, &body),
            });
        }

        let mut warnings = Vec::new();
        if !is_expected_media_type(&content_type_text) {
            tracing::warn!(
                content_type = %content_type_text,
                "unexpected content-type during download"
            );
            warnings.push(format!(
                "unexpected content-type during download: {content_type_text}"
            ));
        }

        let (bytes, sha256) = stream_to_file(&mut response, destination)?;
        Ok(DownloadedArtifact {
            path: destination.to_path_buf(),
            bytes,
            sha256,
            content_type,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{GeminiVeoBackend, DEFAULT_API_BASE};
    use crate::backend::OperationHandle;

    #[test]
    fn endpoints_follow_the_rest_layout() {
        let backend = GeminiVeoBackend::new("https://example.test/v1beta/");
        assert_eq!(
            backend.submit_endpoint("models/veo-2.0-generate-001"),
            "https://example.test/v1beta/models/veo-2.0-generate-001:predictLongRunning"
        );
        assert_eq!(
            backend.operation_endpoint(&OperationHandle::new(
                "models/veo-2.0-generate-001/operations/abc"
            )),
            "https://example.test/v1beta/models/veo-2.0-generate-001/operations/abc"
        );
    }

    #[test]
    fn blank_base_falls_back_to_default() {
        assert_eq!(GeminiVeoBackend::new("  ").api_base(), DEFAULT_API_BASE);
    }
}
