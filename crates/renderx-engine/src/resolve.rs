//! Media URI extraction from completed operations.
//!
//! The API has shipped two response shapes:
//! - `generatedVideos[0].video.{uri|fileUri}`
//! - `generateVideoResponse.generatedSamples[0].video.{uri|fileUri}` (older preview)
//!
//! Any structural mismatch in the first shape falls through to the second.

use serde_json::Value;

use crate::backend::OperationStatus;
use crate::error::ResolutionError;

pub fn extract_media_uri(response: &Value) -> Option<String> {
    let current = response
        .get("generatedVideos")
        .and_then(first_video)
        .and_then(video_uri);
    if current.is_some() {
        return current;
    }
    response
        .get("generateVideoResponse")
        .and_then(|inner| inner.get("generatedSamples"))
        .and_then(first_video)
        .and_then(video_uri)
}

/// Classifies a terminal status: an `error` object wins over any payload.
pub fn resolve_media_uri(status: &OperationStatus) -> Result<String, ResolutionError> {
    if let Some(error) = status.error.as_ref().filter(|value| !value.is_null()) {
        return Err(ResolutionError::OperationFailed {
            message: operation_error_message(error),
        });
    }
    status
        .response
        .as_ref()
        .and_then(extract_media_uri)
        .ok_or(ResolutionError::NoMediaUri)
}

fn first_video(list: &Value) -> Option<&Value> {
    list.as_array()?.first()?.get("video")
}

fn video_uri(video: &Value) -> Option<String> {
    ["uri", "fileUri"]
        .iter()
        .filter_map(|key| video.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn operation_error_message(error: &Value) -> String {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let code = error.get("code").and_then(Value::as_i64);
    match (code, message) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (None, Some(message)) => message.to_string(),
        _ => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{extract_media_uri, resolve_media_uri};
    use crate::backend::OperationStatus;
    use crate::error::ResolutionError;

    #[test]
    fn current_shape_uri() {
        let response = json!({"generatedVideos": [{"video": {"uri": "https://cdn/x.mp4"}}]});
        assert_eq!(
            extract_media_uri(&response).as_deref(),
            Some("https://cdn/x.mp4")
        );
    }

    #[test]
    fn older_shape_file_uri() {
        let response = json!({
            "generateVideoResponse": {
                "generatedSamples": [{"video": {"fileUri": "https://files/abc:download"}}]
            }
        });
        assert_eq!(
            extract_media_uri(&response).as_deref(),
            Some("https://files/abc:download")
        );
    }

    #[test]
    fn malformed_current_shape_falls_through_to_older_shape() {
        for broken in [
            json!([]),
            json!("nope"),
            json!([{"video": "x"}]),
            json!([{"video": {"uri": ""}}]),
            json!([{"video": {"uri": 7}}]),
        ] {
            let response = json!({
                "generatedVideos": broken,
                "generateVideoResponse": {
                    "generatedSamples": [{"video": {"uri": "https://old/y.mp4"}}]
                }
            });
            assert_eq!(
                extract_media_uri(&response).as_deref(),
                Some("https://old/y.mp4")
            );
        }
    }

    #[test]
    fn uri_wins_over_file_uri_and_empty_uri_falls_back() {
        let both = json!({"generatedVideos": [{"video": {"uri": "a", "fileUri": "b"}}]});
        assert_eq!(extract_media_uri(&both).as_deref(), Some("a"));
        let empty = json!({"generatedVideos": [{"video": {"uri": "  ", "fileUri": "b"}}]});
        assert_eq!(extract_media_uri(&empty).as_deref(), Some("b"));
    }

    #[test]
    fn neither_shape_is_not_found() {
        assert_eq!(extract_media_uri(&json!({})), None);
        assert_eq!(extract_media_uri(&json!({"generatedVideos": []})), None);
        assert_eq!(extract_media_uri(&json!(null)), None);
    }

    #[test]
    fn terminal_error_is_classified_before_extraction() {
        let mut status = OperationStatus::completed(json!({}));
        status.error = Some(json!({"code": 3, "message": "prompt blocked"}));
        assert!(matches!(
            resolve_media_uri(&status),
            Err(ResolutionError::OperationFailed { message }) if message == "3: prompt blocked"
        ));

        let empty = OperationStatus::completed(json!({"generatedVideos": []}));
        assert!(matches!(
            resolve_media_uri(&empty),
            Err(ResolutionError::NoMediaUri)
        ));
    }
}
