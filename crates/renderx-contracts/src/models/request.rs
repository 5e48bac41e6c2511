use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::registry::ModelFamily;

pub const PERSON_GENERATION_OPTIONS: &[&str] = &["allow_all", "allow_adult", "dont_allow"];

const DEFAULT_ASPECT_RATIO: &str = "16:9";

/// User-facing generation settings, shared by every prompt of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub aspect_ratio: String,
    pub duration_seconds: Option<u32>,
    pub negative_prompt: Option<String>,
    pub person_generation: Option<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            duration_seconds: None,
            negative_prompt: None,
            person_generation: None,
        }
    }
}

/// One `predictLongRunning` call, normalised for the model family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub family: ModelFamily,
    pub prompt: String,
    pub aspect_ratio: String,
    pub negative_prompt: Option<String>,
    pub person_generation: Option<String>,
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl GenerationRequest {
    pub fn build(model: &str, prompt: &str, params: &GenerationParams) -> Self {
        let model = model.trim().trim_start_matches("models/").to_string();
        let family = ModelFamily::from_model_name(&model);
        let mut warnings = Vec::new();

        let aspect_ratio = normalize_aspect_ratio(family, &params.aspect_ratio, &mut warnings);
        let duration_seconds =
            normalize_duration(family, params.duration_seconds, &mut warnings);
        let negative_prompt = params
            .negative_prompt
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let person_generation = params
            .person_generation
            .as_deref()
            .and_then(|value| normalize_person_generation(value, &mut warnings));

        Self {
            model,
            family,
            prompt: prompt.to_string(),
            aspect_ratio,
            negative_prompt,
            person_generation,
            duration_seconds,
            warnings,
        }
    }

    /// Duration the job will actually render, sent or not.
    pub fn effective_duration(&self) -> u32 {
        self.duration_seconds
            .unwrap_or_else(|| self.family.default_duration())
    }

    pub fn parameters(&self) -> Map<String, Value> {
        let mut parameters = Map::new();
        parameters.insert(
            "aspectRatio".to_string(),
            Value::String(self.aspect_ratio.clone()),
        );
        if let Some(duration) = self.duration_seconds {
            parameters.insert("durationSeconds".to_string(), Value::Number(duration.into()));
        }
        if let Some(negative) = &self.negative_prompt {
            parameters.insert(
                "negativePrompt".to_string(),
                Value::String(negative.clone()),
            );
        }
        if let Some(person) = &self.person_generation {
            parameters.insert(
                "personGeneration".to_string(),
                Value::String(person.clone()),
            );
        }
        parameters
    }

    pub fn payload(&self) -> Value {
        json!({
            "instances": [{
                "prompt": self.prompt,
            }],
            "parameters": self.parameters(),
        })
    }
}

fn normalize_aspect_ratio(family: ModelFamily, raw: &str, warnings: &mut Vec<String>) -> String {
    let value = raw.trim().replace('/', ":");
    let allowed = family.aspect_ratios();
    if allowed.is_empty() {
        if value.is_empty() {
            return DEFAULT_ASPECT_RATIO.to_string();
        }
        return value;
    }
    if allowed.iter().any(|candidate| *candidate == value) {
        return value;
    }
    let fallback = allowed[0];
    if !value.is_empty() {
        warnings.push(format!(
            "aspect ratio '{raw}' unsupported for {} models; using {fallback}.",
            family.label()
        ));
    }
    fallback.to_string()
}

fn normalize_duration(
    family: ModelFamily,
    requested: Option<u32>,
    warnings: &mut Vec<String>,
) -> Option<u32> {
    if !family.sends_duration() {
        if let Some(value) = requested.filter(|value| *value != family.default_duration()) {
            warnings.push(format!(
                "duration {value}s ignored; {} models render a fixed {}s.",
                family.label(),
                family.default_duration()
            ));
        }
        return None;
    }
    let durations = family.durations();
    let min = durations.iter().copied().min().unwrap_or(1);
    let max = durations
        .iter()
        .copied()
        .max()
        .unwrap_or_else(|| family.default_duration());
    let value = requested.unwrap_or_else(|| family.default_duration());
    let clamped = value.clamp(min, max);
    if clamped != value {
        warnings.push(format!("duration {value}s clamped to {clamped}s."));
    }
    Some(clamped)
}

fn normalize_person_generation(raw: &str, warnings: &mut Vec<String>) -> Option<String> {
    let normalized = raw.trim().to_ascii_lowercase();
    if normalized.is_empty() || normalized == "default" || normalized == "(default)" {
        return None;
    }
    if PERSON_GENERATION_OPTIONS.contains(&normalized.as_str()) {
        return Some(normalized);
    }
    warnings.push(format!("person generation '{raw}' unsupported; ignoring."));
    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{GenerationParams, GenerationRequest};
    use crate::models::ModelFamily;

    fn params(aspect: &str, duration: Option<u32>) -> GenerationParams {
        GenerationParams {
            aspect_ratio: aspect.to_string(),
            duration_seconds: duration,
            ..GenerationParams::default()
        }
    }

    #[test]
    fn v3_requests_never_carry_duration() {
        let request =
            GenerationRequest::build("veo-3.0-generate-preview", "a cat", &params("16:9", Some(5)));
        assert_eq!(request.family, ModelFamily::V3);
        assert_eq!(request.duration_seconds, None);
        assert!(request.parameters().get("durationSeconds").is_none());
        assert_eq!(request.effective_duration(), 8);
        assert_eq!(request.warnings.len(), 1);
    }

    #[test]
    fn v2_requests_send_duration() {
        let request =
            GenerationRequest::build("veo-2.0-generate-001", "a cat", &params("9:16", Some(6)));
        assert_eq!(
            request.payload(),
            json!({
                "instances": [{"prompt": "a cat"}],
                "parameters": {"aspectRatio": "9:16", "durationSeconds": 6},
            })
        );
        assert!(request.warnings.is_empty());
    }

    #[test]
    fn v2_duration_defaults_and_clamps() {
        let defaulted = GenerationRequest::build("v2", "x", &params("16:9", None));
        assert_eq!(defaulted.duration_seconds, Some(8));

        let clamped = GenerationRequest::build("v2", "x", &params("16:9", Some(12)));
        assert_eq!(clamped.duration_seconds, Some(8));
        assert_eq!(clamped.warnings, vec!["duration 12s clamped to 8s.".to_string()]);
    }

    #[test]
    fn v3_aspect_ratio_is_fixed() {
        let request = GenerationRequest::build("veo-3.0-fast-generate-preview", "x", &params("9:16", None));
        assert_eq!(request.aspect_ratio, "16:9");
        assert_eq!(request.warnings.len(), 1);
    }

    #[test]
    fn optional_parameters_are_omitted_when_unset() {
        let mut settings = params("16:9", None);
        settings.negative_prompt = Some("   ".to_string());
        settings.person_generation = Some("(default)".to_string());
        let request = GenerationRequest::build("veo-3.0-generate-preview", "x", &settings);
        let parameters = request.parameters();
        assert!(parameters.get("negativePrompt").is_none());
        assert!(parameters.get("personGeneration").is_none());

        settings.negative_prompt = Some("blurry".to_string());
        settings.person_generation = Some("ALLOW_ADULT".to_string());
        let request = GenerationRequest::build("veo-3.0-generate-preview", "x", &settings);
        let parameters = request.parameters();
        assert_eq!(parameters["negativePrompt"], json!("blurry"));
        assert_eq!(parameters["personGeneration"], json!("allow_adult"));
    }

    #[test]
    fn unknown_person_generation_is_dropped_with_warning() {
        let mut settings = params("16:9", None);
        settings.person_generation = Some("everyone".to_string());
        let request = GenerationRequest::build("veo-2.0-generate-001", "x", &settings);
        assert_eq!(request.person_generation, None);
        assert_eq!(request.warnings.len(), 1);
    }
}
