use uuid::Uuid;

use super::prompts::PromptList;
use super::results::ResultStore;
use crate::models::{GenerationParams, DEFAULT_MODEL};

/// Everything that has to survive between two interactions of one session.
///
/// Defaults from [`SessionState::new`]: no prompts, no results, model
/// [`DEFAULT_MODEL`], 16:9 with the family's default duration, no negative
/// prompt, person generation left to the API, auto-delivery off.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub prompts: PromptList,
    pub results: ResultStore,
    pub model: String,
    pub params: GenerationParams,
    pub auto_deliver: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            prompts: PromptList::new(),
            results: ResultStore::new(),
            model: DEFAULT_MODEL.to_string(),
            params: GenerationParams::default(),
            auto_deliver: false,
        }
    }

    pub fn set_model(&mut self, model: &str) -> bool {
        let trimmed = model.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.model = trimmed.to_string();
        true
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: &str) {
        self.params.aspect_ratio = aspect_ratio.trim().to_string();
    }

    pub fn set_duration(&mut self, duration_seconds: Option<u32>) {
        self.params.duration_seconds = duration_seconds;
    }

    pub fn set_negative_prompt(&mut self, negative_prompt: Option<&str>) {
        self.params.negative_prompt = negative_prompt
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
    }

    pub fn set_person_generation(&mut self, person_generation: Option<&str>) {
        self.params.person_generation = person_generation
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
    }

    pub fn set_auto_deliver(&mut self, enabled: bool) {
        self.auto_deliver = enabled;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
