use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "veo-3.0-fast-generate-preview";

/// Parameter rules shared by every model of one Veo generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Fixed 16:9 and 8s, audio on. Duration is never sent.
    V3,
    /// 16:9 or 9:16, caller-selected 5-8s sent as `durationSeconds`, silent.
    V2,
    /// Unrecognised model name: parameters pass through, no duration sent.
    Other,
}

impl ModelFamily {
    pub fn from_model_name(model: &str) -> Self {
        let normalized = model
            .trim()
            .trim_start_matches("models/")
            .to_ascii_lowercase();
        if normalized.starts_with("veo-3") || normalized.starts_with("v3") {
            return Self::V3;
        }
        if normalized.starts_with("veo-2") || normalized.starts_with("v2") {
            return Self::V2;
        }
        Self::Other
    }

    pub fn aspect_ratios(self) -> &'static [&'static str] {
        match self {
            Self::V3 => &["16:9"],
            Self::V2 => &["16:9", "9:16"],
            Self::Other => &[],
        }
    }

    pub fn durations(self) -> &'static [u32] {
        match self {
            Self::V3 => &[8],
            Self::V2 => &[5, 6, 7, 8],
            Self::Other => &[],
        }
    }

    pub fn default_duration(self) -> u32 {
        8
    }

    /// Only the v2 family accepts a caller-provided duration on the wire.
    pub fn sends_duration(self) -> bool {
        matches!(self, Self::V2)
    }

    pub fn audio(self) -> bool {
        matches!(self, Self::V3)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::V3 => "v3",
            Self::V2 => "v2",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub family: ModelFamily,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    /// Known spec for `name`, or an ad-hoc one classified by name prefix.
    pub fn resolve(&self, name: &str) -> ModelSpec {
        let trimmed = name.trim();
        if let Some(spec) = self.get(trimmed) {
            return spec.clone();
        }
        ModelSpec {
            name: trimmed.to_string(),
            family: ModelFamily::from_model_name(trimmed),
            description: "unregistered model".to_string(),
        }
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, family: ModelFamily, description: &str| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                family,
                description: description.to_string(),
            },
        );
    };

    insert(
        DEFAULT_MODEL,
        ModelFamily::V3,
        "fast, 8s, 16:9, audio on",
    );
    insert(
        "veo-3.0-generate-preview",
        ModelFamily::V3,
        "8s, 16:9, audio on",
    );
    insert(
        "veo-2.0-generate-001",
        ModelFamily::V2,
        "5-8s, 16:9 or 9:16, silent",
    );
    map
}
