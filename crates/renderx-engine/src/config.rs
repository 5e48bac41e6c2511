use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::ApiKey;
use crate::gemini::DEFAULT_API_BASE;
use crate::poller::PollSettings;

pub const OUTPUT_DIR_NAME: &str = "VEO_OUTPUT";
pub const EVENTS_FILE_NAME: &str = "events.jsonl";
pub const SUMMARY_FILE_NAME: &str = "summary.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub api_base: String,
    pub api_key: Option<ApiKey>,
    pub output_dir: PathBuf,
    pub poll: PollSettings,
}

impl EngineConfig {
    /// Reads `GEMINI_API_KEY` (then `GOOGLE_API_KEY`), `GEMINI_API_BASE`,
    /// `RENDERX_OUTPUT_DIR`, `RENDERX_POLL_TIMEOUT_SECS` and
    /// `RENDERX_POLL_INTERVAL_SECS`. Blank or unparsable values fall back to
    /// defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |name: &str| non_empty(lookup(name));
        let api_key = value("GEMINI_API_KEY")
            .or_else(|| value("GOOGLE_API_KEY"))
            .map(ApiKey::new);
        let api_base = value("GEMINI_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let output_dir = value("RENDERX_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_output_dir(value("HOME").or_else(|| value("USERPROFILE"))));

        let defaults = PollSettings::default();
        let poll = PollSettings {
            timeout: secs(value("RENDERX_POLL_TIMEOUT_SECS")).unwrap_or(defaults.timeout),
            interval: secs(value("RENDERX_POLL_INTERVAL_SECS")).unwrap_or(defaults.interval),
        };

        Self {
            api_base,
            api_key,
            output_dir,
            poll,
        }
    }

    pub fn events_path(&self) -> PathBuf {
        self.output_dir.join(EVENTS_FILE_NAME)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(SUMMARY_FILE_NAME)
    }
}

/// `$HOME/Downloads/VEO_OUTPUT`, or a relative `VEO_OUTPUT` without a home.
pub fn default_output_dir(home: Option<String>) -> PathBuf {
    match home {
        Some(home) => PathBuf::from(home).join("Downloads").join(OUTPUT_DIR_NAME),
        None => PathBuf::from(OUTPUT_DIR_NAME),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn secs(value: Option<String>) -> Option<Duration> {
    value
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::EngineConfig;
    use crate::gemini::DEFAULT_API_BASE;
    use crate::poller::PollSettings;

    fn config_from(vars: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        EngineConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[("HOME", "/home/ada")]);
        assert_eq!(config.api_key, None);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(
            config.output_dir,
            PathBuf::from("/home/ada/Downloads/VEO_OUTPUT")
        );
        assert_eq!(config.poll, PollSettings::default());
        assert_eq!(
            config.events_path(),
            PathBuf::from("/home/ada/Downloads/VEO_OUTPUT/events.jsonl")
        );
    }

    #[test]
    fn google_key_is_the_fallback() {
        let config = config_from(&[("GEMINI_API_KEY", "  "), ("GOOGLE_API_KEY", "g-key")]);
        assert_eq!(
            config.api_key.as_ref().map(|key| key.expose()),
            Some("g-key")
        );
        let config = config_from(&[("GEMINI_API_KEY", "gem-key"), ("GOOGLE_API_KEY", "g-key")]);
        assert_eq!(
            config.api_key.as_ref().map(|key| key.expose()),
            Some("gem-key")
        );
    }

    #[test]
    fn overrides_and_bad_numbers() {
        let config = config_from(&[
            ("GEMINI_API_BASE", "http://127.0.0.1:9000/v1beta/"),
            ("RENDERX_OUTPUT_DIR", "/data/out"),
            ("RENDERX_POLL_TIMEOUT_SECS", "60"),
            ("RENDERX_POLL_INTERVAL_SECS", "soon"),
        ]);
        assert_eq!(config.api_base, "http://127.0.0.1:9000/v1beta");
        assert_eq!(config.output_dir, PathBuf::from("/data/out"));
        assert_eq!(config.poll.timeout, Duration::from_secs(60));
        assert_eq!(config.poll.interval, PollSettings::default().interval);
    }
}
