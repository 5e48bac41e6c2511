use std::path::Path;

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::session::ResultRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub session_id: String,
    pub batch_id: String,
    pub model: String,
    pub started_at: String,
    pub finished_at: String,
    pub total: u64,
    pub ok: u64,
    pub failed: u64,
    pub records: Vec<ResultRecord>,
}

impl BatchSummary {
    pub fn new(
        session_id: &str,
        batch_id: &str,
        model: &str,
        started_at: String,
        records: Vec<ResultRecord>,
    ) -> Self {
        let ok = records.iter().filter(|record| record.is_ok()).count() as u64;
        let total = records.len() as u64;
        Self {
            session_id: session_id.to_string(),
            batch_id: batch_id.to_string(),
            model: model.to_string(),
            started_at,
            finished_at: now_utc_iso(),
            total,
            ok,
            failed: total - ok,
            records,
        }
    }
}

pub fn write_summary(
    path: &Path,
    summary: &BatchSummary,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(summary)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}

pub fn read_summary(path: &Path) -> anyhow::Result<BatchSummary> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid summary {}", path.display()))
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{read_summary, write_summary, BatchSummary};
    use crate::session::{JobStage, ResultRecord};

    #[test]
    fn write_summary_generates_expected_payload() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("summary.json");

        let summary = BatchSummary::new(
            "session-1",
            "batch-1",
            "veo-2.0-generate-001",
            "2025-08-01T00:00:00+00:00".to_string(),
            vec![
                ResultRecord::ok(1, "a cat", temp.path().join("veo_1.mp4")),
                ResultRecord::error(2, "a dog", JobStage::Submit, "429: quota"),
            ],
        );
        let mut extra = Map::new();
        extra.insert("output_dir".to_string(), Value::String("/out".to_string()));
        write_summary(&path, &summary, Some(&extra))?;

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(parsed["session_id"], json!("session-1"));
        assert_eq!(parsed["total"], json!(2));
        assert_eq!(parsed["ok"], json!(1));
        assert_eq!(parsed["failed"], json!(1));
        assert_eq!(parsed["records"][1]["info"], json!("429: quota"));
        assert_eq!(parsed["output_dir"], json!("/out"));
        assert!(parsed.get("ts").and_then(Value::as_str).is_some());

        let reread = read_summary(&path)?;
        assert_eq!(reread, summary);
        Ok(())
    }
}
