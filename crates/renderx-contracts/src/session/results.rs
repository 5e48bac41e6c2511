use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::runs::summary::now_utc_iso;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

impl ResultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Ok => "✅",
            Self::Error => "❌",
        }
    }
}

/// Pipeline step a failed job stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Submit,
    Poll,
    Resolve,
    Download,
}

impl JobStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Poll => "poll",
            Self::Resolve => "resolve",
            Self::Download => "download",
        }
    }
}

/// Outcome of one prompt in one batch run. Only `auto_delivered` ever changes
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: String,
    pub index: usize,
    pub status: ResultStatus,
    pub path: Option<PathBuf>,
    pub info: String,
    pub prompt: String,
    #[serde(default)]
    pub auto_delivered: bool,
    pub stage: Option<JobStage>,
    pub operation: Option<String>,
    pub sha256: Option<String>,
    pub created_at: String,
}

impl ResultRecord {
    pub fn ok(index: usize, prompt: &str, path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            index,
            status: ResultStatus::Ok,
            info: path.to_string_lossy().to_string(),
            path: Some(path),
            prompt: prompt.to_string(),
            auto_delivered: false,
            stage: None,
            operation: None,
            sha256: None,
            created_at: now_utc_iso(),
        }
    }

    pub fn error(index: usize, prompt: &str, stage: JobStage, info: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            index,
            status: ResultStatus::Error,
            path: None,
            info: info.into(),
            prompt: prompt.to_string(),
            auto_delivered: false,
            stage: Some(stage),
            operation: None,
            sha256: None,
            created_at: now_utc_iso(),
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResultStatus::Ok
    }

    /// `1. ✅ OK — /out/veo_1_20250101_120000.mp4`
    pub fn summary_line(&self) -> String {
        format!(
            "{}. {} {} — {}",
            self.index,
            self.status.icon(),
            self.status.as_str(),
            self.info
        )
    }
}

/// Session-scoped, ordered list of job outcomes. Reads never mutate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultStore {
    records: Vec<ResultRecord>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<ResultRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ResultRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn append(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = ResultRecord>) {
        self.records.extend(records);
    }

    pub fn delete(&mut self, id: &str) -> Option<ResultRecord> {
        let position = self.records.iter().position(|record| record.id == id)?;
        Some(self.records.remove(position))
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        removed
    }

    /// OK records whose artifact is still on disk.
    pub fn exportable(&self) -> Vec<&ResultRecord> {
        self.records
            .iter()
            .filter(|record| record.is_ok())
            .filter(|record| record.path.as_ref().is_some_and(|path| path.is_file()))
            .collect()
    }

    /// Ids of OK records the delivery hook has not fired for yet.
    pub fn pending_delivery(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|record| record.is_ok() && !record.auto_delivered)
            .map(|record| record.id.clone())
            .collect()
    }

    /// Returns `false` if the record is unknown or was already delivered.
    pub fn mark_delivered(&mut self, id: &str) -> bool {
        match self.records.iter_mut().find(|record| record.id == id) {
            Some(record) if !record.auto_delivered => {
                record.auto_delivered = true;
                true
            }
            _ => false,
        }
    }

    /// Same reference rules as prompts: 1-based position, id, or id prefix.
    pub fn resolve_ref(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if let Ok(position) = reference.parse::<usize>() {
            return position
                .checked_sub(1)
                .and_then(|idx| self.records.get(idx))
                .map(|record| record.id.clone());
        }
        if self.get(reference).is_some() {
            return Some(reference.to_string());
        }
        if reference.len() < 4 {
            return None;
        }
        let mut matches = self
            .records
            .iter()
            .filter(|record| record.id.starts_with(reference));
        let first = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(first.id.clone())
    }
}
