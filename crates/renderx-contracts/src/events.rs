use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde_json::{Map, Value};

use crate::runs::summary::now_utc_iso;

pub type EventPayload = Map<String, Value>;

pub const DEFAULT_MAX_LOG_BYTES: u64 = 2_000_000;
pub const DEFAULT_LOG_BACKUPS: usize = 3;
pub const DEFAULT_TAIL_BYTES: u64 = 60_000;

/// Append-only writer for the operational `events.jsonl` log.
///
/// - default fields are `type`, `session_id`, `ts`
/// - caller payload is merged last and can override defaults
/// - one compact JSON object per line
/// - once the file would grow past `max_bytes` it is rotated to `events.jsonl.1`,
///   shifting older backups up to `backups`
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    max_bytes: u64,
    backups: usize,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self::with_rotation(path, session_id, DEFAULT_MAX_LOG_BYTES, DEFAULT_LOG_BACKUPS)
    }

    pub fn with_rotation(
        path: impl Into<PathBuf>,
        session_id: impl Into<String>,
        max_bytes: u64,
        backups: usize,
    ) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                max_bytes,
                backups,
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }

        if let Some(parent) = self.inner.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        self.rotate_if_needed(line.len() as u64 + 1)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }

    fn rotate_if_needed(&self, incoming: u64) -> anyhow::Result<()> {
        if self.inner.max_bytes == 0 {
            return Ok(());
        }
        let current = match fs::metadata(&self.inner.path) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(()),
        };
        if current == 0 || current + incoming <= self.inner.max_bytes {
            return Ok(());
        }
        if self.inner.backups == 0 {
            fs::remove_file(&self.inner.path)
                .with_context(|| format!("failed to truncate {}", self.inner.path.display()))?;
            return Ok(());
        }
        let oldest = backup_path(&self.inner.path, self.inner.backups);
        if oldest.exists() {
            fs::remove_file(&oldest)
                .with_context(|| format!("failed to drop {}", oldest.display()))?;
        }
        for idx in (1..self.inner.backups).rev() {
            let from = backup_path(&self.inner.path, idx);
            if from.exists() {
                let to = backup_path(&self.inner.path, idx + 1);
                fs::rename(&from, &to)
                    .with_context(|| format!("failed to rotate {}", from.display()))?;
            }
        }
        let first = backup_path(&self.inner.path, 1);
        fs::rename(&self.inner.path, &first)
            .with_context(|| format!("failed to rotate {}", self.inner.path.display()))?;
        Ok(())
    }
}

/// Last `max_bytes` of a log file, decoded lossily. A cut in the middle of a
/// line is left as-is.
pub fn tail_file(path: &Path, max_bytes: u64) -> anyhow::Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let size = file.metadata()?.len();
    if size > max_bytes {
        file.seek(SeekFrom::End(-(max_bytes as i64)))?;
    }
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn backup_path(path: &Path, idx: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{idx}"));
    PathBuf::from(name)
}
