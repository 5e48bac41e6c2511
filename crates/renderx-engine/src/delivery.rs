use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use renderx_contracts::session::{ResultRecord, ResultStore};

/// Side effect fired once for each OK record while auto-delivery is on.
pub trait DeliveryHook {
    fn name(&self) -> &str;
    fn deliver(&self, record: &ResultRecord) -> Result<()>;
}

/// Copies each delivered artifact into a fixed directory.
pub struct CopyToDirectory {
    target: PathBuf,
}

impl CopyToDirectory {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl DeliveryHook for CopyToDirectory {
    fn name(&self) -> &str {
        "copy"
    }

    fn deliver(&self, record: &ResultRecord) -> Result<()> {
        let Some(source) = record.path.as_ref() else {
            bail!("record {} has no artifact", record.id);
        };
        let Some(file_name) = source.file_name() else {
            bail!("artifact path {} has no file name", source.display());
        };
        fs::create_dir_all(&self.target)
            .with_context(|| format!("failed to create {}", self.target.display()))?;
        let destination = self.target.join(file_name);
        fs::copy(source, &destination).with_context(|| {
            format!(
                "failed to copy {} to {}",
                source.display(),
                destination.display()
            )
        })?;
        Ok(())
    }
}

/// Fires `hook` for the OK record `id` if it was never handed to a hook
/// before. The record is marked first, so a failed attempt is only logged and
/// never repeated. Returns whether an attempt was made.
pub fn deliver_record(store: &mut ResultStore, id: &str, hook: &dyn DeliveryHook) -> bool {
    if !store.get(id).is_some_and(ResultRecord::is_ok) || !store.mark_delivered(id) {
        return false;
    }
    let Some(record) = store.get(id) else {
        return false;
    };
    match hook.deliver(record) {
        Ok(()) => tracing::info!(hook = hook.name(), record = %id, "delivered"),
        Err(err) => {
            tracing::warn!(hook = hook.name(), record = %id, error = %format!("{err:#}"), "delivery failed")
        }
    }
    true
}
