use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde_json::{json, Value};

use super::summary::now_utc_iso;
use crate::session::ResultStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub files: Vec<PathBuf>,
    pub manifest_path: PathBuf,
}

/// Copies every exportable artifact into `dest_dir` next to a
/// `manifest.json` describing them.
pub fn export_results(store: &ResultStore, dest_dir: &Path) -> anyhow::Result<ExportReport> {
    let exportable = store.exportable();
    if exportable.is_empty() {
        bail!("no successful results with files on disk to export");
    }
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("failed to create {}", dest_dir.display()))?;

    let mut files = Vec::new();
    let mut rows = Vec::new();
    for record in exportable {
        let Some(source) = record.path.as_ref() else {
            continue;
        };
        let file_name = source
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| format!("veo_{}.mp4", record.index).into());
        let target = dest_dir.join(file_name);
        if target != *source {
            fs::copy(source, &target).with_context(|| {
                format!("failed to copy {} to {}", source.display(), target.display())
            })?;
        }
        rows.push(json!({
            "id": record.id,
            "index": record.index,
            "prompt": record.prompt,
            "file": target.file_name().map(|name| name.to_string_lossy().to_string()),
            "sha256": record.sha256,
            "created_at": record.created_at,
        }));
        files.push(target);
    }

    let manifest_path = dest_dir.join("manifest.json");
    let manifest = json!({
        "exported_at": now_utc_iso(),
        "count": files.len(),
        "items": Value::Array(rows),
    });
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("failed to write {}", manifest_path.display()))?;

    Ok(ExportReport {
        files,
        manifest_path,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::export_results;
    use crate::session::{JobStage, ResultRecord, ResultStore};

    #[test]
    fn export_copies_only_existing_ok_artifacts() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let source = temp.path().join("out").join("veo_1_20250801_101010.mp4");
        std::fs::create_dir_all(source.parent().unwrap_or(temp.path()))?;
        std::fs::write(&source, b"video")?;

        let store = ResultStore::from_records(vec![
            ResultRecord::ok(1, "a cat", source.clone()).with_sha256("abc"),
            ResultRecord::ok(2, "gone", temp.path().join("missing.mp4")),
            ResultRecord::error(3, "a dog", JobStage::Download, "HTTP 500"),
        ]);

        let dest = temp.path().join("export");
        let report = export_results(&store, &dest)?;
        assert_eq!(report.files, vec![dest.join("veo_1_20250801_101010.mp4")]);
        assert_eq!(std::fs::read(&report.files[0])?, b"video");

        let manifest: Value = serde_json::from_str(&std::fs::read_to_string(report.manifest_path)?)?;
        assert_eq!(manifest["count"], Value::from(1));
        assert_eq!(manifest["items"][0]["prompt"], Value::from("a cat"));
        assert_eq!(manifest["items"][0]["sha256"], Value::from("abc"));
        Ok(())
    }

    #[test]
    fn export_fails_without_exportable_results() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = ResultStore::from_records(vec![ResultRecord::error(
            1,
            "a",
            JobStage::Poll,
            "timeout",
        )]);
        assert!(export_results(&store, temp.path()).is_err());
        Ok(())
    }
}
