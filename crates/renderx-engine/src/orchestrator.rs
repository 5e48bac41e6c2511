use std::path::{Path, PathBuf};

use chrono::Local;
use renderx_contracts::events::{EventPayload, EventWriter};
use renderx_contracts::models::{GenerationParams, GenerationRequest};
use renderx_contracts::runs::summary::{now_utc_iso, write_summary, BatchSummary};
use renderx_contracts::session::{JobStage, PromptItem, ResultRecord, SessionState};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::ApiKey;
use crate::backend::VideoBackend;
use crate::config::SUMMARY_FILE_NAME;
use crate::delivery::{deliver_record, DeliveryHook};
use crate::error::BatchError;
use crate::poller::{poll_operation, PollSettings};
use crate::resolve::resolve_media_uri;
use crate::submit::{prompt_preview, submit_job};

/// Observer notifications, in order, for each job of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchProgress {
    JobStarted {
        index: usize,
        total: usize,
        prompt: String,
    },
    Submitted {
        index: usize,
        operation: String,
    },
    Polling {
        index: usize,
        percent: u8,
    },
    Downloading {
        index: usize,
        destination: PathBuf,
    },
    JobFinished(ResultRecord),
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: String,
    pub records: Vec<ResultRecord>,
    pub summary_path: Option<PathBuf>,
    pub delivered: usize,
}

impl BatchReport {
    pub fn ok_count(&self) -> usize {
        self.records.iter().filter(|record| record.is_ok()).count()
    }
}

/// Runs prompts one after another through submit, poll, resolve and
/// download. A failing prompt becomes an ERROR record; the batch carries on.
pub struct BatchOrchestrator<'a> {
    backend: &'a dyn VideoBackend,
    output_dir: PathBuf,
    poll: PollSettings,
    events: Option<EventWriter>,
    delivery: Option<&'a dyn DeliveryHook>,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(backend: &'a dyn VideoBackend, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            output_dir: output_dir.into(),
            poll: PollSettings::default(),
            events: None,
            delivery: None,
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_delivery(mut self, hook: &'a dyn DeliveryHook) -> Self {
        self.delivery = Some(hook);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns exactly one record per prompt, in prompt order, with `index`
    /// counting from 1. Only a missing credential or an empty queue fail
    /// the whole call.
    pub fn run_batch(
        &self,
        credential: Option<&ApiKey>,
        model: &str,
        params: &GenerationParams,
        prompts: &[PromptItem],
        observer: &mut dyn FnMut(BatchProgress),
    ) -> Result<Vec<ResultRecord>, BatchError> {
        let mut records = Vec::with_capacity(prompts.len());
        self.run_jobs(credential, model, params, prompts, observer, &mut |record| {
            records.push(record)
        })?;
        Ok(records)
    }

    /// Hands each finished record to `sink` before the next prompt starts.
    fn run_jobs(
        &self,
        credential: Option<&ApiKey>,
        model: &str,
        params: &GenerationParams,
        prompts: &[PromptItem],
        observer: &mut dyn FnMut(BatchProgress),
        sink: &mut dyn FnMut(ResultRecord),
    ) -> Result<(), BatchError> {
        let credential = match credential {
            Some(credential) if !credential.is_empty() => credential,
            _ => return Err(BatchError::MissingCredential),
        };
        if prompts.is_empty() {
            return Err(BatchError::EmptyQueue);
        }

        let total = prompts.len();
        for (offset, prompt) in prompts.iter().enumerate() {
            let index = offset + 1;
            observer(BatchProgress::JobStarted {
                index,
                total,
                prompt: prompt.text.clone(),
            });
            let record = self.run_job(credential, index, model, params, &prompt.text, observer);
            observer(BatchProgress::JobFinished(record.clone()));
            sink(record);
        }
        Ok(())
    }

    /// Runs the session's prompt queue with the session's settings and
    /// appends each record to its results as soon as the job ends. With
    /// auto-delivery on, an OK record goes to the hook right then, before the
    /// next prompt starts. Writes `summary.json` at the end.
    pub fn run_session(
        &self,
        credential: Option<&ApiKey>,
        state: &mut SessionState,
        observer: &mut dyn FnMut(BatchProgress),
    ) -> Result<BatchReport, BatchError> {
        let batch_id = Uuid::new_v4().to_string();
        let started_at = now_utc_iso();
        if credential.is_some_and(|credential| !credential.is_empty())
            && !state.prompts.is_empty()
        {
            self.emit(
                "batch_started",
                json!({
                    "batch_id": batch_id,
                    "backend": self.backend.name(),
                    "model": state.model,
                    "total": state.prompts.len(),
                    "output_dir": self.output_dir.to_string_lossy(),
                }),
            );
        }
        let hook = self.delivery.filter(|_| state.auto_deliver);
        let mut records = Vec::with_capacity(state.prompts.len());
        let mut delivered = 0;
        let results = &mut state.results;
        self.run_jobs(
            credential,
            &state.model,
            &state.params,
            state.prompts.items(),
            observer,
            &mut |record| {
                let id = record.id.clone();
                records.push(record.clone());
                results.append(record);
                if let Some(hook) = hook {
                    if deliver_record(results, &id, hook) {
                        delivered += 1;
                    }
                }
            },
        )?;

        let summary = BatchSummary::new(
            &state.session_id,
            &batch_id,
            &state.model,
            started_at,
            records.clone(),
        );
        let summary_path = self.output_dir.join(SUMMARY_FILE_NAME);
        let summary_path = match write_summary(&summary_path, &summary, None) {
            Ok(()) => Some(summary_path),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "failed to write batch summary");
                None
            }
        };
        self.emit(
            "batch_finished",
            json!({
                "batch_id": batch_id,
                "total": summary.total,
                "ok": summary.ok,
                "failed": summary.failed,
                "delivered": delivered,
            }),
        );
        tracing::info!(
            batch = %batch_id,
            ok = summary.ok,
            failed = summary.failed,
            "batch finished"
        );

        Ok(BatchReport {
            batch_id,
            records,
            summary_path,
            delivered,
        })
    }

    fn run_job(
        &self,
        credential: &ApiKey,
        index: usize,
        model: &str,
        params: &GenerationParams,
        prompt: &str,
        observer: &mut dyn FnMut(BatchProgress),
    ) -> ResultRecord {
        let request = GenerationRequest::build(model, prompt, params);
        self.emit(
            "job_started",
            json!({
                "index": index,
                "model": request.model,
                "aspect_ratio": request.aspect_ratio,
                "duration_seconds": request.effective_duration(),
                "prompt": prompt_preview(prompt),
                "warnings": request.warnings,
            }),
        );

        let handle = match submit_job(self.backend, credential, &request) {
            Ok(handle) => handle,
            Err(err) => {
                let message = err.to_string();
                return self.fail(credential, index, prompt, JobStage::Submit, None, &message);
            }
        };
        observer(BatchProgress::Submitted {
            index,
            operation: handle.to_string(),
        });
        self.emit(
            "job_submitted",
            json!({"index": index, "operation": handle.as_str()}),
        );

        let mut last_reported = None;
        let status = {
            let mut on_progress = |percent: u8| {
                observer(BatchProgress::Polling { index, percent });
                if last_reported != Some(percent) {
                    last_reported = Some(percent);
                    self.emit(
                        "job_progress",
                        json!({"index": index, "percent": percent}),
                    );
                }
            };
            poll_operation(
                self.backend,
                credential,
                &handle,
                &self.poll,
                &mut on_progress,
            )
        };
        let status = match status {
            Ok(status) => status,
            Err(err) => {
                return self.fail(
                    credential,
                    index,
                    prompt,
                    JobStage::Poll,
                    Some(handle.as_str()),
                    &err.to_string(),
                )
            }
        };

        let uri = match resolve_media_uri(&status) {
            Ok(uri) => uri,
            Err(err) => {
                return self.fail(
                    credential,
                    index,
                    prompt,
                    JobStage::Resolve,
                    Some(handle.as_str()),
                    &err.to_string(),
                )
            }
        };

        let destination = unique_destination(&self.output_dir, &output_file_name(index));
        observer(BatchProgress::Downloading {
            index,
            destination: destination.clone(),
        });
        match self.backend.download(credential, &uri, &destination) {
            Ok(artifact) => {
                tracing::info!(
                    index,
                    path = %artifact.path.display(),
                    bytes = artifact.bytes,
                    "download ok"
                );
                self.emit(
                    "job_completed",
                    json!({
                        "index": index,
                        "operation": handle.as_str(),
                        "path": artifact.path.to_string_lossy(),
                        "bytes": artifact.bytes,
                        "sha256": artifact.sha256,
                        "content_type": artifact.content_type,
                        "warnings": artifact.warnings,
                    }),
                );
                ResultRecord::ok(index, prompt, artifact.path)
                    .with_operation(handle.as_str())
                    .with_sha256(artifact.sha256)
            }
            Err(err) => self.fail(
                credential,
                index,
                prompt,
                JobStage::Download,
                Some(handle.as_str()),
                &err.to_string(),
            ),
        }
    }

    fn fail(
        &self,
        credential: &ApiKey,
        index: usize,
        prompt: &str,
        stage: JobStage,
        operation: Option<&str>,
        message: &str,
    ) -> ResultRecord {
        let info = credential.redact(message);
        tracing::error!(index, stage = stage.as_str(), error = %info, "job failed");
        self.emit(
            "job_failed",
            json!({
                "index": index,
                "stage": stage.as_str(),
                "operation": operation,
                "error": info,
            }),
        );
        let record = ResultRecord::error(index, prompt, stage, info);
        match operation {
            Some(operation) => record.with_operation(operation),
            None => record,
        }
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit(event_type, map_object(payload)) {
            tracing::warn!(event = event_type, error = %format!("{err:#}"), "event log write failed");
        }
    }
}

/// `veo_{index}_{YYYYmmdd_HHMMSS}.mp4`, local time.
pub fn output_file_name(index: usize) -> String {
    format!("veo_{}_{}.mp4", index, Local::now().format("%Y%m%d_%H%M%S"))
}

/// Adds `_2`, `_3`, ... when an earlier batch already used the same second.
fn unique_destination(output_dir: &Path, file_name: &str) -> PathBuf {
    let stem = file_name.trim_end_matches(".mp4");
    let mut candidate = output_dir.join(file_name);
    let mut attempt = 2;
    while candidate.exists() {
        candidate = output_dir.join(format!("{stem}_{attempt}.mp4"));
        attempt += 1;
    }
    candidate
}

fn map_object(value: Value) -> EventPayload {
    match value {
        Value::Object(map) => map,
        _ => EventPayload::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;

    use renderx_contracts::events::EventWriter;
    use renderx_contracts::models::{GenerationParams, GenerationRequest};
    use renderx_contracts::session::{
        JobStage, PromptItem, ResultRecord, ResultStatus, SessionState,
    };
    use serde_json::{json, Value};

    use super::{output_file_name, unique_destination, BatchOrchestrator, BatchProgress};
    use crate::auth::ApiKey;
    use crate::backend::{DownloadedArtifact, OperationHandle, OperationStatus, VideoBackend};
    use crate::delivery::DeliveryHook;
    use crate::download::stream_to_file;
    use crate::error::{BatchError, DownloadError, PollError, SubmissionError};
    use crate::poller::PollSettings;

    const KEY: &str = "sk-test-123";

    /// Behaviour is keyed on the prompt text so one batch can mix outcomes.
    struct ScriptedBackend;

    impl VideoBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn submit(
            &self,
            credential: &ApiKey,
            request: &GenerationRequest,
        ) -> Result<OperationHandle, SubmissionError> {
            if request.prompt == "submit-fail" {
                return Err(SubmissionError::Http {
                    status: 400,
                    body: format!("bad key {}", credential.expose()),
                });
            }
            Ok(OperationHandle::new(format!("op/{}", request.prompt)))
        }

        fn fetch_operation(
            &self,
            _credential: &ApiKey,
            handle: &OperationHandle,
        ) -> Result<OperationStatus, PollError> {
            let prompt = handle.as_str().trim_start_matches("op/");
            match prompt {
                "poll-fail" => Err(PollError::Http {
                    status: 500,
                    body: "backend exploded".to_string(),
                }),
                "no-uri" => Ok(OperationStatus::completed(json!({"generatedVideos": []}))),
                _ => Ok(OperationStatus::completed(json!({
                    "generatedVideos": [{"video": {"uri": format!("mem://{prompt}")}}]
                }))),
            }
        }

        fn download(
            &self,
            credential: &ApiKey,
            uri: &str,
            destination: &Path,
        ) -> Result<DownloadedArtifact, DownloadError> {
            if uri == "mem://download-fail" {
                return Err(DownloadError::Rejected {
                    status: 403,
                    message: format!("{{\"error\":\"denied for {}\"}}", credential.expose()),
                });
            }
            let mut reader = std::io::Cursor::new(uri.as_bytes().to_vec());
            let (bytes, sha256) = stream_to_file(&mut reader, destination)?;
            Ok(DownloadedArtifact {
                path: destination.to_path_buf(),
                bytes,
                sha256,
                content_type: Some("video/mp4".to_string()),
                warnings: Vec::new(),
            })
        }
    }

    fn prompts(texts: &[&str]) -> Vec<PromptItem> {
        texts.iter().map(|text| PromptItem::new(*text)).collect()
    }

    fn fast_poll() -> PollSettings {
        PollSettings {
            timeout: std::time::Duration::from_secs(5),
            interval: std::time::Duration::from_millis(1),
        }
    }

    #[test]
    fn every_prompt_yields_one_record_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let backend = ScriptedBackend;
        let orchestrator =
            BatchOrchestrator::new(&backend, temp.path()).with_poll_settings(fast_poll());
        let queue = prompts(&[
            "a cat",
            "submit-fail",
            "poll-fail",
            "no-uri",
            "download-fail",
            "a dog",
        ]);
        let mut finished = Vec::new();

        let records = orchestrator.run_batch(
            Some(&ApiKey::new(KEY)),
            "veo-2.0-generate-001",
            &GenerationParams::default(),
            &queue,
            &mut |event| {
                if let BatchProgress::JobFinished(record) = event {
                    finished.push(record.index);
                }
            },
        )?;

        assert_eq!(records.len(), 6);
        assert_eq!(
            records.iter().map(|record| record.index).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5, 6]
        );
        assert_eq!(finished, vec![1, 2, 3, 4, 5, 6]);
        let stages: Vec<Option<JobStage>> = records.iter().map(|record| record.stage).collect();
        assert_eq!(
            stages,
            vec![
                None,
                Some(JobStage::Submit),
                Some(JobStage::Poll),
                Some(JobStage::Resolve),
                Some(JobStage::Download),
                None
            ]
        );
        assert_eq!(records[3].info, "no uri in operation response");
        assert_eq!(records[0].status, ResultStatus::Ok);
        assert_eq!(records[5].status, ResultStatus::Ok);
        for record in &records {
            assert_eq!(record.prompt, queue[record.index - 1].text);
            assert!(!record.info.contains(KEY), "leaked key in {}", record.info);
        }
        assert!(records[1].info.contains("***"));
        assert!(records[4].info.contains("***"));
        let path = records[0].path.clone().unwrap_or_default();
        assert!(path.is_file());
        assert!(path.to_string_lossy().ends_with(".mp4"));
        Ok(())
    }

    #[test]
    fn missing_credential_and_empty_queue_are_fatal() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let backend = ScriptedBackend;
        let orchestrator = BatchOrchestrator::new(&backend, temp.path());
        let params = GenerationParams::default();

        let missing = orchestrator.run_batch(None, "v2", &params, &prompts(&["x"]), &mut |_| {});
        assert!(matches!(missing, Err(BatchError::MissingCredential)));
        let blank = orchestrator.run_batch(
            Some(&ApiKey::new("   ")),
            "v2",
            &params,
            &prompts(&["x"]),
            &mut |_| {},
        );
        assert!(matches!(blank, Err(BatchError::MissingCredential)));
        let empty = orchestrator.run_batch(Some(&ApiKey::new(KEY)), "v2", &params, &[], &mut |_| {});
        assert!(matches!(empty, Err(BatchError::EmptyQueue)));
        Ok(())
    }

    #[test]
    fn session_run_appends_results_and_logs_without_the_key() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let backend = ScriptedBackend;
        let events = EventWriter::new(temp.path().join("events.jsonl"), "session-test");
        let orchestrator = BatchOrchestrator::new(&backend, temp.path())
            .with_poll_settings(fast_poll())
            .with_events(events);
        let mut state = SessionState::new();
        state.prompts.add_lines("a cat\nsubmit-fail");
        let credential = ApiKey::new(KEY);

        let first = orchestrator.run_session(Some(&credential), &mut state, &mut |_| {})?;
        let second = orchestrator.run_session(Some(&credential), &mut state, &mut |_| {})?;

        assert_eq!(first.ok_count(), 1);
        assert_eq!(second.records.len(), 2);
        assert_eq!(state.results.len(), 4);
        assert_eq!(first.delivered, 0);
        let summary_path = second.summary_path.clone().unwrap_or_default();
        let summary: Value = serde_json::from_str(&std::fs::read_to_string(summary_path)?)?;
        assert_eq!(summary["batch_id"], Value::String(second.batch_id.clone()));
        assert_eq!(summary["total"], json!(2));

        let log = std::fs::read_to_string(temp.path().join("events.jsonl"))?;
        assert!(!log.contains(KEY));
        let types: Vec<String> = log
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|event| event["type"].as_str().map(str::to_string))
            .collect();
        assert_eq!(types.first().map(String::as_str), Some("batch_started"));
        assert!(types.iter().any(|kind| kind == "job_completed"));
        assert!(types.iter().any(|kind| kind == "job_failed"));
        assert_eq!(types.last().map(String::as_str), Some("batch_finished"));
        Ok(())
    }

    struct OrderLog(Rc<RefCell<Vec<String>>>);

    impl DeliveryHook for OrderLog {
        fn name(&self) -> &str {
            "order-log"
        }

        fn deliver(&self, record: &ResultRecord) -> anyhow::Result<()> {
            self.0.borrow_mut().push(format!("deliver {}", record.index));
            Ok(())
        }
    }

    #[test]
    fn auto_delivery_fires_as_each_job_succeeds() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let backend = ScriptedBackend;
        let order = Rc::new(RefCell::new(Vec::new()));
        let hook = OrderLog(Rc::clone(&order));
        let orchestrator = BatchOrchestrator::new(&backend, temp.path())
            .with_poll_settings(fast_poll())
            .with_delivery(&hook);
        let mut state = SessionState::new();
        state.prompts.add_lines("a cat\nsubmit-fail\na dog");
        state.set_auto_deliver(true);
        let credential = ApiKey::new(KEY);

        let report = orchestrator.run_session(Some(&credential), &mut state, &mut |event| {
            if let BatchProgress::JobFinished(record) = event {
                order.borrow_mut().push(format!("finished {}", record.index));
            }
        })?;

        assert_eq!(
            *order.borrow(),
            vec!["finished 1", "deliver 1", "finished 2", "finished 3", "deliver 3"]
        );
        assert_eq!(report.delivered, 2);
        let flags: Vec<bool> = state
            .results
            .records()
            .iter()
            .map(|record| record.auto_delivered)
            .collect();
        assert_eq!(flags, vec![true, false, true]);

        state.set_auto_deliver(false);
        order.borrow_mut().clear();
        let quiet = orchestrator.run_session(Some(&credential), &mut state, &mut |_| {})?;
        assert_eq!(quiet.delivered, 0);
        assert!(order.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn existing_file_gets_a_numbered_sibling() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let name = "veo_1_20250101_120000.mp4";
        let first = unique_destination(temp.path(), name);
        assert_eq!(first, temp.path().join(name));
        std::fs::write(&first, b"x")?;
        assert_eq!(
            unique_destination(temp.path(), name),
            temp.path().join("veo_1_20250101_120000_2.mp4")
        );
        Ok(())
    }

    #[test]
    fn file_names_follow_index_and_timestamp() {
        let name = output_file_name(3);
        assert!(name.starts_with("veo_3_"));
        assert!(name.ends_with(".mp4"));
        assert_eq!(name.len(), "veo_3_20250101_120000.mp4".len());
    }
}
