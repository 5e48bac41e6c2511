//! Submit, poll and download pipeline for Veo video generation.

pub mod auth;
pub mod backend;
pub mod config;
pub mod delivery;
pub mod download;
pub mod dryrun;
pub mod error;
pub mod gemini;
pub mod orchestrator;
pub mod poller;
pub mod resolve;
pub mod submit;

pub use auth::{redact_url, with_credential, ApiKey};
pub use backend::{DownloadedArtifact, OperationHandle, OperationStatus, VideoBackend};
pub use config::EngineConfig;
pub use delivery::{deliver_record, CopyToDirectory, DeliveryHook};
pub use dryrun::DryrunBackend;
pub use error::{BatchError, DownloadError, PollError, ResolutionError, SubmissionError};
pub use gemini::GeminiVeoBackend;
pub use orchestrator::{BatchOrchestrator, BatchProgress, BatchReport};
pub use poller::{poll_operation, PollSettings};
pub use resolve::{extract_media_uri, resolve_media_uri};
pub use submit::submit_job;
