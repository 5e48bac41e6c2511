use std::thread;
use std::time::{Duration, Instant};

use crate::auth::ApiKey;
use crate::backend::{OperationHandle, OperationStatus, VideoBackend};
use crate::error::PollError;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(900);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POLL_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Share of the timeout budget already spent, capped at 99 so that 100 is
/// only ever reported for a finished operation.
pub fn progress_percent(elapsed: Duration, timeout: Duration) -> u8 {
    if timeout.is_zero() {
        return 99;
    }
    let ratio = elapsed.as_secs_f64() / timeout.as_secs_f64();
    (ratio * 100.0).floor().clamp(0.0, 99.0) as u8
}

/// Fetches `handle` until it reports `done`.
///
/// One fetch per iteration; any fetch failure ends the loop immediately.
/// `on_progress` sees a non-decreasing sequence of values in `0..=99`,
/// followed by `100` only when the operation finished.
pub fn poll_operation(
    backend: &dyn VideoBackend,
    credential: &ApiKey,
    handle: &OperationHandle,
    settings: &PollSettings,
    on_progress: &mut dyn FnMut(u8),
) -> Result<OperationStatus, PollError> {
    let started = Instant::now();
    let mut last_progress = 0u8;
    loop {
        let status = backend.fetch_operation(credential, handle)?;
        if status.done {
            tracing::info!(operation = %handle, "poll done");
            on_progress(100);
            return Ok(status);
        }

        let elapsed = started.elapsed();
        if elapsed > settings.timeout {
            tracing::error!(
                operation = %handle,
                waited_secs = elapsed.as_secs(),
                "poll timeout"
            );
            return Err(PollError::Timeout {
                waited_secs: elapsed.as_secs(),
            });
        }
        last_progress = last_progress.max(progress_percent(elapsed, settings.timeout));
        tracing::debug!(
            operation = %handle,
            elapsed_secs = elapsed.as_secs(),
            progress = last_progress,
            "poll running"
        );
        on_progress(last_progress);
        thread::sleep(settings.interval);
    }
}
