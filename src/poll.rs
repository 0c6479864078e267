use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a poll loop stopped without its check producing a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("timed out after {}s", elapsed.as_secs())]
    TimedOut { elapsed: Duration },

    #[error("cancelled")]
    Cancelled,
}

/// Fixed-interval polling bounded by an overall deadline.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Poll `check` until it yields `Some`, the deadline passes, or `cancel` fires.
///
/// The check always runs at least once, even with a zero timeout, so callers
/// can use a zero deadline as a "check once" query. Sleeps between checks
/// are raced against the cancellation token so an interrupt ends the wait
/// without running out the interval.
pub async fn poll_until<F, Fut, T>(
    config: &PollConfig,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let started = Instant::now();

    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }
        if let Some(value) = check().await {
            return Ok(value);
        }
        let elapsed = started.elapsed();
        if elapsed >= config.timeout {
            return Err(PollError::TimedOut { elapsed });
        }
        let nap = config.interval.min(config.timeout - elapsed);
        tokio::select! {
            _ = tokio::time::sleep(nap) => {}
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
        }
    }
}

/// Sleep that returns early (with `false`) when `cancel` fires.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}
