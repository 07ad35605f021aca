//! Waiting for an uploaded sketch to finish analysis
//!
//! The backend analyses uploads asynchronously. [`wait_for_result`] sleeps,
//! fetches the score and, under [`CompletionPolicy::Poll`], keeps polling
//! with exponential backoff until the result is ready or the time budget is
//! spent. Every sleep and fetch races the caller's cancellation token.

use std::time::Duration;

use skc_common::api::AnalysisResult;
use skc_common::config::{AnalysisConfig, CompletionMode};
use skc_common::time::millis_to_duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{ScoreStatus, SketchApi};
use crate::error::{ApiError, ApiResult};

/// Poll schedule
#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub max_interval: Duration,
    pub backoff: f64,
    /// Total budget, counted from the start of the initial delay
    pub timeout: Duration,
}

impl PollSettings {
    fn next_interval(&self, current: Duration) -> Duration {
        let factor = if self.backoff.is_finite() {
            self.backoff.max(1.0)
        } else {
            1.0
        };
        Duration::try_from_secs_f64(current.as_secs_f64() * factor)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// How to wait for analysis completion
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionPolicy {
    /// Wait once, fetch once; a pending answer is a timeout
    FixedDelay(Duration),
    /// Wait, then poll until ready or the budget runs out
    Poll(PollSettings),
}

impl CompletionPolicy {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let initial_delay = millis_to_duration(config.initial_delay_ms);
        match config.mode {
            CompletionMode::Fixed => CompletionPolicy::FixedDelay(initial_delay),
            CompletionMode::Poll => {
                let interval = millis_to_duration(config.poll_interval_ms);
                CompletionPolicy::Poll(PollSettings {
                    initial_delay,
                    interval,
                    max_interval: millis_to_duration(config.max_poll_interval_ms).max(interval),
                    backoff: config.backoff_factor,
                    timeout: millis_to_duration(config.timeout_ms),
                })
            }
        }
    }

    pub fn initial_delay(&self) -> Duration {
        match self {
            CompletionPolicy::FixedDelay(delay) => *delay,
            CompletionPolicy::Poll(settings) => settings.initial_delay,
        }
    }
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

/// Wait for `task_id` to finish and return its result
///
/// `on_pending(attempt, progress)` runs after every fetch that finds the task
/// still in progress.
pub async fn wait_for_result<F>(
    policy: &CompletionPolicy,
    api: &dyn SketchApi,
    task_id: &str,
    cancel: &CancellationToken,
    mut on_pending: F,
) -> ApiResult<AnalysisResult>
where
    F: FnMut(u32, Option<f64>) + Send,
{
    let started = Instant::now();

    match policy {
        CompletionPolicy::FixedDelay(delay) => {
            sleep_or_cancel(*delay, cancel).await?;
            match fetch_or_cancel(api, task_id, cancel).await? {
                ScoreStatus::Ready(result) => Ok(result),
                ScoreStatus::Pending { progress } => {
                    on_pending(1, progress);
                    Err(ApiError::Timeout(*delay))
                }
            }
        }
        CompletionPolicy::Poll(settings) => {
            sleep_or_cancel(settings.initial_delay, cancel).await?;

            let mut interval = settings.interval;
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match fetch_or_cancel(api, task_id, cancel).await? {
                    ScoreStatus::Ready(result) => return Ok(result),
                    ScoreStatus::Pending { progress } => {
                        on_pending(attempt, progress);

                        let elapsed = started.elapsed();
                        if elapsed >= settings.timeout {
                            return Err(ApiError::Timeout(settings.timeout));
                        }
                        let nap = interval.min(settings.timeout - elapsed);
                        debug!(task_id = %task_id, attempt, ?nap, "Analysis pending, polling again");
                        sleep_or_cancel(nap, cancel).await?;
                        interval = settings.next_interval(interval);
                    }
                }
            }
        }
    }
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> ApiResult<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

async fn fetch_or_cancel(
    api: &dyn SketchApi,
    task_id: &str,
    cancel: &CancellationToken,
) -> ApiResult<ScoreStatus> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        status = api.get_score(task_id) => status,
    }
}
