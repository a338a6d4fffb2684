//! Status polling with an attempt ceiling.
//!
//! The first fetch runs immediately and every later one waits the current interval,
//! so a poll never issues more than `max_attempts` fetches. Waits are raced against
//! the poller's cancellation token.

use crate::api::{Api, ApiError, Id, PaymentStatus, TaskStatus};
use crate::config::{Backoff, PollConfig, PollErrorPolicy};
use rand_core::{OsRng, RngCore};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Completed(T),
    /// Every attempt ran without reaching the terminal state.
    Exhausted { attempts: u32 },
    Cancelled,
}

impl<T> PollOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            PollOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Poller {
    config: PollConfig,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Ties the poll to an owner's lifetime; cancelling `cancel` stops it.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait before fetch number `attempt` (1-based). The first fetch never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let base = self.config.interval_ms;
        let millis = match self.config.backoff {
            Backoff::Fixed => base,
            Backoff::Exponential {
                factor,
                max_interval_ms,
                jitter,
            } => {
                let grown = base as f64 * factor.powi(attempt.saturating_sub(2) as i32);
                let mut millis = grown.min(max_interval_ms as f64) as u64;
                if jitter {
                    millis += random_below(millis / 2 + 1);
                }
                millis.min(max_interval_ms)
            }
        };
        Duration::from_millis(millis)
    }

    /// Calls `fetch` until `is_done` accepts a value, the attempts run out or the
    /// poll is cancelled.
    ///
    /// Fetch errors either end the poll (`Abort`) or count as a spent attempt
    /// (`Continue`).
    pub async fn run<T, E, F, Fut, D>(&self, mut fetch: F, is_done: D) -> Result<PollOutcome<T>, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        D: Fn(&T) -> bool,
        E: Display,
    {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let delay = self.delay_before(attempt);
            if self.cancel.is_cancelled() {
                return Ok(PollOutcome::Cancelled);
            }
            if !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(PollOutcome::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match fetch(attempt).await {
                Ok(value) if is_done(&value) => {
                    info!(attempt, "Poll reached terminal state");
                    return Ok(PollOutcome::Completed(value));
                }
                Ok(_) => debug!(attempt, max_attempts, "Not done yet"),
                Err(e) => match self.config.on_error {
                    PollErrorPolicy::Abort => {
                        warn!(attempt, error = %e, "Poll aborted on fetch error");
                        return Err(e);
                    }
                    PollErrorPolicy::Continue => warn!(attempt, error = %e, "Poll fetch failed"),
                },
            }
        }

        info!(attempts = max_attempts, "Poll exhausted");
        Ok(PollOutcome::Exhausted {
            attempts: max_attempts,
        })
    }
}

fn random_below(bound: u64) -> u64 {
    if bound == 0 {
        return 0;
    }
    OsRng.next_u64() % bound
}

/// Polls a generation task until it is completed or failed.
pub async fn poll_task(api: &Api, poller: &Poller, task_id: &Id) -> Result<PollOutcome<TaskStatus>, ApiError> {
    poll_task_with_progress(api, poller, task_id, |_| {}).await
}

/// [`poll_task`] that hands every fetched status to `on_status`, e.g. to show
/// `completion_percentage`.
pub async fn poll_task_with_progress<F>(
    api: &Api,
    poller: &Poller,
    task_id: &Id,
    on_status: F,
) -> Result<PollOutcome<TaskStatus>, ApiError>
where
    F: Fn(&TaskStatus),
{
    let on_status = &on_status;
    poller
        .run(
            |attempt| async move {
                let status = api.task_status(task_id).await?;
                debug!(
                    task = %task_id,
                    attempt,
                    status = %status.status,
                    progress = ?status.completion_percentage,
                    "Task status"
                );
                on_status(&status);
                Ok::<_, ApiError>(status)
            },
            |status| status.is_completed() || status.is_failed(),
        )
        .await
}

/// Polls an order until the backend reports it paid.
pub async fn poll_payment(api: &Api, poller: &Poller, order_info: &str) -> Result<PollOutcome<PaymentStatus>, ApiError> {
    poller
        .run(|_| api.check_order(order_info), |status| status.paid)
        .await
}
