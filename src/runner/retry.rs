//! Bounded retries with a fixed delay between attempts.

use super::error::ExecutionError;
use super::Task;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// Settled result of one task after all attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The task produced a value. Keyed runs carry `(key, value)` here.
    Success(T),
    /// Every attempt failed.
    Absent,
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Outcome::Success(v) => Some(v),
            Outcome::Absent => None,
        }
    }
}

/// Runs a task up to `retries + 1` times, sleeping `retry_delay` between a failure and the
/// next attempt. Failures are logged, never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, retry_delay: Duration) -> Self {
        Self {
            retries,
            retry_delay,
        }
    }

    /// Total attempts, initial one included.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Invoke `task` (submitted at position `index`) until it succeeds or attempts run out.
    ///
    /// Blocks the calling thread for at most `retries * retry_delay` in backoff sleeps, plus
    /// whatever the task itself takes.
    pub fn invoke<T>(&self, index: usize, task: &Task<T>) -> Outcome<T> {
        let max_attempts = self.max_attempts();
        for attempt in 1..=max_attempts {
            match run_attempt(task) {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(task = index, attempt, "task succeeded after retry");
                    }
                    return Outcome::Success(value);
                }
                Err(e) => {
                    tracing::warn!(
                        task = index,
                        attempt,
                        max_attempts,
                        error = %e,
                        "task attempt failed"
                    );
                    if attempt < max_attempts && !self.retry_delay.is_zero() {
                        std::thread::sleep(self.retry_delay);
                    }
                }
            }
        }
        Outcome::Absent
    }
}

/// One attempt; a panic inside the task counts as a failed attempt.
fn run_attempt<T>(task: &Task<T>) -> Result<T, ExecutionError> {
    match panic::catch_unwind(AssertUnwindSafe(|| task())) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(ExecutionError::Panicked(message))
        }
    }
}
