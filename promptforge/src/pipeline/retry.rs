//! Retry policy for calls to the generation service.
//!
//! Only transient failures (rate limits, quota exhaustion) are retried.
//! Everything else propagates on the first occurrence.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::errors::AnalysisError;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^retry
    #[default]
    Exponential,
    /// delay = base * (retry + 1)
    Linear,
    /// delay = base (constant)
    Constant,
}

/// Jitter strategy to spread out retries from concurrent clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum invocations, including the first.
    pub max_attempts: usize,
    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    pub jitter_strategy: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 2000,
            max_delay_ms: 60_000,
            backoff_strategy: BackoffStrategy::Exponential,
            jitter_strategy: JitterStrategy::None,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }
}

/// State tracking for one retried operation.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Invocations made so far.
    pub attempt: usize,
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the delay before retry number `retry` (0-indexed).
    #[must_use]
    pub fn calculate_delay(retry: usize, config: &RetryConfig) -> Duration {
        let base = config.base_delay_ms;
        let max = config.max_delay_ms;
        let exponent = u32::try_from(retry).unwrap_or(u32::MAX);

        let delay = match config.backoff_strategy {
            BackoffStrategy::Exponential => {
                base.saturating_mul(2u64.saturating_pow(exponent)).min(max)
            }
            BackoffStrategy::Linear => base
                .saturating_mul(u64::from(exponent).saturating_add(1))
                .min(max),
            BackoffStrategy::Constant => base.min(max),
        };

        let jittered = match config.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }

    /// Records a failed invocation and decides what to do next.
    pub fn record_failure(&mut self, error: &AnalysisError, config: &RetryConfig) -> RetryDecision {
        self.attempt += 1;

        if !error.is_transient() {
            return RetryDecision::NotRetryable;
        }
        if self.attempt >= config.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(Self::calculate_delay(self.attempt - 1, config))
    }

    /// Invocations still allowed after the current one.
    #[must_use]
    pub fn remaining(&self, config: &RetryConfig) -> usize {
        config.max_attempts.saturating_sub(self.attempt)
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more retries, give up.
    GiveUp,
    /// Don't retry, the error is not retryable.
    NotRetryable,
}

/// Reported to the retry observer before each backoff sleep.
#[derive(Debug, Clone)]
pub struct RetryNotice {
    /// The invocation that just failed (1-indexed).
    pub attempt: usize,
    /// Invocations still allowed.
    pub attempts_remaining: usize,
    /// How long the policy will wait before the next invocation.
    pub delay: Duration,
    /// The transient failure that triggered the retry.
    pub error: AnalysisError,
}

impl RetryNotice {
    /// Text suitable for showing as a stage's interim output.
    #[must_use]
    pub fn interim_message(&self) -> String {
        format!(
            "Rate limited. Retrying in {:.1}s ({} attempts left)...",
            self.delay.as_secs_f64(),
            self.attempts_remaining
        )
    }
}

/// Wraps a unit of work with bounded backoff for transient failures.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy from configuration.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the policy configuration.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation` until it succeeds, fails non-transiently, or uses
    /// up `max_attempts` invocations.
    ///
    /// `on_retry` is called synchronously before every backoff sleep.
    pub async fn execute<T, F, Fut, O>(
        &self,
        mut operation: F,
        mut on_retry: O,
    ) -> Result<T, AnalysisError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AnalysisError>>,
        O: FnMut(&RetryNotice),
    {
        let mut state = RetryState::new();

        loop {
            let error = match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            match state.record_failure(&error, &self.config) {
                RetryDecision::Retry(delay) => {
                    let notice = RetryNotice {
                        attempt: state.attempt,
                        attempts_remaining: state.remaining(&self.config),
                        delay,
                        error,
                    };
                    tracing::warn!(
                        attempt = notice.attempt,
                        attempts_remaining = notice.attempts_remaining,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %notice.error,
                        "Transient failure, retrying"
                    );
                    on_retry(&notice);
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    tracing::error!(attempts = state.attempt, error = %error, "Retries exhausted");
                    return Err(AnalysisError::RetriesExhausted {
                        attempts: state.attempt,
                        last: Box::new(error),
                    });
                }
                RetryDecision::NotRetryable => return Err(error),
            }
        }
    }
}
