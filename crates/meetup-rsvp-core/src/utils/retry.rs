//! Exponential backoff with jitter for transient API failures.
//!
//! `RetryExecutor` wraps a unit of async work and re-runs it while the error
//! it produces is classified as retryable. Classification lives on the error
//! type (see [`Retryable`]) so the retry decision can be tested without any
//! HTTP machinery.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{error, warn};

// ============================================================================
// Constants
// ============================================================================

/// Jitter is drawn uniformly from +/- this fraction of the computed delay.
const JITTER_FRACTION: f64 = 0.1;

/// Errors that know whether they are worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Server-supplied wait hint (e.g. a `Retry-After` header).
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Backoff configuration. Pure data, no mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::api()
    }
}

impl RetryConfig {
    /// Standard settings for GraphQL calls: 3 attempts, 1s base, 60s cap.
    pub fn api() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
            backoff_factor: 1.0,
        }
    }

    /// More attempts with shorter, gentler growth for raw network calls.
    pub fn network() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            exponential_base: 1.5,
            jitter: true,
            backoff_factor: 1.0,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the retry that follows `attempt` (0-based), without jitter.
    ///
    /// A rate-limit hint replaces the exponential term but never goes below
    /// `base_delay`; the result is always capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let raw = match retry_after {
            Some(hint) => hint.as_secs_f64().max(base_secs),
            None => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                base_secs * self.exponential_base.powi(exponent)
            }
        };
        let scaled = raw * self.backoff_factor;
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// `delay_for` plus +/-10% uniform jitter when enabled.
    pub fn jittered_delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = self.delay_for(attempt, retry_after);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let secs = delay.as_secs_f64();
        let spread = secs * JITTER_FRACTION;
        let jittered = secs + rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

impl fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max_attempts={} base_delay={:?} max_delay={:?} exponential_base={} jitter={}",
            self.max_attempts, self.base_delay, self.max_delay, self.exponential_base, self.jitter
        )
    }
}

#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// The operation failed with an error that must not be retried.
    #[error(transparent)]
    Fatal(E),

    #[error("All {attempts} retry attempts failed. Last error: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// Runs async operations under a [`RetryConfig`].
///
/// Stateless apart from the config, so a single executor can be shared by
/// every call site of a client.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds, fails fatally, or attempts run out.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        E: Retryable + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(RetryError::Fatal(err));
            }

            if attempt + 1 >= max_attempts {
                error!(attempts = max_attempts, error = %err, "All retry attempts failed");
                return Err(RetryError::Exhausted {
                    attempts: max_attempts,
                    last: err,
                });
            }

            let delay = self.config.jittered_delay_for(attempt, err.retry_after());
            warn!(
                attempt = attempt + 1,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
