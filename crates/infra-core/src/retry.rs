//! Retry with exponential backoff until an acceptance predicate holds
//!
//! Used to ride out read-after-write lag: a `get` issued right after a
//! `put` may return stale data, so the caller supplies a predicate such as
//! "observed field equals written value" and the executor polls until the
//! predicate holds or the budget runs out.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Backoff curve and budget.
///
/// The delay after attempt `n` (zero-based) is
/// `initial_delay * multiplier^n`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
    /// Wall-clock budget across all attempts; `None` relies on `max_attempts` alone
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            max_attempts: 10,
            max_elapsed: Some(Duration::from_secs(60)),
        }
    }
}

/// Serializable form of [`RetryPolicy`] used in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    /// Zero disables the wall-clock budget
    pub max_elapsed_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 250,
            multiplier: 2.0,
            max_delay_ms: 5_000,
            max_attempts: 10,
            max_elapsed_ms: 60_000,
        }
    }
}

impl TryFrom<RetryConfig> for RetryPolicy {
    type Error = Error;

    fn try_from(config: RetryConfig) -> Result<Self> {
        if !config.multiplier.is_finite() || config.multiplier < 1.0 {
            return Err(Error::Config {
                message: format!(
                    "retry.multiplier must be a finite number >= 1.0, got {}",
                    config.multiplier
                ),
            });
        }
        Ok(Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts.max(1),
            max_elapsed: (config.max_elapsed_ms > 0)
                .then(|| Duration::from_millis(config.max_elapsed_ms)),
        })
    }
}

/// Decides whether a successful result is final
pub trait Acceptance<T> {
    fn accept(&self, value: &T) -> bool;
}

impl<T, F> Acceptance<T> for F
where
    F: Fn(&T) -> bool,
{
    fn accept(&self, value: &T) -> bool {
        self(value)
    }
}

/// Accept the first successful result
pub fn accept_any<T>() -> impl Acceptance<T> {
    |_: &T| true
}

/// Why the executor gave up
#[derive(Debug)]
pub enum RetryFailure<T> {
    /// The budget ran out and the last attempt failed
    Exhausted { attempts: u32, error: Error },
    /// The budget ran out and the last result was never accepted
    Rejected { attempts: u32, last: T },
    /// An attempt failed with an error that waiting cannot fix
    Aborted { attempts: u32, error: Error },
}

impl<T> RetryFailure<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::Rejected { attempts, .. }
            | Self::Aborted { attempts, .. } => *attempts,
        }
    }

    pub fn is_timeout(&self) -> bool {
        !matches!(self, Self::Aborted { .. })
    }
}

enum Attempt<T> {
    Failed(Error),
    Rejected(T),
}

/// Reusable retry strategy
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `operation` until `acceptance` holds for its result.
    ///
    /// Failed attempts and rejected results are both retried after the
    /// scheduled delay. Permanent errors (see [`Error::is_permanent`]) abort
    /// immediately.
    pub async fn execute<T, F, Fut, A>(
        &self,
        mut operation: F,
        acceptance: A,
    ) -> std::result::Result<T, RetryFailure<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        A: Acceptance<T>,
    {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.policy.initial_delay)
            .with_randomization_factor(0.0)
            .with_multiplier(self.policy.multiplier)
            .with_max_interval(self.policy.max_delay)
            .with_max_elapsed_time(self.policy.max_elapsed)
            .build();

        let max_attempts = self.policy.max_attempts.max(1);
        let acceptance = &acceptance;
        let mut attempts = 0u32;

        let outcome = backoff::future::retry_notify(
            backoff,
            || {
                attempts += 1;
                let attempt = attempts;
                let fut = operation();
                async move {
                    let failure = match fut.await {
                        Ok(value) if acceptance.accept(&value) => return Ok(value),
                        Ok(value) => Attempt::Rejected(value),
                        Err(error) if error.is_permanent() => {
                            return Err(backoff::Error::permanent(Attempt::Failed(error)));
                        }
                        Err(error) => Attempt::Failed(error),
                    };
                    if attempt >= max_attempts {
                        Err(backoff::Error::permanent(failure))
                    } else {
                        Err(backoff::Error::transient(failure))
                    }
                }
            },
            |failure: Attempt<T>, delay: Duration| match failure {
                Attempt::Failed(error) => {
                    tracing::debug!(?delay, %error, "Attempt failed, retrying")
                }
                Attempt::Rejected(_) => {
                    tracing::debug!(?delay, "Result not yet accepted, retrying")
                }
            },
        )
        .await;

        match outcome {
            Ok(value) => {
                if attempts > 1 {
                    tracing::debug!(attempts, "Operation accepted after retries");
                }
                Ok(value)
            }
            Err(Attempt::Failed(error)) if error.is_permanent() => {
                Err(RetryFailure::Aborted { attempts, error })
            }
            Err(Attempt::Failed(error)) => {
                tracing::warn!(attempts, %error, "Retry budget exhausted");
                Err(RetryFailure::Exhausted { attempts, error })
            }
            Err(Attempt::Rejected(last)) => {
                tracing::warn!(attempts, "Retry budget exhausted without an accepted result");
                Err(RetryFailure::Rejected { attempts, last })
            }
        }
    }
}
