//! Bounded retry with backoff for calls to the remote speech service.
//!
//! The service's handshake fails sporadically, so both the voice list call
//! and the synthesis handshake run through [`RetryPolicy::run`]. Which
//! failures are worth another attempt is decided by the caller.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::SpeechError;
use crate::service::ServiceError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_STEP_MS: u64 = 1000;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
    /// Wait `attempt * step_ms` after the failed attempt (0-based), so the
    /// first retry happens immediately.
    Linear { step_ms: u64 },
    Constant { delay_ms: u64 },
    Exponential {
        initial_ms: u64,
        max_ms: u64,
        multiplier: f64,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Linear {
            step_ms: DEFAULT_STEP_MS,
        }
    }
}

impl Backoff {
    /// Delay to wait after attempt `attempt` (0-based) failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ms = match self {
            Backoff::Linear { step_ms } => step_ms.saturating_mul(attempt as u64),
            Backoff::Constant { delay_ms } => *delay_ms,
            Backoff::Exponential {
                initial_ms,
                max_ms,
                multiplier,
            } => {
                let base_backoff = *initial_ms as f64 * multiplier.powi(attempt as i32);
                base_backoff.min(*max_ms as f64) as u64
            }
        };
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub backoff: Backoff,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
        }
    }
}

/// Why [`RetryPolicy::run`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error; carries the last one.
    Exhausted { attempts: u32, last: E },
    /// A non-retryable error, returned on the attempt it happened.
    Fatal(E),
}

impl From<RetryError<ServiceError>> for SpeechError {
    fn from(error: RetryError<ServiceError>) -> Self {
        match error {
            RetryError::Exhausted { attempts, last } => SpeechError::TransientService {
                attempts,
                source: last,
            },
            RetryError::Fatal(source) => SpeechError::Remote(source),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Runs `attempt_fn` until it succeeds, fails with an error that
    /// `is_retryable` rejects, or `max_attempts` attempts have been made.
    ///
    /// Waiting between attempts suspends only the calling task.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        operation: &str,
        is_retryable: P,
        mut attempt_fn: F,
    ) -> Result<T, RetryError<E>>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match attempt_fn().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation, "Request succeeded after {} retries", attempt);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !is_retryable(&error) {
                        return Err(RetryError::Fatal(error));
                    }

                    if attempt + 1 >= max_attempts {
                        warn!(
                            operation,
                            attempt = attempt + 1,
                            max_attempts,
                            "Request failed after {} attempts: {}",
                            max_attempts,
                            error
                        );
                        return Err(RetryError::Exhausted {
                            attempts: max_attempts,
                            last: error,
                        });
                    }

                    let backoff = self.backoff.delay(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "Retrying due to handshake error"
                    );

                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
