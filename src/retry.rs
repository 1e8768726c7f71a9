//! Exponential backoff around remote calls.
//!
//! [`RetryExecutor`] is the only place in the crate that retries anything.
//! Each remote call is wrapped individually, so a retry never replays
//! mutations that already succeeded.

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::{Absence, ErrorClass, classify_for};
use crate::error::RemoteError;

/// Backoff schedule for remote calls.
///
/// The n-th retry waits `initial_interval * multiplier^n`, capped at
/// `max_interval`. No retry is started once it would end past
/// `max_elapsed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub initial_interval_ms: u64,
    pub multiplier: f64,
    pub max_interval_ms: u64,
    pub max_elapsed_ms: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        BackoffSettings {
            initial_interval_ms: 500,
            multiplier: 1.5,
            max_interval_ms: 60_000,
            max_elapsed_ms: 30_000,
        }
    }
}

impl BackoffSettings {
    pub fn max_elapsed(&self) -> Duration {
        Duration::from_millis(self.max_elapsed_ms)
    }

    /// Delay before retry number `retry` (0-indexed).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(64) as i32);
        let delay = (self.initial_interval_ms as f64 * factor).min(self.max_interval_ms as f64);
        Duration::from_millis(delay as u64)
    }
}

/// Terminal outcome of a retried remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFailure {
    pub operation: String,
    pub error: RemoteError,
    pub class: ErrorClass,
    pub attempts: u32,
}

impl RemoteFailure {
    pub fn is_not_found(&self) -> bool {
        self.class == ErrorClass::NotFoundTolerable
    }
}

/// A classifier that applies the remote code table with the given intent.
pub fn by_intent(absence: Absence) -> impl Fn(&RemoteError) -> ErrorClass {
    move |err: &RemoteError| classify_for(&err.code, absence)
}

#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    settings: BackoffSettings,
}

impl RetryExecutor {
    pub fn new(settings: BackoffSettings) -> Self {
        RetryExecutor { settings }
    }

    pub fn settings(&self) -> &BackoffSettings {
        &self.settings
    }

    /// Run `op` until it succeeds, fails with anything but a retryable error,
    /// or the elapsed-time ceiling is reached.
    ///
    /// Blocks the calling thread while backing off.
    pub fn execute<T, F, C>(
        &self,
        operation: &str,
        classify: C,
        mut op: F,
    ) -> Result<T, RemoteFailure>
    where
        F: FnMut() -> Result<T, RemoteError>,
        C: Fn(&RemoteError) -> ErrorClass,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let error = match op() {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(event = "Retry", phase = "Recovered", operation, attempts);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let class = classify(&error);
            if class != ErrorClass::Retryable {
                debug!(
                    event = "Retry",
                    phase = "Stop",
                    operation,
                    attempts,
                    code = error.code.as_str(),
                    class = class.as_ref()
                );
                return Err(RemoteFailure {
                    operation: operation.to_string(),
                    error,
                    class,
                    attempts,
                });
            }

            let delay = self.settings.delay_for(attempts - 1);
            if started.elapsed() + delay > self.settings.max_elapsed() {
                warn!(
                    event = "Retry",
                    phase = "Exhausted",
                    operation,
                    attempts,
                    code = error.code.as_str(),
                    elapsed_ms = started.elapsed().as_millis() as u64
                );
                return Err(RemoteFailure {
                    operation: operation.to_string(),
                    error,
                    class,
                    attempts,
                });
            }

            debug!(
                event = "Retry",
                phase = "Backoff",
                operation,
                attempts,
                code = error.code.as_str(),
                delay_ms = delay.as_millis() as u64
            );
            thread::sleep(delay);
        }
    }
}
