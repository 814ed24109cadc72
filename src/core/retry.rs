//! Bounded retry of transient storage failures

use crate::types::BankError;
use log::warn;
use std::thread;
use std::time::Duration;

/// How many times a unit of work is attempted and how long to wait in between
///
/// Only errors for which [`BankError::is_transient`] holds are retried. The
/// wait grows linearly: `backoff`, `2 * backoff`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Run `attempt` until it succeeds, fails permanently, or attempts run out
    pub fn run<T>(
        &self,
        operation: &str,
        mut attempt: impl FnMut() -> Result<T, BankError>,
    ) -> Result<T, BankError> {
        let max_attempts = self.max_attempts.max(1);
        let mut tries = 1;

        loop {
            match attempt() {
                Err(e) if e.is_transient() && tries < max_attempts => {
                    warn!(
                        "{} failed on attempt {}/{}: {}; retrying",
                        operation, tries, max_attempts, e
                    );
                    thread::sleep(self.backoff * tries);
                    tries += 1;
                }
                result => return result,
            }
        }
    }
}
