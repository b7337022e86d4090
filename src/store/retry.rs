//! Bounded retries around store calls

use log::warn;
use std::thread;
use std::time::Duration;

use crate::error::StoreError;

/// Default number of attempts per store call
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Default pause before the first retry; doubles each time
pub const DEFAULT_BACKOFF_MS: u64 = 100;

/// Retry policy for store calls
///
/// Only transient failures are retried; schema and data errors return at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails permanently or attempts run out
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Result<T, StoreError>,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.backoff;
        let mut attempt = 1;

        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!("{} failed (attempt {}/{}): {}", what, attempt, attempts, e);
                    if !delay.is_zero() {
                        thread::sleep(delay);
                        delay *= 2;
                    }
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
