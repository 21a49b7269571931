//! Bounded retries with jittered exponential backoff.
//!
//! Ledger writes use optimistic concurrency: a write that loses a race (a stale wallet version, or SQLite reporting
//! that the database is busy) is simply tried again from the top. Gateway calls use the same policy for transient
//! network failures.
use std::{fmt::Display, future::Future, time::Duration};

use log::*;
use rand::Rng;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(10);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(250);

/// Errors that can tell a transient failure apart from a permanent one.
pub trait Retryable: Sized {
    fn is_retryable(&self) -> bool;

    /// Converts the last transient failure into the error reported once all attempts are used up.
    fn exhausted(self, _attempts: u32) -> Self {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, base_delay: DEFAULT_BASE_DELAY, max_delay: DEFAULT_MAX_DELAY }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay, max_delay }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// The pause after the given (1-based) failed attempt. Doubles each time up to `max_delay`, then a random
    /// jitter picks a point in the upper half of that window so that competing writers drift apart.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let window = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let window_ms = window.as_millis() as u64;
        if window_ms == 0 {
            return window;
        }
        let jittered = rand::thread_rng().gen_range(window_ms / 2..=window_ms);
        Duration::from_millis(jittered)
    }

    /// Runs `op` until it succeeds, fails permanently, or `max_attempts` is reached. `op` receives the attempt number.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    debug!("🔁️ {label}: attempt {attempt} failed ({e}). Retrying in {}ms", delay.as_millis());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(e) if e.is_retryable() => {
                    warn!("🔁️ {label}: giving up after {attempt} attempts. Last error: {e}");
                    return Err(e.exhausted(attempt));
                },
                Err(e) => return Err(e),
            }
        }
    }
}

/// True if SQLite refused the statement because another connection holds a conflicting lock.
///
/// The SQLite driver can also end a busy statement as if it had produced no rows. Every `fetch_one` in this crate
/// targets a row that must exist (an aggregate, a `RETURNING` clause or a row written earlier in the same
/// transaction), so `RowNotFound` is treated as the same interruption.
pub fn is_storage_contention(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            // SQLITE_BUSY, SQLITE_LOCKED and their extended codes
            matches!(db.code().as_deref(), Some("5" | "6" | "261" | "262" | "517"))
                || db.message().contains("database is locked")
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::RowNotFound => true,
        _ => false,
    }
}
