use std::time::Duration;

use crate::domain::LedgerError;

/// Bounded exponential backoff for retryable ledger failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(800),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts. Handy for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before the attempt following `attempt` (zero based): 50, 100, 200, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Runs `op` until it succeeds, fails terminally, or attempts run out.
    /// The last retryable error is surfaced once attempts are exhausted.
    pub async fn run<T, F>(&self, operation: &'static str, mut op: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Result<T, LedgerError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying ledger operation"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
