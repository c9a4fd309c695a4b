//! Ledger configuration.
//!
//! Every setting has a default and may be overridden through a `LEDGER_*`
//! environment variable:
//!
//! | variable                          | default |
//! |-----------------------------------|---------|
//! | `LEDGER_CURRENCY`                 | `INR`   |
//! | `LEDGER_ACCOUNT_PREFIX`           | `ACC`   |
//! | `LEDGER_ACCOUNT_WIDTH`            | `10`    |
//! | `LEDGER_ALLOCATION_ATTEMPTS`      | `32`    |
//! | `LEDGER_RETRY_MAX_ATTEMPTS`       | `5`     |
//! | `LEDGER_RETRY_INITIAL_BACKOFF_MS` | `50`    |
//! | `LEDGER_RETRY_MAX_BACKOFF_MS`     | `800`   |
//! | `LEDGER_OPERATION_TIMEOUT_MS`     | `5000`  |

use std::str::FromStr;
use std::time::Duration;

use crate::domain::Currency;
use crate::retry::RetryPolicy;

/// Widest account number whose numeric part still fits a `u64`.
const MAX_ACCOUNT_WIDTH: usize = 19;

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub currency: Currency,
    pub account_number_prefix: String,
    pub account_number_width: usize,
    pub allocation_attempts: u32,
    pub retry: RetryPolicy,
    pub operation_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            currency: Currency::default(),
            account_number_prefix: "ACC".to_string(),
            account_number_width: 10,
            allocation_attempts: 32,
            retry: RetryPolicy::default(),
            operation_timeout: Duration::from_millis(5_000),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; invalid values fall
    /// back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let width = parse_or(&lookup, "LEDGER_ACCOUNT_WIDTH", defaults.account_number_width);
        let account_number_width = if (1..=MAX_ACCOUNT_WIDTH).contains(&width) {
            width
        } else {
            tracing::warn!(
                width,
                max = MAX_ACCOUNT_WIDTH,
                "LEDGER_ACCOUNT_WIDTH out of range; using default"
            );
            defaults.account_number_width
        };

        let retry = RetryPolicy {
            max_attempts: parse_or(
                &lookup,
                "LEDGER_RETRY_MAX_ATTEMPTS",
                defaults.retry.max_attempts,
            ),
            initial_backoff: Duration::from_millis(parse_or(
                &lookup,
                "LEDGER_RETRY_INITIAL_BACKOFF_MS",
                defaults.retry.initial_backoff.as_millis() as u64,
            )),
            max_backoff: Duration::from_millis(parse_or(
                &lookup,
                "LEDGER_RETRY_MAX_BACKOFF_MS",
                defaults.retry.max_backoff.as_millis() as u64,
            )),
        };

        Self {
            currency: parse_or(&lookup, "LEDGER_CURRENCY", defaults.currency),
            account_number_prefix: lookup("LEDGER_ACCOUNT_PREFIX")
                .unwrap_or(defaults.account_number_prefix),
            account_number_width,
            allocation_attempts: parse_or(
                &lookup,
                "LEDGER_ALLOCATION_ATTEMPTS",
                defaults.allocation_attempts,
            ),
            retry,
            operation_timeout: Duration::from_millis(parse_or(
                &lookup,
                "LEDGER_OPERATION_TIMEOUT_MS",
                defaults.operation_timeout.as_millis() as u64,
            )),
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "invalid configuration value; using default");
                default
            }
        },
    }
}
