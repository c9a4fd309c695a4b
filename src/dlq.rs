use crate::domain::{DeadLetterQueue, Error};

/// Reports rejected commands as warn-level log events.
#[derive(Default, Debug)]
pub struct LogDLQ {}

impl DeadLetterQueue for LogDLQ {
    fn report(&self, error: &Error) {
        match error {
            Error::Ledger(e) => tracing::warn!(
                category = ?e.category(),
                retryable = e.is_retryable(),
                "DLQ Report - Error: {}",
                e
            ),
            other => tracing::warn!("DLQ Report - Error: {}", other),
        }
    }
}
