use crate::domain::{AccountNumber, AccountStatus, Money};

/// Top-level error for the command-line driver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("Ingestion failed with: {0}")]
    Ingestion(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Failure of a ledger operation. Every variant is reported verbatim; only
/// the retryable ones are ever retried by the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be greater than zero, got {0}")]
    InvalidAmount(Money),

    #[error("account {0} not found")]
    AccountNotFound(AccountNumber),

    #[error("caller does not own account {0}")]
    NotOwner(AccountNumber),

    #[error("account {account} is {status}, not ACTIVE")]
    AccountNotActive {
        account: AccountNumber,
        status: AccountStatus,
    },

    #[error("insufficient funds in {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountNumber,
        balance: Money,
        requested: Money,
    },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("identity already registered: {0}")]
    DuplicateIdentity(String),

    #[error("concurrent write conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    #[error("transfer from {account} failed ({cause}) and its reversal could not be applied")]
    CompensationFailed {
        account: AccountNumber,
        cause: Box<LedgerError>,
    },
}

/// Stable status category a routing layer maps each failure onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Forbidden,
    Validation,
    Conflict,
    Transient,
    /// Ledger left needing manual repair; never safe to resubmit.
    Internal,
}

impl LedgerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::AccountNotFound(_) => ErrorCategory::NotFound,
            LedgerError::NotOwner(_) => ErrorCategory::Forbidden,
            LedgerError::InvalidAmount(_)
            | LedgerError::AccountNotActive { .. }
            | LedgerError::InsufficientFunds { .. }
            | LedgerError::InvalidOperation(_) => ErrorCategory::Validation,
            LedgerError::DuplicateIdentity(_) | LedgerError::Conflict(_) => {
                ErrorCategory::Conflict
            }
            LedgerError::StoreUnavailable(_) | LedgerError::Timeout(_) => {
                ErrorCategory::Transient
            }
            LedgerError::CompensationFailed { .. } => ErrorCategory::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Conflict(_) | LedgerError::StoreUnavailable(_) | LedgerError::Timeout(_)
        )
    }
}

/// Uniqueness constraints enforced by the account store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    AccountNumber,
    Username,
    Owner,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("duplicate {key:?}: {value}")]
    DuplicateKey { key: UniqueKey, value: String },

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("record not found: {0}")]
    Missing(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => LedgerError::Conflict(msg),
            StoreError::Unavailable(msg) => LedgerError::StoreUnavailable(msg),
            StoreError::DuplicateKey { key, value } => {
                LedgerError::DuplicateIdentity(format!("{key:?} {value}"))
            }
            StoreError::Missing(account) => LedgerError::AccountNotFound(AccountNumber::new(account)),
            StoreError::Constraint(msg) => LedgerError::InvalidOperation(msg),
        }
    }
}
