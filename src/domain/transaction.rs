use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AccountNumber, Currency, Money};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
}

impl TransactionKind {
    /// Whether this kind adds to the owning account's balance.
    pub fn is_credit(&self) -> bool {
        match self {
            TransactionKind::Deposit | TransactionKind::TransferIn => true,
            TransactionKind::Withdrawal | TransactionKind::TransferOut => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Completed,
    Failed,
}

/// Immutable entry in the transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    pub account_number: AccountNumber,
    pub counterparty: Option<AccountNumber>,
    pub kind: TransactionKind,
    pub amount: Money,
    pub balance_after: Money,
    pub currency: Currency,
    pub status: RecordStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn completed(
        kind: TransactionKind,
        account_number: AccountNumber,
        counterparty: Option<AccountNumber>,
        amount: Money,
        balance_after: Money,
        currency: Currency,
        description: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: TransactionId::new(),
            account_number,
            counterparty,
            kind,
            amount,
            balance_after,
            currency,
            status: RecordStatus::Completed,
            description: description.into(),
            created_at: Utc::now(),
        }
    }

    /// Effect of this record on its account's balance.
    pub fn apply_to(&self, balance: Money) -> Option<Money> {
        if self.status != RecordStatus::Completed {
            return Some(balance);
        }
        if self.kind.is_credit() {
            balance.checked_add(self.amount)
        } else {
            balance.checked_sub(self.amount)
        }
    }
}

impl core::fmt::Display for TransactionRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.counterparty {
            Some(counterparty) => write!(
                f,
                "{:?},account={},counterparty={},amount={},balance_after={}",
                self.kind, self.account_number, counterparty, self.amount, self.balance_after
            ),
            None => write!(
                f,
                "{:?},account={},amount={},balance_after={}",
                self.kind, self.account_number, self.amount, self.balance_after
            ),
        }
    }
}

/// Both halves of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub debit: TransactionRecord,
    pub credit: TransactionRecord,
}

/// Rebuilds a balance from records given oldest first.
pub fn replay_balance<'a, I>(records: I) -> Option<Money>
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    records
        .into_iter()
        .try_fold(Money::ZERO, |balance, record| record.apply_to(balance))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: TransactionKind, minor: i64) -> TransactionRecord {
        TransactionRecord::completed(
            kind,
            AccountNumber::from("ACC0000000001"),
            None,
            Money::from_minor(minor),
            Money::ZERO,
            Currency::default(),
            "test",
        )
    }

    #[test]
    fn replay_applies_credits_and_debits() {
        let records = vec![
            record(TransactionKind::Deposit, 10_000),
            record(TransactionKind::Withdrawal, 4_000),
            record(TransactionKind::TransferOut, 2_500),
            record(TransactionKind::TransferIn, 500),
        ];
        assert_eq!(replay_balance(&records), Some(Money::from_minor(4_000)));
    }

    #[test]
    fn replay_of_nothing_is_zero() {
        let records: Vec<TransactionRecord> = Vec::new();
        assert_eq!(replay_balance(&records), Some(Money::ZERO));
    }
}
