use std::collections::BTreeMap;
use std::sync::Arc;

use futures::Stream;

use crate::domain::{
    Account, AccountNumber, AccountStatus, Error, LedgerCommand, Money, StoreError,
    TransactionRecord, UserId,
};

pub trait CommandStream {
    type CmdStream: Stream<Item = Result<LedgerCommand, Error>> + Send + Unpin + 'static;
    fn stream(&mut self) -> Self::CmdStream;
}

pub trait DeadLetterQueue {
    fn report(&self, error: &Error);
}

/// A value together with the store version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub expected_version: u64,
    pub balance: Money,
}

/// Balance compare-and-set updates and record appends that must become
/// visible together or not at all.
///
/// Updates are keyed by account number, so a store walking them visits
/// accounts in ascending order.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    updates: BTreeMap<AccountNumber, BalanceUpdate>,
    records: Vec<TransactionRecord>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(mut self, account: &Versioned<Account>, balance: Money) -> Self {
        self.updates.insert(
            account.value.account_number.clone(),
            BalanceUpdate {
                expected_version: account.version,
                balance,
            },
        );
        self
    }

    pub fn append(mut self, record: TransactionRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn updates(&self) -> impl Iterator<Item = (&AccountNumber, &BalanceUpdate)> {
        self.updates.iter()
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn account_count(&self) -> usize {
        self.updates.len()
    }

    pub fn into_parts(self) -> (BTreeMap<AccountNumber, BalanceUpdate>, Vec<TransactionRecord>) {
        (self.updates, self.records)
    }
}

/// Durable account state keyed by account number.
pub trait AccountStore: Send + Sync {
    fn account(&self, number: &AccountNumber) -> Result<Option<Versioned<Account>>, StoreError>;

    fn account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    fn contains_account(&self, number: &AccountNumber) -> Result<bool, StoreError>;

    /// Whether either the username or the owner is already bound to an account.
    fn identity_taken(&self, username: &str, owner: &UserId) -> Result<bool, StoreError>;

    /// Inserts a new account, enforcing uniqueness of number, username and owner.
    fn insert_account(&self, account: Account) -> Result<(), StoreError>;

    fn update_status(&self, number: &AccountNumber, status: AccountStatus)
    -> Result<(), StoreError>;
}

/// Append-only log of completed records.
pub trait TransactionLog: Send + Sync {
    /// All records for the account, newest first.
    fn records_for(&self, number: &AccountNumber) -> Result<Vec<TransactionRecord>, StoreError>;
}

pub trait LedgerStore: AccountStore + TransactionLog {
    /// Applies every update and append in `unit` atomically. Fails with
    /// `StoreError::Conflict` if any account moved past its expected version.
    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError>;

    /// Whether a single unit may touch more than one account.
    fn supports_multi_key(&self) -> bool {
        true
    }
}

impl<S> AccountStore for Arc<S>
where
    S: AccountStore + ?Sized,
{
    fn account(&self, number: &AccountNumber) -> Result<Option<Versioned<Account>>, StoreError> {
        (**self).account(number)
    }

    fn account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        (**self).account_by_username(username)
    }

    fn contains_account(&self, number: &AccountNumber) -> Result<bool, StoreError> {
        (**self).contains_account(number)
    }

    fn identity_taken(&self, username: &str, owner: &UserId) -> Result<bool, StoreError> {
        (**self).identity_taken(username, owner)
    }

    fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        (**self).insert_account(account)
    }

    fn update_status(
        &self,
        number: &AccountNumber,
        status: AccountStatus,
    ) -> Result<(), StoreError> {
        (**self).update_status(number, status)
    }
}

impl<S> TransactionLog for Arc<S>
where
    S: TransactionLog + ?Sized,
{
    fn records_for(&self, number: &AccountNumber) -> Result<Vec<TransactionRecord>, StoreError> {
        (**self).records_for(number)
    }
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        (**self).commit(unit)
    }

    fn supports_multi_key(&self) -> bool {
        (**self).supports_multi_key()
    }
}
