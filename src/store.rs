use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::domain::{
    Account, AccountNumber, AccountStatus, AccountStore, LedgerStore, StoreError, TransactionId,
    TransactionLog, TransactionRecord, UniqueKey, UnitOfWork, UserId, Versioned,
};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountNumber, Versioned<Account>>,
    usernames: HashMap<String, AccountNumber>,
    owners: HashMap<UserId, AccountNumber>,
    // per-account records in commit order
    ledger: HashMap<AccountNumber, Vec<TransactionRecord>>,
    transaction_ids: HashSet<TransactionId>,
}

/// In-memory ledger store with versioned compare-and-set commits.
///
/// Intended for tests and the command-line driver.
#[derive(Debug)]
pub struct InMemoryLedgerStore {
    tables: Mutex<Tables>,
    multi_key: bool,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            multi_key: true,
        }
    }

    /// A store that only commits units touching a single account, the way a
    /// key-value backend without multi-key transactions behaves.
    pub fn single_key() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            multi_key: false,
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl AccountStore for InMemoryLedgerStore {
    fn account(&self, number: &AccountNumber) -> Result<Option<Versioned<Account>>, StoreError> {
        Ok(self.tables()?.accounts.get(number).cloned())
    }

    fn account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .usernames
            .get(username)
            .and_then(|number| tables.accounts.get(number))
            .map(|a| a.value.clone()))
    }

    fn contains_account(&self, number: &AccountNumber) -> Result<bool, StoreError> {
        Ok(self.tables()?.accounts.contains_key(number))
    }

    fn identity_taken(&self, username: &str, owner: &UserId) -> Result<bool, StoreError> {
        let tables = self.tables()?;
        Ok(tables.usernames.contains_key(username) || tables.owners.contains_key(owner))
    }

    fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        let mut tables = self.tables()?;

        if tables.accounts.contains_key(&account.account_number) {
            return Err(StoreError::DuplicateKey {
                key: UniqueKey::AccountNumber,
                value: account.account_number.to_string(),
            });
        }
        if tables.usernames.contains_key(&account.username) {
            return Err(StoreError::DuplicateKey {
                key: UniqueKey::Username,
                value: account.username,
            });
        }
        if tables.owners.contains_key(&account.owner_id) {
            return Err(StoreError::DuplicateKey {
                key: UniqueKey::Owner,
                value: account.owner_id.to_string(),
            });
        }

        let number = account.account_number.clone();
        tables
            .usernames
            .insert(account.username.clone(), number.clone());
        tables.owners.insert(account.owner_id, number.clone());
        tables.accounts.insert(
            number,
            Versioned {
                value: account,
                version: 1,
            },
        );
        Ok(())
    }

    fn update_status(
        &self,
        number: &AccountNumber,
        status: AccountStatus,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        match tables.accounts.entry(number.clone()) {
            Entry::Occupied(mut e) => {
                let account = e.get_mut();
                account.value.status = status;
                account.version += 1;
                Ok(())
            }
            Entry::Vacant(_) => Err(StoreError::Missing(number.to_string())),
        }
    }
}

impl TransactionLog for InMemoryLedgerStore {
    fn records_for(&self, number: &AccountNumber) -> Result<Vec<TransactionRecord>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .ledger
            .get(number)
            .map(|records| records.iter().rev().cloned().collect())
            .unwrap_or_default())
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        if !self.multi_key && unit.account_count() > 1 {
            return Err(StoreError::Constraint(
                "store does not support multi-account units".to_string(),
            ));
        }

        let mut tables = self.tables()?;

        // Validate everything before touching anything.
        for (number, update) in unit.updates() {
            let current = tables
                .accounts
                .get(number)
                .ok_or_else(|| StoreError::Missing(number.to_string()))?;
            if current.version != update.expected_version {
                return Err(StoreError::Conflict(format!(
                    "{number}: expected version {}, found {}",
                    update.expected_version, current.version
                )));
            }
            if update.balance.is_negative() {
                return Err(StoreError::Constraint(format!(
                    "{number}: balance may not go negative"
                )));
            }
        }
        for record in unit.records() {
            if !tables.accounts.contains_key(&record.account_number) {
                return Err(StoreError::Missing(record.account_number.to_string()));
            }
            if tables.transaction_ids.contains(&record.transaction_id) {
                return Err(StoreError::Constraint(format!(
                    "transaction {} already recorded",
                    record.transaction_id
                )));
            }
        }

        let (updates, records) = unit.into_parts();
        for (number, update) in updates {
            if let Some(account) = tables.accounts.get_mut(&number) {
                account.value.balance = update.balance;
                account.version += 1;
            }
        }
        for record in records {
            tables.transaction_ids.insert(record.transaction_id);
            tables
                .ledger
                .entry(record.account_number.clone())
                .or_default()
                .push(record);
        }

        Ok(())
    }

    fn supports_multi_key(&self) -> bool {
        self.multi_key
    }
}
