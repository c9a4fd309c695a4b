#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use custodial_ledger::domain::{
    Account, AccountNumber, AccountStatus, AccountStore, Currency, LedgerStore, Money, NewAccount,
    Principal, StoreError, TransactionLog, TransactionRecord, UnitOfWork, UserId, Versioned,
};
use custodial_ledger::{InMemoryLedgerStore, LedgerEngine, RetryPolicy};

/// Wraps the in-memory store and injects failures into `commit`.
pub struct FaultyStore {
    pub inner: InMemoryLedgerStore,
    failing_commits: AtomicU32,
    failing_reads: AtomicU32,
    blocked: Mutex<Option<AccountNumber>>,
    healthy_commits_left: Mutex<Option<u32>>,
    interfere: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: InMemoryLedgerStore) -> Self {
        Self {
            inner,
            failing_commits: AtomicU32::new(0),
            failing_reads: AtomicU32::new(0),
            blocked: Mutex::new(None),
            healthy_commits_left: Mutex::new(None),
            interfere: AtomicBool::new(false),
        }
    }

    /// The next `n` commits fail as unavailable.
    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// The next `n` account reads fail as unavailable.
    pub fn fail_next_reads(&self, n: u32) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    /// Every commit touching `account` fails as unavailable.
    pub fn block_account(&self, account: &AccountNumber) {
        *self.blocked.lock().unwrap() = Some(account.clone());
    }

    /// After `n` more successful commits, every commit fails.
    pub fn outage_after(&self, n: u32) {
        *self.healthy_commits_left.lock().unwrap() = Some(n);
    }

    /// Before the next commit, another writer bumps every touched account.
    pub fn interfere_once(&self) {
        self.interfere.store(true, Ordering::SeqCst);
    }
}

impl AccountStore for FaultyStore {
    fn account(&self, number: &AccountNumber) -> Result<Option<Versioned<Account>>, StoreError> {
        if self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Unavailable("read failed".to_string()));
        }
        self.inner.account(number)
    }

    fn account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        self.inner.account_by_username(username)
    }

    fn contains_account(&self, number: &AccountNumber) -> Result<bool, StoreError> {
        self.inner.contains_account(number)
    }

    fn identity_taken(&self, username: &str, owner: &UserId) -> Result<bool, StoreError> {
        self.inner.identity_taken(username, owner)
    }

    fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        self.inner.insert_account(account)
    }

    fn update_status(
        &self,
        number: &AccountNumber,
        status: AccountStatus,
    ) -> Result<(), StoreError> {
        self.inner.update_status(number, status)
    }
}

impl TransactionLog for FaultyStore {
    fn records_for(&self, number: &AccountNumber) -> Result<Vec<TransactionRecord>, StoreError> {
        self.inner.records_for(number)
    }
}

impl LedgerStore for FaultyStore {
    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        if self.interfere.swap(false, Ordering::SeqCst) {
            for (number, _) in unit.updates() {
                if let Some(current) = self.inner.account(number)? {
                    self.inner.update_status(number, current.value.status)?;
                }
            }
        }

        if self
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }

        if let Some(blocked) = self.blocked.lock().unwrap().as_ref() {
            if unit.updates().any(|(number, _)| number == blocked) {
                return Err(StoreError::Unavailable(format!("{blocked} unreachable")));
            }
        }

        {
            let mut left = self.healthy_commits_left.lock().unwrap();
            match left.as_mut() {
                Some(0) => return Err(StoreError::Unavailable("outage".to_string())),
                Some(n) => *n -= 1,
                None => {}
            }
        }

        self.inner.commit(unit)
    }

    fn supports_multi_key(&self) -> bool {
        self.inner.supports_multi_key()
    }
}

pub fn fast_engine<S: LedgerStore>(store: S) -> Arc<LedgerEngine<S>> {
    Arc::new(LedgerEngine::with_policy(
        store,
        RetryPolicy::immediate(3),
        Duration::from_secs(5),
    ))
}

/// Registers `username` under a fixed account number, bypassing provisioning.
pub fn open_account<S: AccountStore>(
    store: &S,
    number: &str,
    username: &str,
) -> (Principal, AccountNumber) {
    let owner = UserId::new();
    let number = AccountNumber::from(number);
    store
        .insert_account(Account::open(
            number.clone(),
            NewAccount::new(owner, username),
            Currency::default(),
        ))
        .unwrap();
    (Principal::customer(owner, username), number)
}

pub fn balance_of<S: AccountStore>(store: &S, number: &AccountNumber) -> Money {
    store.account(number).unwrap().unwrap().value.balance
}

pub fn money(s: &str) -> Money {
    s.parse().unwrap()
}

/// Balance rebuilt from the account's records, oldest first.
pub fn replayed<S: TransactionLog>(store: &S, number: &AccountNumber) -> Money {
    let mut records = store.records_for(number).unwrap();
    records.reverse();
    custodial_ledger::domain::replay_balance(&records).unwrap()
}
