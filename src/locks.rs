use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::AccountNumber;

/// Per-account mutual exclusion for read-modify-write sequences.
///
/// Locks are always taken in ascending account-number order, so two
/// operations touching the same pair of accounts cannot deadlock whichever
/// side each calls the source.
#[derive(Debug, Default)]
pub struct AccountLocks {
    slots: Mutex<HashMap<AccountNumber, Arc<AsyncMutex<()>>>>,
}

/// Holds every lock taken by one [`AccountLocks::acquire`] call until dropped.
///
/// On drop, slots no other task holds or waits on are evicted, so the map
/// only tracks accounts with work in flight.
#[derive(Debug)]
pub struct AccountGuard<'a> {
    locks: &'a AccountLocks,
    accounts: Vec<AccountNumber>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        self.guards.clear();
        let mut slots = self.locks.slots();
        for number in &self.accounts {
            // Slots are only cloned under the map lock, so a count of one
            // means nobody else can reach this mutex.
            if slots.get(number).is_some_and(|slot| Arc::strong_count(slot) == 1) {
                slots.remove(number);
            }
        }
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire<'a, 'n, I>(&'a self, accounts: I) -> AccountGuard<'a>
    where
        I: IntoIterator<Item = &'n AccountNumber>,
    {
        let ordered: BTreeSet<&AccountNumber> = accounts.into_iter().collect();
        let mut guard = AccountGuard {
            locks: self,
            accounts: ordered.iter().map(|number| (*number).clone()).collect(),
            guards: Vec::with_capacity(ordered.len()),
        };
        for number in ordered {
            let slot = self.slot(number);
            guard.guards.push(slot.lock_owned().await);
        }
        guard
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<AccountNumber, Arc<AsyncMutex<()>>>> {
        // The map only hands out slots, so a poisoned guard is still usable.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, number: &AccountNumber) -> Arc<AsyncMutex<()>> {
        self.slots().entry(number.clone()).or_default().clone()
    }
}
