use rand::Rng;

use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountNumber, AccountStore, Currency, LedgerError, NewAccount, StoreError, UniqueKey,
};
use crate::retry::RetryPolicy;

/// Produces candidate account numbers; uniqueness is settled by the store.
pub trait AccountNumberSource: Send + Sync {
    fn candidate(&self) -> AccountNumber;
}

/// Uniformly random `<prefix><zero-padded digits>` candidates.
#[derive(Debug, Clone)]
pub struct RandomAccountNumbers {
    prefix: String,
    width: usize,
}

impl RandomAccountNumbers {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width,
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            config.account_number_prefix.clone(),
            config.account_number_width,
        )
    }
}

impl AccountNumberSource for RandomAccountNumbers {
    fn candidate(&self) -> AccountNumber {
        let upper = 10u64.saturating_pow(self.width as u32);
        let number = rand::thread_rng().gen_range(0..upper);
        AccountNumber::format(&self.prefix, number, self.width)
    }
}

/// Registers new accounts with a freshly allocated account number.
#[derive(Debug)]
pub struct AccountProvisioner<S, G = RandomAccountNumbers>
where
    S: AccountStore,
    G: AccountNumberSource,
{
    store: S,
    numbers: G,
    currency: Currency,
    attempts: u32,
    retry: RetryPolicy,
}

impl<S> AccountProvisioner<S, RandomAccountNumbers>
where
    S: AccountStore,
{
    pub fn new(store: S, config: &LedgerConfig) -> Self {
        Self::with_source(store, RandomAccountNumbers::from_config(config), config)
    }
}

impl<S, G> AccountProvisioner<S, G>
where
    S: AccountStore,
    G: AccountNumberSource,
{
    pub fn with_source(store: S, numbers: G, config: &LedgerConfig) -> Self {
        Self {
            store,
            numbers,
            currency: config.currency.clone(),
            attempts: config.allocation_attempts.max(1),
            retry: config.retry,
        }
    }

    /// First candidate not already present in the store.
    ///
    /// This check alone does not reserve the number; [`create_account`]
    /// relies on the store's uniqueness constraint for that.
    ///
    /// [`create_account`]: AccountProvisioner::create_account
    pub async fn allocate_account_number(&self) -> Result<AccountNumber, LedgerError> {
        for attempt in 0..self.attempts {
            let candidate = self.numbers.candidate();
            let taken = self
                .retry
                .run("allocate_account_number", || {
                    self.store
                        .contains_account(&candidate)
                        .map_err(LedgerError::from)
                })
                .await?;
            if !taken {
                return Ok(candidate);
            }
            tracing::debug!(candidate = %candidate, attempt, "account number already taken");
        }
        Err(LedgerError::Conflict(format!(
            "no free account number after {} attempts",
            self.attempts
        )))
    }

    /// Creates an active, zero-balance account. No transaction record is
    /// written; opening an account is not a monetary event.
    pub async fn create_account(&self, profile: NewAccount) -> Result<Account, LedgerError> {
        let taken = self
            .retry
            .run("create_account", || {
                self.store
                    .identity_taken(&profile.username, &profile.owner_id)
                    .map_err(LedgerError::from)
            })
            .await?;
        if taken {
            return Err(LedgerError::DuplicateIdentity(profile.username));
        }

        for _ in 0..self.attempts {
            let number = self.allocate_account_number().await?;
            let account = Account::open(number, profile.clone(), self.currency.clone());

            let rejected = self
                .retry
                .run("create_account", || {
                    match self.store.insert_account(account.clone()) {
                        Ok(()) => Ok(None),
                        Err(StoreError::DuplicateKey { key, .. }) => Ok(Some(key)),
                        Err(e) => Err(LedgerError::from(e)),
                    }
                })
                .await?;

            match rejected {
                None => {
                    tracing::info!(
                        account = %account.account_number,
                        username = %account.username,
                        currency = %account.currency,
                        "account created"
                    );
                    return Ok(account);
                }
                Some(UniqueKey::AccountNumber) => {
                    tracing::debug!(
                        candidate = %account.account_number,
                        "account number claimed concurrently; allocating another"
                    );
                }
                Some(UniqueKey::Username) | Some(UniqueKey::Owner) => {
                    return Err(LedgerError::DuplicateIdentity(profile.username));
                }
            }
        }

        Err(LedgerError::Conflict(format!(
            "could not claim an account number after {} attempts",
            self.attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::domain::{
        AccountStatus, LedgerStore, Money, TransactionLog, UserId, Versioned,
    };
    use crate::store::InMemoryLedgerStore;

    struct Scripted(Mutex<VecDeque<&'static str>>);

    impl Scripted {
        fn new(numbers: &[&'static str]) -> Self {
            Self(Mutex::new(numbers.iter().copied().collect()))
        }
    }

    impl AccountNumberSource for Scripted {
        fn candidate(&self) -> AccountNumber {
            let mut numbers = self.0.lock().unwrap();
            let next = numbers.pop_front().unwrap_or("ACC0000000001");
            AccountNumber::from(next)
        }
    }

    /// Store whose existence checks always miss, as if another registration
    /// claimed the number or identity between check and insert.
    struct RacyStore(InMemoryLedgerStore);

    impl AccountStore for RacyStore {
        fn account(
            &self,
            number: &AccountNumber,
        ) -> Result<Option<Versioned<Account>>, StoreError> {
            self.0.account(number)
        }

        fn account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
            self.0.account_by_username(username)
        }

        fn contains_account(&self, _number: &AccountNumber) -> Result<bool, StoreError> {
            Ok(false)
        }

        fn identity_taken(&self, _username: &str, _owner: &UserId) -> Result<bool, StoreError> {
            Ok(false)
        }

        fn insert_account(&self, account: Account) -> Result<(), StoreError> {
            self.0.insert_account(account)
        }

        fn update_status(
            &self,
            number: &AccountNumber,
            status: AccountStatus,
        ) -> Result<(), StoreError> {
            self.0.update_status(number, status)
        }
    }

    fn config() -> LedgerConfig {
        LedgerConfig {
            allocation_attempts: 3,
            retry: RetryPolicy::immediate(2),
            ..LedgerConfig::default()
        }
    }

    #[tokio::test]
    async fn allocation_skips_taken_numbers() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let first = AccountProvisioner::with_source(
            Arc::clone(&store),
            Scripted::new(&["ACC0000000001"]),
            &config(),
        );
        first
            .create_account(NewAccount::new(UserId::new(), "alice"))
            .await
            .unwrap();

        let second = AccountProvisioner::with_source(
            Arc::clone(&store),
            Scripted::new(&["ACC0000000001", "ACC0000000001", "ACC0000000002"]),
            &config(),
        );
        let number = second.allocate_account_number().await.unwrap();
        assert_eq!(number.as_str(), "ACC0000000002");
    }

    #[tokio::test]
    async fn allocation_gives_up_after_bounded_attempts() {
        let store = Arc::new(InMemoryLedgerStore::new());
        AccountProvisioner::with_source(
            Arc::clone(&store),
            Scripted::new(&["ACC0000000001"]),
            &config(),
        )
        .create_account(NewAccount::new(UserId::new(), "alice"))
        .await
        .unwrap();

        let exhausted =
            AccountProvisioner::with_source(Arc::clone(&store), Scripted::new(&[]), &config());
        assert!(matches!(
            exhausted.allocate_account_number().await,
            Err(LedgerError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn insert_collision_retries_with_a_new_number() {
        let racy = RacyStore(InMemoryLedgerStore::new());
        racy.0
            .insert_account(Account::open(
                AccountNumber::from("ACC0000000001"),
                NewAccount::new(UserId::new(), "alice"),
                Currency::default(),
            ))
            .unwrap();

        let provisioner = AccountProvisioner::with_source(
            racy,
            Scripted::new(&["ACC0000000001", "ACC0000000002"]),
            &config(),
        );
        let account = provisioner
            .create_account(NewAccount::new(UserId::new(), "bob"))
            .await
            .unwrap();
        assert_eq!(account.account_number.as_str(), "ACC0000000002");
    }

    #[tokio::test]
    async fn identity_collision_at_insert_is_not_retried() {
        let racy = RacyStore(InMemoryLedgerStore::new());
        let owner = UserId::new();
        racy.0
            .insert_account(Account::open(
                AccountNumber::from("ACC0000000001"),
                NewAccount::new(owner, "alice"),
                Currency::default(),
            ))
            .unwrap();

        let provisioner = AccountProvisioner::with_source(
            racy,
            Scripted::new(&["ACC0000000002", "ACC0000000003", "ACC0000000004"]),
            &config(),
        );

        let same_name = provisioner
            .create_account(NewAccount::new(UserId::new(), "alice"))
            .await;
        assert!(matches!(same_name, Err(LedgerError::DuplicateIdentity(_))));
        assert_eq!(provisioner.numbers.0.lock().unwrap().len(), 2);

        let same_owner = provisioner
            .create_account(NewAccount::new(owner, "alice2"))
            .await;
        assert!(matches!(same_owner, Err(LedgerError::DuplicateIdentity(_))));
        assert_eq!(provisioner.numbers.0.lock().unwrap().len(), 1);
        let unused = AccountNumber::from("ACC0000000002");
        assert!(!provisioner.store.0.contains_account(&unused).unwrap());
    }

    #[tokio::test]
    async fn duplicate_username_or_owner_is_rejected() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let provisioner = AccountProvisioner::new(Arc::clone(&store), &config());
        let owner = UserId::new();
        provisioner
            .create_account(NewAccount::new(owner, "alice"))
            .await
            .unwrap();

        let same_name = provisioner
            .create_account(NewAccount::new(UserId::new(), "alice"))
            .await;
        assert!(matches!(same_name, Err(LedgerError::DuplicateIdentity(_))));

        let same_owner = provisioner
            .create_account(NewAccount::new(owner, "alice2"))
            .await;
        assert!(matches!(same_owner, Err(LedgerError::DuplicateIdentity(_))));
    }

    #[tokio::test]
    async fn new_accounts_are_active_empty_and_unrecorded() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let provisioner = AccountProvisioner::new(Arc::clone(&store), &LedgerConfig::default());
        let account = provisioner
            .create_account(NewAccount::new(UserId::new(), "alice"))
            .await
            .unwrap();

        assert_eq!(account.balance, Money::ZERO);
        assert_eq!(account.status, AccountStatus::Active);
        assert!(account.account_number.as_str().starts_with("ACC"));
        assert_eq!(account.account_number.as_str().len(), 13);
        assert!(store.records_for(&account.account_number).unwrap().is_empty());
        assert!(store.supports_multi_key());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_get_distinct_numbers() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let provisioner = Arc::new(AccountProvisioner::new(
            Arc::clone(&store),
            &LedgerConfig::default(),
        ));

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let provisioner = Arc::clone(&provisioner);
                tokio::spawn(async move {
                    provisioner
                        .create_account(NewAccount::new(UserId::new(), format!("user{i}")))
                        .await
                })
            })
            .collect();

        let mut numbers = HashSet::new();
        for handle in handles {
            let account = handle.await.unwrap().unwrap();
            assert!(numbers.insert(account.account_number));
        }
        assert_eq!(numbers.len(), 32);
    }
}
