use std::future::Future;
use std::time::Duration;

use crate::authorization::authorize;
use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountNumber, LedgerError, LedgerStore, Money, Principal, TransactionKind,
    TransactionRecord, TransferReceipt, UnitOfWork, Versioned,
};
use crate::locks::AccountLocks;
use crate::retry::RetryPolicy;

/// Validates, applies and records balance-affecting operations.
///
/// Every mutation is a versioned read-modify-write committed together with
/// its transaction record(s) as one unit of work. Within one engine,
/// mutations of the same account are additionally serialized through
/// per-account locks; writers outside this engine are caught by the store's
/// version check and retried.
#[derive(Debug)]
pub struct LedgerEngine<S>
where
    S: LedgerStore,
{
    store: S,
    locks: AccountLocks,
    retry: RetryPolicy,
    operation_timeout: Duration,
}

impl<S> LedgerEngine<S>
where
    S: LedgerStore,
{
    pub fn new(store: S, config: &LedgerConfig) -> Self {
        Self::with_policy(store, config.retry, config.operation_timeout)
    }

    pub fn with_policy(store: S, retry: RetryPolicy, operation_timeout: Duration) -> Self {
        Self {
            store,
            locks: AccountLocks::new(),
            retry,
            operation_timeout,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn deposit(
        &self,
        account: &AccountNumber,
        amount: Money,
        principal: &Principal,
    ) -> Result<TransactionRecord, LedgerError> {
        let record = self
            .bounded("deposit", async {
                let _guard = self.locks.acquire([account]).await;
                self.retry
                    .run("deposit", || self.try_deposit(account, amount, principal))
                    .await
            })
            .await?;

        tracing::info!(
            account = %account,
            amount = %amount,
            balance_after = %record.balance_after,
            transaction_id = %record.transaction_id,
            "deposit completed"
        );
        Ok(record)
    }

    pub async fn withdraw(
        &self,
        account: &AccountNumber,
        amount: Money,
        principal: &Principal,
    ) -> Result<TransactionRecord, LedgerError> {
        let record = self
            .bounded("withdraw", async {
                let _guard = self.locks.acquire([account]).await;
                self.retry
                    .run("withdraw", || self.try_withdraw(account, amount, principal))
                    .await
            })
            .await?;

        tracing::info!(
            account = %account,
            amount = %amount,
            balance_after = %record.balance_after,
            transaction_id = %record.transaction_id,
            "withdrawal completed"
        );
        Ok(record)
    }

    /// Moves `amount` from `from` to `to`. Only the source must be owned by
    /// the caller.
    ///
    /// Runs as a single unit of work spanning both accounts when the store
    /// supports it, and as a compensated saga otherwise.
    pub async fn transfer(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: Money,
        principal: &Principal,
    ) -> Result<TransferReceipt, LedgerError> {
        let receipt = if self.store.supports_multi_key() {
            self.bounded("transfer", async {
                let _guard = self.locks.acquire([from, to]).await;
                self.retry
                    .run("transfer", || self.try_transfer(from, to, amount, principal))
                    .await
            })
            .await?
        } else {
            self.transfer_saga(from, to, amount, principal).await?
        };

        tracing::info!(
            from = %from,
            to = %to,
            amount = %amount,
            source_balance = %receipt.debit.balance_after,
            destination_balance = %receipt.credit.balance_after,
            "transfer completed"
        );
        Ok(receipt)
    }

    /// All records of `account`, newest first.
    pub async fn list_transactions(
        &self,
        account: &AccountNumber,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.bounded(
            "list_transactions",
            self.retry.run("list_transactions", || {
                self.store.records_for(account).map_err(LedgerError::from)
            }),
        )
        .await
    }

    /// Current state of `account`, read under the same retry and timeout
    /// rules as the mutations.
    pub async fn account(&self, account: &AccountNumber) -> Result<Account, LedgerError> {
        self.bounded("account", self.retry.run("account", || self.load(account)))
            .await
            .map(|versioned| versioned.value)
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                let millis = self.operation_timeout.as_millis() as u64;
                tracing::warn!(operation, timeout_ms = millis, "ledger operation timed out");
                Err(LedgerError::Timeout(millis))
            }
        }
    }

    fn load(&self, number: &AccountNumber) -> Result<Versioned<Account>, LedgerError> {
        self.store
            .account(number)?
            .ok_or_else(|| LedgerError::AccountNotFound(number.clone()))
    }

    fn try_deposit(
        &self,
        number: &AccountNumber,
        amount: Money,
        principal: &Principal,
    ) -> Result<TransactionRecord, LedgerError> {
        let account = self.load(number)?;
        authorize(principal, &account.value)?;
        ensure_positive(amount)?;
        ensure_active(&account.value)?;

        let balance = credit(&account.value, amount)?;
        let record = TransactionRecord::completed(
            TransactionKind::Deposit,
            number.clone(),
            None,
            amount,
            balance,
            account.value.currency.clone(),
            format!("Deposit by {}", principal.username),
        );

        self.store.commit(
            UnitOfWork::new()
                .update(&account, balance)
                .append(record.clone()),
        )?;
        Ok(record)
    }

    fn try_withdraw(
        &self,
        number: &AccountNumber,
        amount: Money,
        principal: &Principal,
    ) -> Result<TransactionRecord, LedgerError> {
        let account = self.load(number)?;
        authorize(principal, &account.value)?;
        ensure_positive(amount)?;
        ensure_active(&account.value)?;

        let balance = debit(&account.value, amount)?;
        let record = TransactionRecord::completed(
            TransactionKind::Withdrawal,
            number.clone(),
            None,
            amount,
            balance,
            account.value.currency.clone(),
            format!("Withdrawal by {}", principal.username),
        );

        self.store.commit(
            UnitOfWork::new()
                .update(&account, balance)
                .append(record.clone()),
        )?;
        Ok(record)
    }

    fn validate_transfer(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: Money,
        principal: &Principal,
    ) -> Result<(Versioned<Account>, Versioned<Account>), LedgerError> {
        let source = self.load(from)?;
        if from == to {
            authorize(principal, &source.value)?;
            ensure_positive(amount)?;
            return Err(LedgerError::InvalidOperation(format!(
                "cannot transfer from {from} to itself"
            )));
        }
        let destination = self.load(to)?;

        authorize(principal, &source.value)?;
        ensure_positive(amount)?;
        if source.value.currency != destination.value.currency {
            return Err(LedgerError::InvalidOperation(format!(
                "currency mismatch: {} is {}, {} is {}",
                from, source.value.currency, to, destination.value.currency
            )));
        }
        ensure_active(&source.value)?;
        ensure_active(&destination.value)?;
        ensure_funds(&source.value, amount)?;

        Ok((source, destination))
    }

    fn transfer_out_record(
        source: &Account,
        to: &AccountNumber,
        amount: Money,
        balance_after: Money,
        principal: &Principal,
    ) -> TransactionRecord {
        TransactionRecord::completed(
            TransactionKind::TransferOut,
            source.account_number.clone(),
            Some(to.clone()),
            amount,
            balance_after,
            source.currency.clone(),
            format!("Transfer to {} by {}", to, principal.username),
        )
    }

    fn transfer_in_record(
        destination: &Account,
        from: &AccountNumber,
        amount: Money,
        balance_after: Money,
        principal: &Principal,
    ) -> TransactionRecord {
        TransactionRecord::completed(
            TransactionKind::TransferIn,
            destination.account_number.clone(),
            Some(from.clone()),
            amount,
            balance_after,
            destination.currency.clone(),
            format!("Transfer from {} by {}", from, principal.username),
        )
    }

    fn try_transfer(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: Money,
        principal: &Principal,
    ) -> Result<TransferReceipt, LedgerError> {
        let (source, destination) = self.validate_transfer(from, to, amount, principal)?;

        let source_balance = debit(&source.value, amount)?;
        let destination_balance = credit(&destination.value, amount)?;
        let debit_record =
            Self::transfer_out_record(&source.value, to, amount, source_balance, principal);
        let credit_record =
            Self::transfer_in_record(&destination.value, from, amount, destination_balance, principal);

        self.store.commit(
            UnitOfWork::new()
                .update(&source, source_balance)
                .update(&destination, destination_balance)
                .append(debit_record.clone())
                .append(credit_record.clone()),
        )?;

        Ok(TransferReceipt {
            debit: debit_record,
            credit: credit_record,
        })
    }

    /// Debit, then credit, then reverse the debit if the credit could not
    /// be applied. Both account locks are held throughout, so no other
    /// operation of this engine observes the intermediate state.
    async fn transfer_saga(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: Money,
        principal: &Principal,
    ) -> Result<TransferReceipt, LedgerError> {
        // Once the debit is committed the remaining legs must run to
        // completion, so only lock acquisition and the debit are time-bounded.
        let (_guard, debit_record) = self
            .bounded("transfer", async {
                let guard = self.locks.acquire([from, to]).await;
                let debit_record = self
                    .retry
                    .run("transfer.debit", || {
                        self.try_debit_leg(from, to, amount, principal)
                    })
                    .await?;
                Ok((guard, debit_record))
            })
            .await?;

        let credited = self
            .retry
            .run("transfer.credit", || {
                self.try_credit_leg(from, to, amount, principal)
            })
            .await;

        match credited {
            Ok(credit_record) => Ok(TransferReceipt {
                debit: debit_record,
                credit: credit_record,
            }),
            Err(cause) => {
                tracing::warn!(
                    from = %from,
                    to = %to,
                    amount = %amount,
                    error = %cause,
                    "credit leg failed; reversing debit"
                );
                self.retry
                    .run("transfer.compensate", || self.try_reverse_debit(from, to, amount))
                    .await
                    .map_err(|reversal| {
                        tracing::error!(
                            from = %from,
                            to = %to,
                            amount = %amount,
                            error = %reversal,
                            "debit reversal failed"
                        );
                        LedgerError::CompensationFailed {
                            account: from.clone(),
                            cause: Box::new(cause.clone()),
                        }
                    })?;
                Err(cause)
            }
        }
    }

    fn try_debit_leg(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: Money,
        principal: &Principal,
    ) -> Result<TransactionRecord, LedgerError> {
        let (source, _) = self.validate_transfer(from, to, amount, principal)?;
        let balance = debit(&source.value, amount)?;
        let record = Self::transfer_out_record(&source.value, to, amount, balance, principal);
        self.store.commit(
            UnitOfWork::new()
                .update(&source, balance)
                .append(record.clone()),
        )?;
        Ok(record)
    }

    fn try_credit_leg(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: Money,
        principal: &Principal,
    ) -> Result<TransactionRecord, LedgerError> {
        let destination = self.load(to)?;
        ensure_active(&destination.value)?;
        let balance = credit(&destination.value, amount)?;
        let record = Self::transfer_in_record(&destination.value, from, amount, balance, principal);
        self.store.commit(
            UnitOfWork::new()
                .update(&destination, balance)
                .append(record.clone()),
        )?;
        Ok(record)
    }

    fn try_reverse_debit(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: Money,
    ) -> Result<TransactionRecord, LedgerError> {
        let source = self.load(from)?;
        let balance = credit(&source.value, amount)?;
        let record = TransactionRecord::completed(
            TransactionKind::TransferIn,
            from.clone(),
            Some(to.clone()),
            amount,
            balance,
            source.value.currency.clone(),
            format!("Reversal of transfer to {}", to),
        );
        self.store.commit(
            UnitOfWork::new()
                .update(&source, balance)
                .append(record.clone()),
        )?;
        Ok(record)
    }
}

fn ensure_positive(amount: Money) -> Result<(), LedgerError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount(amount))
    }
}

fn ensure_active(account: &Account) -> Result<(), LedgerError> {
    if account.status.accepts_mutations() {
        Ok(())
    } else {
        Err(LedgerError::AccountNotActive {
            account: account.account_number.clone(),
            status: account.status,
        })
    }
}

fn ensure_funds(account: &Account, amount: Money) -> Result<(), LedgerError> {
    if account.balance < amount {
        return Err(LedgerError::InsufficientFunds {
            account: account.account_number.clone(),
            balance: account.balance,
            requested: amount,
        });
    }
    Ok(())
}

fn credit(account: &Account, amount: Money) -> Result<Money, LedgerError> {
    account.balance.checked_add(amount).ok_or_else(|| {
        LedgerError::InvalidOperation(format!("balance overflow on {}", account.account_number))
    })
}

fn debit(account: &Account, amount: Money) -> Result<Money, LedgerError> {
    ensure_funds(account, amount)?;
    account.balance.checked_sub(amount).ok_or_else(|| {
        LedgerError::InvalidOperation(format!("balance underflow on {}", account.account_number))
    })
}
