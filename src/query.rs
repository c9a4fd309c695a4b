use std::sync::Arc;

use crate::authorization::authorize;
use crate::domain::{Account, AccountNumber, LedgerError, LedgerStore, Principal, TransactionRecord};
use crate::engine::LedgerEngine;

/// Read-only, ownership-gated view of the ledger.
#[derive(Debug)]
pub struct QueryFacade<S>
where
    S: LedgerStore,
{
    engine: Arc<LedgerEngine<S>>,
}

impl<S> Clone for QueryFacade<S>
where
    S: LedgerStore,
{
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<S> QueryFacade<S>
where
    S: LedgerStore,
{
    pub fn new(engine: Arc<LedgerEngine<S>>) -> Self {
        Self { engine }
    }

    /// The caller's transaction history, newest first.
    pub async fn transactions(
        &self,
        account: &AccountNumber,
        principal: &Principal,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.owned_account(account, principal).await?;
        self.engine.list_transactions(account).await
    }

    /// Current balance, currency and status of the caller's account.
    pub async fn account(
        &self,
        account: &AccountNumber,
        principal: &Principal,
    ) -> Result<Account, LedgerError> {
        self.owned_account(account, principal).await
    }

    async fn owned_account(
        &self,
        number: &AccountNumber,
        principal: &Principal,
    ) -> Result<Account, LedgerError> {
        let account = self.engine.account(number).await?;
        authorize(principal, &account)?;
        Ok(account)
    }
}
