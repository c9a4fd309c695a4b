use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;

use crate::config::LedgerConfig;
use crate::domain::{
    AccountNumber, CommandStream, DeadLetterQueue, Error, LedgerCommand, LedgerError, LedgerStore,
    NewAccount, Principal, UserId,
};
use crate::engine::LedgerEngine;
use crate::output;
use crate::provisioning::AccountProvisioner;
use crate::query::QueryFacade;

/// Feeds a command stream through the ledger, standing in for the routing
/// layer. Usernames are resolved to principals through an in-process
/// directory instead of verified credentials.
pub struct Driver<I, D, S>
where
    I: CommandStream,
    D: DeadLetterQueue,
    S: LedgerStore + Clone,
{
    ingestion: I,
    dlq: D,
    engine: Arc<LedgerEngine<S>>,
    provisioner: AccountProvisioner<S>,
    query: QueryFacade<S>,
    directory: BTreeMap<String, Principal>,
}

impl<I, D, S> Driver<I, D, S>
where
    I: CommandStream,
    D: DeadLetterQueue,
    S: LedgerStore + Clone,
{
    pub fn new(ingestion: I, store: S, dlq: D, config: &LedgerConfig) -> Self {
        let engine = Arc::new(LedgerEngine::new(store.clone(), config));
        Self {
            ingestion,
            dlq,
            provisioner: AccountProvisioner::new(store, config),
            query: QueryFacade::new(Arc::clone(&engine)),
            engine,
            directory: BTreeMap::new(),
        }
    }

    pub async fn process(&mut self) -> Result<(), Error> {
        let mut commands = self.ingestion.stream();

        while let Some(command) = commands.next().await {
            match command {
                Ok(command) => {
                    tracing::debug!(command = %command, "applying command");
                    if let Err(e) = self.apply(command).await {
                        self.dlq.report(&e);
                    }
                }
                Err(e) => self.dlq.report(&e),
            }
        }

        Ok(())
    }

    async fn apply(&mut self, command: LedgerCommand) -> Result<(), Error> {
        match command {
            LedgerCommand::Open { username } => {
                let owner = UserId::new();
                self.provisioner
                    .create_account(NewAccount::new(owner, username.clone()))
                    .await?;
                self.directory
                    .insert(username.clone(), Principal::customer(owner, username));
            }
            LedgerCommand::Deposit { username, amount } => {
                let (principal, account) = self.resolve(&username)?;
                self.engine.deposit(&account, amount, &principal).await?;
            }
            LedgerCommand::Withdraw { username, amount } => {
                let (principal, account) = self.resolve(&username)?;
                self.engine.withdraw(&account, amount, &principal).await?;
            }
            LedgerCommand::Transfer {
                username,
                to,
                amount,
            } => {
                let (principal, from) = self.resolve(&username)?;
                // Unknown usernames are taken as raw account numbers.
                let to = self
                    .account_of(&to)?
                    .unwrap_or_else(|| AccountNumber::new(to));
                self.engine.transfer(&from, &to, amount, &principal).await?;
            }
            LedgerCommand::History { username } => {
                let (principal, account) = self.resolve(&username)?;
                let records = self.query.transactions(&account, &principal).await?;
                tracing::info!(user = %username, account = %account, count = records.len(), "history");
                for record in records {
                    tracing::info!(
                        user = %username,
                        transaction_id = %record.transaction_id,
                        created_at = %record.created_at,
                        description = %record.description,
                        "{}",
                        record
                    );
                }
            }
        }
        Ok(())
    }

    fn resolve(&self, username: &str) -> Result<(Principal, AccountNumber), Error> {
        let principal = self
            .directory
            .get(username)
            .cloned()
            .ok_or_else(|| Error::Ingestion(format!("Unknown user: {}", username)))?;
        let account = self
            .account_of(username)?
            .ok_or_else(|| Error::Ingestion(format!("No account for user: {}", username)))?;
        Ok((principal, account))
    }

    fn account_of(&self, username: &str) -> Result<Option<AccountNumber>, Error> {
        Ok(self
            .engine
            .store()
            .account_by_username(username)
            .map_err(LedgerError::from)?
            .map(|account| account.account_number))
    }

    /// Balance report for every registered user, ordered by username.
    pub fn report<W: Write>(&self, out: W) -> Result<(), Error> {
        let mut accounts = Vec::with_capacity(self.directory.len());
        for username in self.directory.keys() {
            if let Some(account) = self
                .engine
                .store()
                .account_by_username(username)
                .map_err(LedgerError::from)?
            {
                accounts.push(account);
            }
        }
        output::write_balances(out, &accounts)
    }
}
