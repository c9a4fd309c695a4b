//! Custodial ledger: account balances plus the immutable record of every
//! deposit, withdrawal and transfer that produced them.

/// Ownership check consulted before every read or write.
pub mod authorization;
/// `LEDGER_*` environment configuration with defaults.
pub mod config;
/// Dead-letter reporting for commands the ledger rejected.
pub mod dlq;
/// Accounts, records, identities and the store contracts the engine runs on.
pub mod domain;
/// Command-line routing of CSV command scripts into the ledger.
pub mod driver;
/// Deposits, withdrawals and transfers, applied atomically and recorded.
pub mod engine;
/// CSV command scripts streamed as ledger commands.
pub mod ingestion;
/// Per-account async locks taken in a deadlock-free order.
pub mod locks;
/// CSV balance report written at the end of a run.
pub mod output;
/// Account creation and account-number allocation.
pub mod provisioning;
/// Owner-gated read access to accounts and their history.
pub mod query;
/// Bounded exponential backoff for transient failures.
pub mod retry;
/// In-memory implementation of the ledger store contracts.
pub mod store;
/// Tracing subscriber setup for the binary.
pub mod telemetry;

pub use config::LedgerConfig;
pub use engine::LedgerEngine;
pub use provisioning::{AccountNumberSource, AccountProvisioner, RandomAccountNumbers};
pub use query::QueryFacade;
pub use retry::RetryPolicy;
pub use store::InMemoryLedgerStore;
