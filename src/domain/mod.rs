pub mod account;
pub mod command;
pub mod error;
pub mod money;
pub mod principal;
pub mod traits;
pub mod transaction;

pub use account::{Account, AccountNumber, AccountStatus, AccountType, Currency, NewAccount};
pub use command::LedgerCommand;
pub use error::{Error, ErrorCategory, LedgerError, StoreError, UniqueKey};
pub use money::Money;
pub use principal::{Principal, Role, UserId};
pub use traits::{
    AccountStore, BalanceUpdate, CommandStream, DeadLetterQueue, LedgerStore, TransactionLog,
    UnitOfWork, Versioned,
};
pub use transaction::{
    RecordStatus, TransactionId, TransactionKind, TransactionRecord, TransferReceipt,
    replay_balance,
};
