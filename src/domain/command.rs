use crate::domain::Money;

/// A single request against the ledger, addressed by the acting username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    Open { username: String },
    Deposit { username: String, amount: Money },
    Withdraw { username: String, amount: Money },
    Transfer { username: String, to: String, amount: Money },
    History { username: String },
}

impl LedgerCommand {
    pub fn username(&self) -> &str {
        match self {
            LedgerCommand::Open { username }
            | LedgerCommand::Deposit { username, .. }
            | LedgerCommand::Withdraw { username, .. }
            | LedgerCommand::Transfer { username, .. }
            | LedgerCommand::History { username } => username,
        }
    }
}

impl core::fmt::Display for LedgerCommand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LedgerCommand::Open { username } => write!(f, "open,user={}", username),
            LedgerCommand::Deposit { username, amount } => {
                write!(f, "deposit,user={},amount={}", username, amount)
            }
            LedgerCommand::Withdraw { username, amount } => {
                write!(f, "withdraw,user={},amount={}", username, amount)
            }
            LedgerCommand::Transfer {
                username,
                to,
                amount,
            } => write!(f, "transfer,user={},to={},amount={}", username, to, amount),
            LedgerCommand::History { username } => write!(f, "history,user={}", username),
        }
    }
}
