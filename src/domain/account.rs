use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Money, UserId};

/// Externally visible account identifier, e.g. `ACC0000000001`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Formats `number` zero-padded to `width` digits after `prefix`.
    pub fn format(prefix: &str, number: u64, width: usize) -> Self {
        Self(format!("{prefix}{number:0width$}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountNumber {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// ISO-4217 style currency code fixed on an account at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self("INR".to_string())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code))
        } else {
            Err(format!("Invalid currency code: {}", s))
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Inactive,
    Frozen,
    Closed,
}

impl AccountStatus {
    /// Only active accounts accept balance mutations.
    pub fn accepts_mutations(&self) -> bool {
        match self {
            AccountStatus::Active => true,
            AccountStatus::Inactive | AccountStatus::Frozen | AccountStatus::Closed => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Inactive => "INACTIVE",
            AccountStatus::Frozen => "FROZEN",
            AccountStatus::Closed => "CLOSED",
        }
    }
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    #[default]
    Savings,
    Current,
    FixedDeposit,
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SAVINGS" => Ok(AccountType::Savings),
            "CURRENT" => Ok(AccountType::Current),
            "FIXED_DEPOSIT" => Ok(AccountType::FixedDeposit),
            other => Err(format!("Invalid account type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub account_number: AccountNumber,
    pub owner_id: UserId,
    pub username: String,
    pub account_type: AccountType,
    pub balance: Money,
    pub currency: Currency,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A freshly registered account: zero balance, active.
    pub fn open(account_number: AccountNumber, profile: NewAccount, currency: Currency) -> Self {
        Self {
            account_number,
            owner_id: profile.owner_id,
            username: profile.username,
            account_type: profile.account_type,
            balance: Money::ZERO,
            currency: profile.currency.unwrap_or(currency),
            status: AccountStatus::Active,
            created_at: Utc::now(),
        }
    }
}

/// Registration data handed to provisioning by the identity layer.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub owner_id: UserId,
    pub username: String,
    pub account_type: AccountType,
    pub currency: Option<Currency>,
}

impl NewAccount {
    pub fn new(owner_id: UserId, username: impl Into<String>) -> Self {
        Self {
            owner_id,
            username: username.into(),
            account_type: AccountType::default(),
            currency: None,
        }
    }
}
