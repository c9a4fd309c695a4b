//! Ownership guard consulted before any ledger read or write.
//!
//! - No IO
//! - No side effects on denial

use crate::domain::{Account, LedgerError, Principal};

/// Allows the principal to act on `account` iff it owns it. No role grants
/// access to another owner's account.
pub fn authorize(principal: &Principal, account: &Account) -> Result<(), LedgerError> {
    if principal.user_id == account.owner_id {
        Ok(())
    } else {
        tracing::debug!(
            account = %account.account_number,
            username = %principal.username,
            role = %principal.role,
            "ownership check denied"
        );
        Err(LedgerError::NotOwner(account.account_number.clone()))
    }
}
