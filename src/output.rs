use std::io::Write;

use crate::domain::{Account, Error};

pub const BALANCE_HEADER: [&str; 5] = ["username", "account", "balance", "currency", "status"];

/// Writes one CSV row per account, in the order given.
pub fn write_balances<W: Write>(out: W, accounts: &[Account]) -> Result<(), Error> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(BALANCE_HEADER)?;
    for account in accounts {
        let balance = account.balance.to_string();
        writer.write_record([
            account.username.as_str(),
            account.account_number.as_str(),
            balance.as_str(),
            account.currency.as_str(),
            account.status.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
