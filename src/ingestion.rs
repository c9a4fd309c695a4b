use std::io::Read;
use std::pin::Pin;

use futures::stream::{self, Stream};
use serde::Deserialize;

use crate::domain::traits::CommandStream;
use crate::domain::{Error, LedgerCommand, Money};

pub struct CsvReader<R: Read> {
    reader: Option<csv::Reader<R>>,
}

impl<R: Read> CsvReader<R> {
    pub fn new(reader: R) -> Result<Self, Error> {
        let rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        Ok(Self { reader: Some(rdr) })
    }
}

/// Internal shape used only for CSV deserialization.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "type")]
    kind: String,
    user: String,
    counterparty: Option<String>,
    amount: Option<Money>,
}

impl TryFrom<CsvRow> for LedgerCommand {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self, Self::Error> {
        let username = row.user.trim().to_string();
        if username.is_empty() {
            return Err(Error::Ingestion("Missing user".to_string()));
        }
        let counterparty = row
            .counterparty
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let command = match (
            row.kind.trim().to_ascii_lowercase().as_str(),
            counterparty,
            row.amount,
        ) {
            ("open", None, None) => LedgerCommand::Open { username },
            ("deposit", None, Some(amount)) => LedgerCommand::Deposit { username, amount },
            ("withdraw" | "withdrawal", None, Some(amount)) => {
                LedgerCommand::Withdraw { username, amount }
            }
            ("transfer", Some(to), Some(amount)) => LedgerCommand::Transfer {
                username,
                to,
                amount,
            },
            ("history", None, None) => LedgerCommand::History { username },
            (other, _, _) => {
                return Err(Error::Ingestion(format!(
                    "Invalid command: {} for user {}",
                    other, username
                )));
            }
        };

        Ok(command)
    }
}

impl<R: Read + Send + 'static> CommandStream for CsvReader<R> {
    type CmdStream = Pin<Box<dyn Stream<Item = Result<LedgerCommand, Error>> + Send>>;

    fn stream(&mut self) -> Self::CmdStream {
        let reader = match self.reader.take() {
            Some(r) => r,
            None => {
                // Already consumed; return an empty stream.
                return Box::pin(stream::iter(Vec::<Result<LedgerCommand, Error>>::new()));
            }
        };

        let iter = reader
            .into_deserialize::<CsvRow>()
            .map(|row_res| match row_res {
                Ok(row) => LedgerCommand::try_from(row),
                Err(e) => Err(Error::Ingestion(format!(
                    "CSV deserialization error: {}",
                    e
                ))),
            });

        Box::pin(stream::iter(iter))
    }
}
