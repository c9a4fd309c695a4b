use std::{env, fs::File, io, path::Path, sync::Arc};

use custodial_ledger::{
    InMemoryLedgerStore, LedgerConfig, dlq::LogDLQ, driver::Driver, ingestion, telemetry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let file_path = env::args()
        .nth(1)
        .ok_or("usage: custodial_ledger <commands.csv>")?;
    let file = File::open(Path::new(&file_path))?;

    let config = LedgerConfig::from_env();
    let store = Arc::new(InMemoryLedgerStore::new());
    let ingestion = ingestion::CsvReader::new(file)?;

    let mut driver = Driver::new(ingestion, store, LogDLQ::default(), &config);
    driver.process().await?;
    driver.report(io::stdout().lock())?;

    Ok(())
}
