use carlot::application::engine::TransactionEngine;
use carlot::application::listing::ListingLifecycle;
use carlot::config::MarketConfig;
use carlot::domain::ports::{MarketStoreRef, NotifierRef, SettlementStore, TransactionStore};
use carlot::infrastructure::in_memory::InMemoryMarketStore;
use carlot::infrastructure::notifier::LogNotifier;
#[cfg(feature = "storage-rocksdb")]
use carlot::infrastructure::rocksdb::RocksDBStore;
use carlot::interfaces::csv::command_reader::CommandReader;
use carlot::interfaces::csv::report_writer::ReportWriter;
use carlot::interfaces::runner::CommandRunner;
use carlot::interfaces::seed::Seed;
use carlot::telemetry;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
#[cfg(not(feature = "storage-rocksdb"))]
use tracing::warn;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Commands CSV file (command, actor, target)
    input: PathBuf,

    /// JSON seed with companies, users and listings
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<MarketStoreRef> {
    match db_path {
        Some(db_path) => {
            let store = RocksDBStore::open(db_path).into_diagnostic()?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryMarketStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<MarketStoreRef> {
    if db_path.is_some() {
        warn!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryMarketStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = MarketConfig::load().into_diagnostic()?;
    telemetry::init(&config.log_level).into_diagnostic()?;

    let store = open_store(cli.db_path)?;
    let notifier: NotifierRef = Arc::new(LogNotifier);

    let seed = match cli.seed {
        Some(path) => Seed::from_reader(File::open(path).into_diagnostic()?).into_diagnostic()?,
        None => Seed::default(),
    }
    .with_currency_scale(config.currency_scale);
    let directory = seed.apply(store.as_ref()).await.into_diagnostic()?;

    let engine = TransactionEngine::new(store.clone(), notifier.clone())
        .with_policy(config.commission_policy())
        .with_commit_attempts(config.commit_attempts);
    let listings = ListingLifecycle::new(store.clone(), notifier)
        .with_commit_attempts(config.commit_attempts)
        .with_currency_scale(config.currency_scale);
    let runner = CommandRunner::new(engine, listings, directory);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for record in reader.commands() {
        match record {
            Ok(record) => {
                if let Err(e) = runner.run(record).await {
                    error!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                error!("Error reading command: {}", e);
            }
        }
    }

    let transactions = store.transactions().await.into_diagnostic()?;
    let settlements = store.settlements().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer
        .write_report(&transactions, &settlements)
        .into_diagnostic()?;

    Ok(())
}
