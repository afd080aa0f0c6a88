//! BootUp service entry point.

mod cli;
mod config;
mod database;
mod monitoring;
mod orchestrator;
mod pool;
mod targets;
mod validation;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;

use cli::{Cli, Command};
use config::Config;
use database::models::CollectionRecord;
use database::{DatabaseImpl, initialize_database};
use orchestrator::Orchestrator;
use targets::TargetRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    logger::init_with_level(if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO });
    monitoring::checker::install_crypto_provider();

    let config = Config::from_config(cli.config.as_ref()).context("Failed to load configuration")?;
    tracing::debug!(database = %config.database.path.display(), "Configuration loaded");

    match cli.command {
        Command::Config => {
            print!("{config}");
            Ok(())
        }
        Command::Run => {
            let pool = pool::open_pool(&config.database.path, config.database.max_connections).await?;
            Orchestrator::start(config, pool).await
        }
        Command::Add { email, service_type, interval, urls } => {
            let records = registry(&config).await?.collect(&email, &service_type, interval, &urls).await?;
            print_records(&records, false)
        }
        Command::List { owner, json } => {
            let registry = registry(&config).await?;
            let records = match owner {
                Some(owner) => registry.fetch(&owner).await?,
                None => registry.list().await?,
            };
            print_records(&records, json)
        }
        Command::Update { id, url } => {
            let record = registry(&config).await?.update(id, &url).await?;
            print_records(&[record], false)
        }
        Command::Delete { id } => {
            registry(&config).await?.delete(id).await?;
            println!("Deleted endpoint {id}");
            Ok(())
        }
    }
}

async fn registry(config: &Config) -> Result<TargetRegistry> {
    let pool = pool::open_pool(&config.database.path, config.database.max_connections).await?;
    let conn = pool.get().await.context("Failed to get database connection")?;
    initialize_database(&conn).await?;
    drop(conn);

    Ok(TargetRegistry::new(Arc::new(DatabaseImpl::new_from_pool(pool))))
}

fn print_records(records: &[CollectionRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No endpoints registered");
        return Ok(());
    }

    println!("{:>5}  {:<12}  {:<16}  {:>8}  URL", "ID", "OWNER", "TYPE", "INTERVAL");
    for record in records {
        println!(
            "{:>5}  {:<12}  {:<16}  {:>7}s  {}",
            record.id, record.username, record.service_type, record.interval, record.url
        );
    }
    Ok(())
}
