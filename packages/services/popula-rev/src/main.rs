use anyhow::{bail, Context, Result};
use clap::Parser;
use mongodb::Client;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use popula_rev::{Cli, Config, DatabaseManager, MigrationEvent, RevisionError, RevisionMigrator};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(e) if !e.use_stderr() => {
            e.print()?;
            return Ok(());
        }
        Err(e) => bail!("invalid arguments: {}", e.render()),
    };

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("failed to load env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let config = Config::from_env(!cli.skip_storage_config).context("failed to load configuration")?;
    let options = cli.migrator_options()?;
    let limit = cli.timeout();
    let deadline = Instant::now() + limit;

    info!(
        aid = %cli.aid,
        database = %config.mongo.database_name,
        source = %config.mongo.monthly_info_collection,
        destination = %config.mongo.revision_collection,
        "Loaded configuration"
    );

    let client = timeout_at(deadline, Client::with_uri_str(&config.mongo.mongodb_uri))
        .await
        .map_err(|_| RevisionError::Timeout { duration: limit })?
        .context("failed to create MongoDB client")?;

    let store = DatabaseManager::new(
        &client,
        &config.mongo.database_name,
        &config.mongo.monthly_info_collection,
        &config.mongo.revision_collection,
    );
    let migrator = RevisionMigrator::new(store, options);

    let progress = migrator.run_with_progress(&cli.aid, |event| match event {
        MigrationEvent::NothingToRevise { .. } => println!("{}", event),
        MigrationEvent::YearFinished(_) => println!("{}\n", event),
    });
    let outcome = timeout_at(deadline, progress).await;

    // Release every handle before closing the client.
    drop(migrator);
    client.shutdown().await;

    let report = outcome
        .map_err(|_| RevisionError::Timeout { duration: limit })?
        .with_context(|| format!("revision migration for {} failed", cli.aid))?;

    println!("{}", report.summary());
    if !report.is_success() {
        bail!("{} year(s) failed: {:?}", report.failed_years().len(), report.failed_years());
    }
    Ok(())
}
