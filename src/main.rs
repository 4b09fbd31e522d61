use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_harvester::config::HarvesterConfig;
use catalog_harvester::error::HarvesterErrorTrait;
use catalog_harvester::harvest::Harvester;
use catalog_harvester::storage::open_sqlite_store;
use catalog_harvester::utils::lock::PidLock;

#[derive(Parser)]
#[command(
    name = "harvest",
    version,
    about = "Resumable harvester for OpenSearch-style satellite product catalogs",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest new records until the catalog is exhausted
    Run {
        /// Harvester configuration file (TOML)
        config: PathBuf,
    },

    /// Show record count and latest dates for a harvester
    Stats {
        /// Harvester configuration file (TOML)
        config: PathBuf,
    },

    /// Print harvested records as JSON lines
    Export {
        /// Harvester configuration file (TOML)
        config: PathBuf,

        /// Only records harvested after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Maximum number of records to print
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    match cli.command {
        Commands::Run { config } => run(&config).await,
        Commands::Stats { config } => stats(&config),
        Commands::Export {
            config,
            since,
            limit,
        } => export(&config, since, limit),
    }
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            tracing_subscriber::EnvFilter::new("catalog_harvester=debug,harvest=debug,info")
        } else {
            tracing_subscriber::EnvFilter::new("catalog_harvester=info,harvest=info,warn")
        }
    });

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<HarvesterConfig> {
    let config = HarvesterConfig::from_file(path)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration: {}", path.display()))?;
    Ok(config)
}

async fn run(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let _lock = PidLock::acquire(&config.lock_dir(), &config.harvester_name)?;

    tracing::info!(
        harvester = %config.harvester_name,
        source = %config.source_name,
        kind = %config.source,
        "Harvesting"
    );

    let store = open_sqlite_store(&config.database)
        .with_context(|| format!("Failed to open store: {}", config.database.display()))?;
    let harvester = Harvester::from_config(&config, store)?;
    let report = match harvester.run().await {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(
                harvester = %config.harvester_name,
                category = err.category().as_str(),
                recoverable = err.is_recoverable(),
                error = %err,
                "Harvest failed"
            );
            return Err(anyhow::Error::new(err)
                .context(format!("Harvest `{}` failed", config.harvester_name)));
        }
    };

    println!(
        "{}: {} pages, {} entries, {} new, {} duplicates (from {}){}",
        config.harvester_name,
        report.pages,
        report.entries,
        report.inserted,
        report.duplicates,
        report.start_date,
        if report.page_limit_reached {
            ", page limit reached"
        } else {
            ""
        }
    );
    Ok(())
}

fn stats(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let store = open_sqlite_store(&config.database)
        .with_context(|| format!("Failed to open store: {}", config.database.display()))?;
    let stats = store.stats(&config.harvester_name)?;

    println!("Harvester:      {}", config.harvester_name);
    println!("Records:        {}", stats.records);
    println!(
        "Latest source:  {}",
        stats.latest_source_date.as_deref().unwrap_or("-")
    );
    println!(
        "Latest harvest: {}",
        stats
            .latest_harvest_date
            .map_or_else(|| "-".to_string(), |d| d.to_rfc3339())
    );
    Ok(())
}

fn export(path: &Path, since: Option<DateTime<Utc>>, limit: usize) -> Result<()> {
    let config = load_config(path)?;
    let store = open_sqlite_store(&config.database)
        .with_context(|| format!("Failed to open store: {}", config.database.display()))?;

    for record in store.harvested_since(&config.harvester_name, since, limit)? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}
