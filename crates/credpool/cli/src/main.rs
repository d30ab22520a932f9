//! Operator CLI for the credpool inventory engine.
//!
//! Stands in for the chat command interface: logs the operator into the
//! session gate, then delegates to the pool service and prints the same
//! replies a chat surface would show.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use credpool_service::{render, PoolConfig, PoolService, ServiceError};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "credpool", about = "Shared credential inventory and dispensing engine")]
#[command(version)]
struct Cli {
    /// Path to the service configuration file.
    #[arg(long, global = true, default_value = "credpool.toml")]
    config: PathBuf,

    /// Operator identity recorded on contributed records.
    #[arg(long, global = true, default_value = "operator")]
    operator: String,

    /// Gate passphrase; required for everything except `init`.
    #[arg(long, global = true, env = "CREDPOOL_PASSPHRASE")]
    passphrase: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and header-only ledger files.
    Init,

    /// List known categories.
    Categories,

    /// Count available records, for one category or all of them.
    Count {
        #[arg(long)]
        category: Option<String>,
    },

    /// Add one identifier:secret record to a category's pool.
    Add { category: String, record: String },

    /// Draw one record at random and move it to the archive.
    Dispense { category: String },

    /// Show a category's archive of dispensed records.
    Archive { category: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = PoolConfig::load(&cli.config).map_err(reply)?;
    let data_dir = config.data_dir.clone();
    let service = PoolService::bootstrap(config).await.map_err(reply)?;

    if !matches!(cli.command, Commands::Init) {
        let passphrase = cli
            .passphrase
            .as_deref()
            .context("a passphrase is required (--passphrase or CREDPOOL_PASSPHRASE)")?;
        service
            .login(&cli.operator, &cli.operator, passphrase)
            .map_err(reply)?;
    }

    match cli.command {
        Commands::Init => {
            println!("Initialized ledger files under {}.", data_dir.display());
        }
        Commands::Categories => {
            let names = service.list_categories(&cli.operator).map_err(reply)?;
            println!("{}", render::categories(&names));
        }
        Commands::Count { category: Some(category) } => {
            let count = service.count(&cli.operator, &category).await.map_err(reply)?;
            println!("{category}: {count}");
        }
        Commands::Count { category: None } => {
            let mut entries = Vec::new();
            for category in service.list_categories(&cli.operator).map_err(reply)? {
                let count = service
                    .count(&cli.operator, category.as_str())
                    .await
                    .map_err(reply)?;
                entries.push((category, count));
            }
            println!("{}", render::counts(&entries));
        }
        Commands::Add { category, record } => {
            let count = service
                .add(&cli.operator, &category, &record)
                .await
                .map_err(reply)?;
            println!("{}", render::added(&category, count));
        }
        Commands::Dispense { category } => {
            let record = service
                .dispense(&cli.operator, &category)
                .await
                .map_err(reply)?;
            println!("{}", render::dispensed(&category, &record));
        }
        Commands::Archive { category } => {
            let archive = service
                .archive(&cli.operator, &category)
                .await
                .map_err(reply)?;
            if archive.is_empty() {
                println!("Nothing dispensed from {category} yet.");
            }
            for record in archive {
                println!(
                    "{}\t{}\t{}",
                    record.account,
                    record.added_by,
                    record.dispensed_at.to_rfc3339()
                );
            }
        }
    }

    Ok(())
}

fn reply(err: ServiceError) -> anyhow::Error {
    anyhow!("{}", render::failure(&err))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credpool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}
