mod cli;

use clap::{Parser, Subcommand};
use cli::Repl;
use slipway::db::SqliteDatabase;
use slipway::{EngineConfig, SlipwayService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "slipway")]
#[command(about = "Bet slip validation, pricing and stake reservation server", long_about = None)]
struct Cli {
    /// Engine config file (TOML); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run interactive CLI for local testing
    Cli {
        /// Database URL
        #[arg(short, long, default_value = "sqlite://slipway.db?mode=rwc")]
        database: String,
    },

    /// Run HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Database URL
        #[arg(short, long, default_value = "sqlite://slipway.db?mode=rwc")]
        database: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A corrupt config is a deployment bug; refuse to start
    let config = EngineConfig::load_or_default(cli.config.as_ref())?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_ansi(true)
        .init();

    match cli.command {
        Commands::Cli { database } => run_cli(config, database).await?,
        Commands::Serve { port, database } => run_server(config, port, database).await?,
    }

    Ok(())
}

async fn build_service(
    config: &EngineConfig,
    database: &str,
) -> anyhow::Result<SlipwayService<SqliteDatabase>> {
    let builder = config.slip_builder()?;

    let db = SqliteDatabase::new(database).await?;
    db.run_migrations().await?;

    Ok(SlipwayService::new(Arc::new(db), builder))
}

async fn run_cli(config: EngineConfig, database: String) -> anyhow::Result<()> {
    tracing::info!("Starting Slipway CLI");

    let service = build_service(&config, &database).await?;

    let mut repl = Repl::new(service);
    repl.run().await;

    Ok(())
}

async fn run_server(config: EngineConfig, port: u16, database: String) -> anyhow::Result<()> {
    println!("🔧 Initializing Slipway API server...");
    println!("   Port: {}", port);
    println!("   Database: {}", database);

    tracing::info!(
        min_stake = %config.stake.min,
        max_stake = %config.stake.max,
        teaser_leagues = ?config.teaser.leagues,
        "Engine configured"
    );

    println!("📦 Connecting to database...");
    let service = build_service(&config, &database).await?;
    println!("✅ Database ready!");

    slipway::api::run_server(service, port).await?;

    Ok(())
}
