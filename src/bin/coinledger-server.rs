#![forbid(unsafe_code)]
//! HTTP server for a CoinLedger node

use clap::Parser;
use coinledger::api::{run_api_server, Node};
use coinledger::config::{load_config_from, DEFAULT_CONFIG_PATH};
use coinledger::ledger::Ledger;
use coinledger::persistence::Database;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about = "Serve a CoinLedger node over HTTP", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// SQLite database path (overrides database.path)
    #[arg(long)]
    db: Option<String>,

    /// Delete the database and start a fresh chain
    #[arg(short = 'o', long)]
    overwrite: bool,

    /// Port to listen on (overrides server.port)
    #[arg(long)]
    port: Option<u16>,
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = load_config_from(&cli.config)?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.database.overwrite |= cli.overwrite;
    config.validate()?;

    let db_path = config.database.path.clone();
    let db = if config.database.overwrite {
        tracing::warn!("Overwriting database at {}", db_path);
        Database::create_fresh(&db_path)?
    } else {
        Database::open(&db_path)?
    };
    tracing::info!("Opened database at {}", db_path);

    let ledger = Ledger::new(Box::new(db));
    ledger.seed_genesis()?;
    ledger.verify_chain()?;
    tracing::info!(
        "Chain ready: {} blocks, total supply {}",
        ledger.list_blocks()?.len(),
        ledger.total_supply()?
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    let node = Arc::new(Node::new(ledger));
    run_api_server(node, listener, shutdown_signal()).await
}
