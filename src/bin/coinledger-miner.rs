#![forbid(unsafe_code)]
//! Miner: repeatedly extends the chain tip of a running node and collects rewards

use clap::Parser;
use coinledger::blockchain::ProposedBlock;
use coinledger::client::NodeClient;
use coinledger::config::load_config;
use coinledger::crypto::validate_address;
use colored::*;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about = "Mine blocks against a CoinLedger node", long_about = None)]
struct Cli {
    /// Address credited with block rewards
    #[arg(long)]
    address: String,

    /// Node URL (overrides client.node_url)
    #[arg(long)]
    node: Option<String>,

    /// Stop after this many accepted blocks (0 mines forever)
    #[arg(long, default_value_t = 0)]
    blocks: u64,

    /// Pause between attempts
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
}

fn fresh_nonce(attempt: u64) -> String {
    let now = chrono::Utc::now();
    format!(
        "{}-{}-{}",
        now.timestamp(),
        now.timestamp_subsec_nanos(),
        attempt
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    validate_address(&cli.address)?;

    let node_url = match cli.node {
        Some(url) => url,
        None => load_config()?.client.node_url,
    };
    let client = NodeClient::new(node_url);
    let interval = Duration::from_millis(cli.interval_ms);

    println!(
        "{} {} -> {}",
        "Mining for".bright_cyan(),
        cli.address.bright_white().bold(),
        client.base_url()
    );

    let mut mined = 0u64;
    let mut attempt = 0u64;
    while cli.blocks == 0 || mined < cli.blocks {
        attempt += 1;
        let tip = client.latest_block_hash().await?;
        let proposed = ProposedBlock::mine(&tip, &cli.address, &fresh_nonce(attempt));

        match client.submit_block(&proposed).await {
            Ok(()) => {
                mined += 1;
                let balance = client.get_address(&cli.address).await?;
                println!("SUCCESS:{}:{}", balance.address, balance.balance);
            }
            Err(e) if e.is_chain_mismatch() => {
                tracing::warn!(
                    "Chain moved on before block {} landed, retrying",
                    proposed.content_hash
                );
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        if cli.blocks == 0 || mined < cli.blocks {
            tokio::time::sleep(interval).await;
        }
    }

    println!("{} {} blocks", "Done:".bright_green().bold(), mined);
    Ok(())
}
