#![forbid(unsafe_code)]
//! Wallet tool: derive your address, check balances, send funds

use clap::{Parser, Subcommand};
use coinledger::client::NodeClient;
use coinledger::config::load_config;
use coinledger::transaction::Transaction;
use coinledger::wallet::Wallet;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Node URL (overrides client.node_url)
    #[arg(long, global = true)]
    node: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shows the balance of an address
    Balance { address: String },
    /// Prints the address controlled by a password
    Address {
        #[arg(long)]
        password: Option<String>,
    },
    /// Sends funds from the address controlled by a password
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        password: Option<String>,
    },
    /// Lists the transactions touching an address
    History { address: String },
}

fn wallet_from(password: Option<String>) -> Result<Wallet, Box<dyn std::error::Error>> {
    let password = match password {
        Some(p) => p,
        None => rpassword::prompt_password("Password: ")?,
    };
    if password.is_empty() {
        return Err("password must not be empty".into());
    }
    Ok(Wallet::from_password(&password))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let node_url = match cli.node {
        Some(url) => url,
        None => load_config()?.client.node_url,
    };
    let client = NodeClient::new(node_url);

    match cli.command {
        Commands::Balance { address } => {
            let balance = client.get_address(&address).await?;
            println!(
                "{} {}",
                balance.address.bright_white(),
                balance.balance.to_string().bright_green().bold()
            );
        }
        Commands::Address { password } => {
            let wallet = wallet_from(password)?;
            println!("{}", wallet.address().bright_white().bold());
        }
        Commands::Send {
            to,
            amount,
            password,
        } => {
            let wallet = wallet_from(password)?;
            let tx = client.create_transaction(wallet.secret(), &to, amount).await?;
            println!(
                "{} #{}: {} -> {} ({})",
                "Sent".bright_green().bold(),
                tx.id,
                tx.sender,
                tx.recipient,
                tx.amount
            );
            let balance = client.get_address(&tx.sender).await?;
            println!("Remaining balance: {}", balance.balance.to_string().bright_cyan());
        }
        Commands::History { address } => {
            let transactions = client.list_address_transactions(&address).await?;
            print_history(&address, &transactions);
        }
    }

    Ok(())
}

fn print_history(address: &str, transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("{}", "No transaction history yet.".yellow());
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            ["Id", "Direction", "Counterparty", "Amount", "Date"]
                .into_iter()
                .map(|h| {
                    Cell::new(h)
                        .fg(TableColor::Cyan)
                        .add_attribute(Attribute::Bold)
                }),
        );

    // Newest first
    for tx in transactions.iter().rev() {
        let (direction, counterparty, color) = if tx.is_mint() {
            ("Mined", "-", TableColor::Magenta)
        } else if tx.sender == tx.recipient {
            ("Self", address, TableColor::Yellow)
        } else if tx.sender == address {
            ("Sent", tx.recipient.as_str(), TableColor::Red)
        } else {
            ("Received", tx.sender.as_str(), TableColor::Green)
        };

        table.add_row(vec![
            Cell::new(format!("#{}", tx.id)).fg(TableColor::White),
            Cell::new(direction).fg(color),
            Cell::new(counterparty).fg(TableColor::White),
            Cell::new(tx.amount).fg(color),
            Cell::new(format_timestamp_short(tx.time)).fg(TableColor::Grey),
        ]);
    }

    println!("{}", table);
    println!("{} transactions", transactions.len().to_string().bold());
}

fn format_timestamp_short(timestamp: i64) -> String {
    use chrono::DateTime;

    if let Some(dt) = DateTime::from_timestamp(timestamp, 0) {
        dt.format("%m/%d %H:%M").to_string()
    } else {
        "Invalid".to_string()
    }
}
