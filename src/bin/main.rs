#![forbid(unsafe_code)]

use colored::*;

fn main() {
    println!("{}", "CoinLedger CLI".bright_cyan().bold());
    println!("{}", "--------------".bright_cyan());
    println!();
    println!(
        "{}",
        "This is the main entry point, but most functionality is in separate binaries.".yellow()
    );
    println!(
        "{}",
        "Use 'cargo run --bin <binary_name>' to run a specific command.".yellow()
    );
    println!();
    println!("{}", "Available binaries:".bright_green().underline());
    println!(
        "  - {}  {}",
        "coinledger-server".bright_white(),
        "serve the ledger over HTTP".dimmed()
    );
    println!(
        "  - {}  {}",
        "coinledger-wallet".bright_white(),
        "check balances and send funds".dimmed()
    );
    println!(
        "  - {}   {}",
        "coinledger-miner".bright_white(),
        "mine blocks against a running node".dimmed()
    );
    println!();
    println!("{}", "Example:".bright_green().underline());
    println!("{}", "  cargo run --bin coinledger-server -- --db ledger.db".italic());
}
