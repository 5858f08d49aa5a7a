//! Inspector harness CLI
//!
//! Runs YAML scenarios that drive an inspector session and check the exact
//! protocol transcript it produces.

use clap::Parser;
use commands::Commands;
use inspector_harness::{cli, commands, common::logging};

#[derive(Parser)]
#[command(name = "inspector-harness", about = "Deterministic inspector session test harness")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() {
    logging::init_cli();

    let cli = Cli::parse();

    if let Err(e) = cli::dispatch(cli.command) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
