//! CLI command definitions
//!
//! Defines the clap commands for the inspector harness CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run YAML test scenario(s) against the mock inspector backend
    Test {
        /// Path(s) to YAML test scenario files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,

        /// Pause every scenario before its first evaluation
        #[arg(long)]
        suspend_on_entry: bool,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file to read instead of the default location
        #[arg(long)]
        file: Option<PathBuf>,
    },
}
