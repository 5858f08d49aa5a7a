//! CLI command handling
//!
//! Dispatches CLI commands and formats their output.

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{paths, Error, Result};
use crate::testing;

/// Dispatch a CLI command
pub fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Test {
            paths,
            verbose,
            suspend_on_entry,
        } => {
            let mut config = Config::load()?;
            config.harness.suspend_on_entry |= suspend_on_entry;

            let mut failed = Vec::new();
            for path in &paths {
                let result = testing::run_scenario(path, &config, verbose)?;
                if !result.passed {
                    failed.push(result);
                }
            }

            if failed.is_empty() {
                println!(
                    "{} {} scenario(s) passed",
                    "✓".green().bold(),
                    paths.len()
                );
                return Ok(());
            }

            println!("\n{}", "Failed scenarios:".red().bold());
            for result in &failed {
                println!(
                    "  {} {} (step {}/{}): {}",
                    "✗".red(),
                    result.name,
                    result.steps_run,
                    result.steps_total,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            Err(Error::TestAssertion(format!(
                "{} of {} scenario(s) failed",
                failed.len(),
                paths.len()
            )))
        }

        Commands::Config { file } => {
            let config = match &file {
                Some(path) => Config::from_file(path)?,
                None => Config::load()?,
            };
            let source = file
                .or_else(paths::config_path)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<defaults>".to_string());

            println!("{} {}", "# Source:".dimmed(), source.dimmed());
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
