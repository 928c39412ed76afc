// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - admission-controlled, retrying SMS dispatch.
//!
//! This is the binary entry point for the Courier service.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;
mod stats;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Courier - admission-controlled, retrying SMS dispatch.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the dispatch engine and HTTP API (default).
    Serve,
    /// Show daily delivery statistics.
    Stats {
        /// Number of days to show, ending today.
        #[arg(long, default_value_t = 7)]
        days: u32,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration with secrets redacted.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => courier_config::load_and_validate_path(path),
        None => courier_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Stats { days, json } => stats::run_stats(&config, days, json).await,
        Commands::Config => match toml::to_string_pretty(&config.redacted()) {
            Ok(rendered) => {
                print!("{rendered}");
                Ok(())
            }
            Err(e) => Err(courier_core::CourierError::Internal(format!(
                "failed to render configuration: {e}"
            ))),
        },
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["courier"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn parses_stats_flags() {
        let cli =
            Cli::try_parse_from(["courier", "stats", "--days", "3", "--json"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Stats { days: 3, json: true }));

        let cli = Cli::try_parse_from(["courier", "stats"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Stats { days: 7, json: false }));
    }

    #[test]
    fn config_path_is_global() {
        let cli = Cli::try_parse_from(["courier", "config", "--config", "/tmp/c.toml"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Config));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    #[serial_test::serial]
    fn binary_loads_config_defaults() {
        let config = courier_config::load_and_validate().expect("default config should be valid");
        assert_eq!(config.service.name, "courier");
    }
}
