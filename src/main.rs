//! Wallet Score - deterministic wallet reputation scoring
//!
//! Reads a lending-protocol transaction feed, aggregates per-wallet features,
//! normalizes them against the population and writes an integer score in [0, 1000]
//! for every wallet.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

// Use the library crate
use wallet_credit_score::cli::commands;
use wallet_credit_score::config::Config;

/// Wallet Score - reputation scores from transaction history
#[derive(Parser)]
#[command(name = "wallet-score")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "wallet-score.toml")]
    config: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit normalization on the feed and score every wallet
    Run {
        /// Transaction feed (overrides input.path)
        #[arg(short, long)]
        input: Option<String>,

        /// Output directory (overrides output.dir)
        #[arg(short, long)]
        output_dir: Option<String>,
    },

    /// Score the feed with a previously saved normalization state
    Rescore {
        /// Normalization state written by `run`
        #[arg(long)]
        state: PathBuf,

        /// Transaction feed (overrides input.path)
        #[arg(short, long)]
        input: Option<String>,

        /// Output directory (overrides output.dir)
        #[arg(short, long)]
        output_dir: Option<String>,
    },

    /// Print a saved normalization state
    InspectState {
        /// Path to the state file
        path: PathBuf,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("wallet_credit_score=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    }

    // Load configuration
    let mut config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run { input, output_dir } => {
            apply_overrides(&mut config, input, output_dir);
            commands::run(&config).await
        }
        Commands::Rescore {
            state,
            input,
            output_dir,
        } => {
            apply_overrides(&mut config, input, output_dir);
            commands::rescore(&config, &state).await
        }
        Commands::InspectState { path } => commands::inspect_state(&path).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        let code = e
            .downcast_ref::<wallet_credit_score::Error>()
            .map(|err| err.exit_code())
            .unwrap_or(1);
        std::process::exit(code);
    }

    Ok(())
}

/// Apply command-line path overrides on top of the loaded configuration
fn apply_overrides(config: &mut Config, input: Option<String>, output_dir: Option<String>) {
    if let Some(input) = input {
        config.input.path = input;
    }
    if let Some(dir) = output_dir {
        config.output.dir = dir;
    }
}
