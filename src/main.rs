//! Ceres Farm Console CLI
//!
//! Run a Ceres farming node and watch rewards accumulate.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ceres_farm_console::commands;
use ceres_farm_console::config::{ConfigStore, ConsoleConfig};

#[derive(Parser)]
#[command(name = "ceres-farm-console")]
#[command(about = "Farming console for the Ceres network")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a reward address and write the configuration
    Init {
        /// Display name for the local node
        #[arg(long)]
        node_name: Option<String>,
    },

    /// Start the node and farmer, then track farmed blocks until Ctrl-C
    Start {
        /// Only track; assume the node is already running
        #[arg(long)]
        no_backend: bool,
    },

    /// Show the farmed-block history
    History {
        /// Maximum number of blocks to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show node peers and sync progress
    Status,

    /// Validate the configuration file
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let config_path = cli.config.unwrap_or_else(ConsoleConfig::default_path);
    let store = ConfigStore::new(config_path);

    match cli.command {
        Commands::Init { node_name } => commands::init::run(&store, node_name).await,
        Commands::Start { no_backend } => commands::start::run(&store, no_backend).await,
        Commands::History { limit } => commands::history::run(&store, limit).await,
        Commands::Status => commands::status::run(&store).await,
        Commands::ValidateConfig => {
            let config = store.read().await?;
            config.validate()?;
            println!("Configuration is valid.");
            println!("  Reward address: {}", display_or_unset(&config.reward_address));
            println!("  Node name:      {}", config.node_name);
            println!("  Node RPC:       {}", config.node_rpc_url);
            println!("  Backend:        {}", config.backend_url);
            println!(
                "  Plot:           {} ({} GiB)",
                config.plot.directory.display(),
                config.plot.size_gib
            );
            println!("  Ledger file:    {}", config.ledger_file.display());
            Ok(())
        }
    }
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}
