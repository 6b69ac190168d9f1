//! TRON Deposit Sweeper - watches generated deposit wallets and sweeps
//! incoming TRX into a treasury wallet
//!
//! # WARNING
//! - The wallet store holds private keys in plain text. Keep it mode 600.
//! - Sweeps move real funds. Check the treasury address before running.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

// Use the library crate
use deposit_sweeper::cli::commands;
use deposit_sweeper::config::Config;

/// TRON deposit sweeper
#[derive(Parser)]
#[command(name = "sweeper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "sweeper.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the wallet pool and sweep continuously
    Run,

    /// Run a single sweep cycle and exit
    Once,

    /// Wallet pool management
    Pool {
        #[command(subcommand)]
        action: PoolAction,
    },

    /// Show wallets and recent transactions
    Status {
        /// Number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Check system health (store, TRON node)
    Health,
}

#[derive(Subcommand)]
enum PoolAction {
    /// Generate wallets until the pool reaches the minimum size
    Ensure {
        /// Minimum pool size (default: pool.initial_wallet_count)
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("deposit_sweeper=info".parse()?),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Perform startup checks
    if let Err(e) = startup_checks(&config) {
        error!("Startup checks failed: {}", e);
        std::process::exit(1);
    }

    // Execute command
    let result = match cli.command {
        Commands::Run => commands::run(&config).await,
        Commands::Once => commands::once(&config).await,
        Commands::Pool { action } => match action {
            PoolAction::Ensure { count } => commands::ensure_pool(&config, count).await,
        },
        Commands::Status { limit } => commands::status(&config, limit).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Perform startup safety checks
fn startup_checks(config: &Config) -> Result<()> {
    info!("Performing startup checks...");

    let store_path = std::path::Path::new(&config.store.path);

    // Check store permissions (Unix only)
    #[cfg(unix)]
    if store_path.exists() {
        use std::os::unix::fs::PermissionsExt;

        let metadata = std::fs::metadata(store_path).map_err(|e| {
            anyhow::anyhow!("Cannot read wallet store {}: {}", store_path.display(), e)
        })?;
        let mode = metadata.permissions().mode();

        // Readable by group or others
        if mode & 0o077 != 0 {
            return Err(anyhow::anyhow!(
                "Wallet store {} has insecure permissions {:o}. \
                 Run 'chmod 600 {}' to fix. \
                 The sweeper refuses to run with world-readable private keys.",
                store_path.display(),
                mode & 0o777,
                store_path.display()
            ));
        }

        info!("Wallet store permissions OK");
    }

    if !store_path.exists() {
        warn!(
            "Wallet store {} does not exist yet; it will be created",
            store_path.display()
        );
    }

    if config.chain.api_key.is_empty() {
        warn!("No TRON API key configured; public endpoints are rate limited");
    }

    info!("Startup checks passed");
    Ok(())
}
