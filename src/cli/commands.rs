//! CLI command implementations

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::chain::{ChainGateway, TronHttpGateway};
use crate::config::Config;
use crate::notify::WebhookNotifier;
use crate::pool::WalletPoolManager;
use crate::scheduler::Scheduler;
use crate::status::{server, StatusReader};
use crate::store::{JsonFileStore, WalletStore};
use crate::sweep::{SweepEngine, SweepSettings};

/// Shared components for every command that touches the chain
struct Services {
    store: Arc<JsonFileStore>,
    chain: Arc<TronHttpGateway>,
    notifier: Arc<WebhookNotifier>,
}

impl Services {
    async fn build(config: &Config) -> Result<Self> {
        let store = Arc::new(open_store(config).await?);
        let chain = Arc::new(
            TronHttpGateway::new(&config.chain).context("Failed to initialize TRON gateway")?,
        );
        let notifier = Arc::new(
            WebhookNotifier::new(&config.webhook).context("Failed to initialize webhook")?,
        );

        Ok(Self {
            store,
            chain,
            notifier,
        })
    }

    fn pool_manager(&self) -> WalletPoolManager {
        WalletPoolManager::new(self.store.clone(), self.chain.clone())
    }

    fn engine(&self, config: &Config) -> Arc<SweepEngine> {
        Arc::new(SweepEngine::new(
            self.store.clone(),
            self.chain.clone(),
            self.notifier.clone(),
            SweepSettings::from_config(config),
        ))
    }
}

async fn open_store(config: &Config) -> Result<JsonFileStore> {
    JsonFileStore::open(&config.store.path)
        .await
        .with_context(|| format!("Failed to open wallet store {}", config.store.path))
}

/// Run the sweeper until interrupted
pub async fn run(config: &Config) -> Result<()> {
    info!("Starting deposit sweeper...");
    info!(
        "Treasury: {}, interval: {}s, delegation: {} {}",
        config.treasury.address,
        config.sweep.interval_secs,
        config.sweep.energy_amount,
        config.sweep.resource
    );

    let services = Services::build(config).await?;

    let report = services
        .pool_manager()
        .ensure_pool_size(config.pool.initial_wallet_count)
        .await
        .context("Failed to prepare wallet pool")?;
    info!("Wallet pool ready: {} wallets", report.total);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let status_handle = if config.status.enabled {
        let bind: SocketAddr = config
            .status
            .bind
            .parse()
            .with_context(|| format!("Invalid status.bind: {}", config.status.bind))?;
        let reader = Arc::new(StatusReader::new(services.store.clone()));
        let shutdown_rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server::serve(bind, reader, shutdown_rx).await {
                error!("Status server error: {}", e);
            }
        }))
    } else {
        info!("Status server disabled");
        None
    };

    let scheduler = Scheduler::new(
        services.engine(config),
        Duration::from_secs(config.sweep.interval_secs),
    );
    let shutdown_rx = shutdown_tx.subscribe();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run_continuous(shutdown_rx).await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested, finishing current cycle...");
    let _ = shutdown_tx.send(());

    if let Err(e) = scheduler_handle.await {
        error!("Scheduler task failed: {}", e);
    }
    if let Some(handle) = status_handle {
        if let Err(e) = handle.await {
            error!("Status server task failed: {}", e);
        }
    }

    info!("Deposit sweeper stopped");
    Ok(())
}

/// Run a single sweep cycle and print the outcome
pub async fn once(config: &Config) -> Result<()> {
    let services = Services::build(config).await?;
    services
        .pool_manager()
        .ensure_pool_size(config.pool.initial_wallet_count)
        .await
        .context("Failed to prepare wallet pool")?;

    let scheduler = Scheduler::new(
        services.engine(config),
        Duration::from_secs(config.sweep.interval_secs),
    );

    let report = scheduler.run_once().await?;

    println!("\n=== SWEEP CYCLE ===\n");
    println!("Wallets checked: {}", report.checked);
    println!("Idle:            {}", report.idle);
    println!("Swept:           {} ({} TRX)", report.swept, report.total_swept);
    println!("Notified:        {}", report.notified);
    println!("Failed:          {}", report.failed);
    println!();

    if report.failed > 0 {
        warn!("{} wallets failed; they will be retried next cycle", report.failed);
    }

    Ok(())
}

/// Grow the wallet pool to `count` (or the configured size)
pub async fn ensure_pool(config: &Config, count: Option<usize>) -> Result<()> {
    let minimum = count.unwrap_or(config.pool.initial_wallet_count);
    let services = Services::build(config).await?;

    let report = services.pool_manager().ensure_pool_size(minimum).await?;

    println!("\n=== WALLET POOL ===\n");
    println!("Before:  {}", report.previous);
    println!("Created: {}", report.created);
    println!("Total:   {}", report.total);
    println!();

    Ok(())
}

/// Print wallets and recent transactions
pub async fn status(config: &Config, limit: usize) -> Result<()> {
    let store = Arc::new(open_store(config).await?);
    let mut snapshot = StatusReader::new(store).snapshot().await?;
    let total_records = snapshot.transactions.len();
    snapshot.truncate_transactions(limit);

    println!("\n=== DEPOSIT WALLETS ===\n");
    if snapshot.wallets.is_empty() {
        println!("No wallets.");
    } else {
        println!("{:<6} {:<36} {}", "ID", "ADDRESS", "CREATED");
        println!("{}", "-".repeat(65));
        for wallet in &snapshot.wallets {
            println!(
                "{:<6} {:<36} {}",
                wallet.id,
                wallet.address,
                wallet.created_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    println!("\n=== TRANSACTIONS ===\n");
    if snapshot.transactions.is_empty() {
        println!("No transactions.");
    } else {
        println!(
            "{:<6} {:<17} {:<16} {:<16} {}",
            "ID", "DATE", "WALLET", "AMOUNT (TRX)", "NOTIFIED"
        );
        println!("{}", "-".repeat(65));
        for record in &snapshot.transactions {
            println!(
                "{:<6} {:<17} {:<16} {:<16} {}",
                record.id,
                record.timestamp.format("%Y-%m-%d %H:%M"),
                record.wallet.truncated(),
                record.amount,
                if record.notification_sent { "yes" } else { "no" }
            );
        }
        if total_records > snapshot.transactions.len() {
            println!("... {} older records", total_records - snapshot.transactions.len());
        }
    }

    println!("\nTotal swept: {} TRX", snapshot.total_swept);
    println!("Pending notifications: {}", snapshot.pending_notifications);
    println!();

    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check the store and the TRON node
pub async fn health(config: &Config) -> Result<()> {
    println!("\n=== SYSTEM HEALTH CHECK ===\n");

    let mut all_healthy = true;

    print!("Wallet store... ");
    match open_store(config).await {
        Ok(store) => match store.count_wallets().await {
            Ok(count) => println!("OK ({} wallets)", count),
            Err(e) => {
                println!("FAILED: {}", e);
                all_healthy = false;
            }
        },
        Err(e) => {
            println!("FAILED: {:#}", e);
            all_healthy = false;
        }
    }

    print!("TRON node... ");
    match check_chain(config).await {
        Ok((latency, balance)) => {
            println!("OK ({}ms, treasury balance: {} TRX)", latency, balance)
        }
        Err(e) => {
            println!("FAILED: {:#}", e);
            all_healthy = false;
        }
    }

    println!();
    if all_healthy {
        println!("All systems healthy");
        Ok(())
    } else {
        anyhow::bail!("Health check failed")
    }
}

async fn check_chain(config: &Config) -> Result<(u128, crate::types::Sun)> {
    let chain = TronHttpGateway::new(&config.chain)?;
    let started = Instant::now();
    let balance = chain.get_balance(&config.treasury.address()).await?;
    Ok((started.elapsed().as_millis(), balance))
}
