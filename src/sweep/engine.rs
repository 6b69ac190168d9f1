//! Sweep engine
//!
//! Runs the per-wallet detect → notify → delegate → sweep sequence against
//! every wallet in the store. Failures are contained per wallet; only a store
//! that cannot list wallets aborts a cycle.
//!
//! A transfer that may have been broadcast but was never confirmed is kept
//! as a pending sweep. The wallet's next cycle looks it up before anything
//! else and records it, waits on it, or discards it once expired.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::{CycleReport, SweepSettings, SweepStage, WalletOutcome};
use crate::chain::ChainGateway;
use crate::error::{Error, Result};
use crate::notify::NotificationSink;
use crate::store::{PendingSweep, WalletStore};
use crate::types::{Address, Keypair, Sun};

/// Monitors the pool and sweeps detected deposits into the treasury
pub struct SweepEngine {
    store: Arc<dyn WalletStore>,
    chain: Arc<dyn ChainGateway>,
    notifier: Arc<dyn NotificationSink>,
    settings: SweepSettings,
}

impl SweepEngine {
    pub fn new(
        store: Arc<dyn WalletStore>,
        chain: Arc<dyn ChainGateway>,
        notifier: Arc<dyn NotificationSink>,
        settings: SweepSettings,
    ) -> Self {
        Self {
            store,
            chain,
            notifier,
            settings,
        }
    }

    /// Check every wallet once, sequentially
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let wallets = self.store.list_wallets().await?;
        debug!("Checking {} wallets", wallets.len());

        let mut report = CycleReport::default();
        for wallet in &wallets {
            let span = info_span!("wallet", address = %wallet.address);
            let outcome = self.process_wallet(wallet).instrument(span).await;
            report.record(&outcome);
        }

        Ok(report)
    }

    /// Run the full sequence for one wallet
    pub async fn process_wallet(&self, wallet: &Keypair) -> WalletOutcome {
        match self.store.pending_sweep(&wallet.address).await {
            Ok(Some(pending)) => {
                if let Some(outcome) = self.resolve_pending(wallet, pending).await {
                    return outcome;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Could not read pending sweep for {}: {}", wallet.address, e);
                return WalletOutcome::Failed {
                    stage: SweepStage::Idle,
                    amount: None,
                    error: e,
                };
            }
        }

        let treasury = &self.settings.treasury;

        let balance = match self.bounded(self.chain.get_balance(&wallet.address)).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!("Balance check failed for {}: {}", wallet.address, e);
                return WalletOutcome::Failed {
                    stage: SweepStage::Idle,
                    amount: None,
                    error: e,
                };
            }
        };

        if balance.is_zero() {
            return WalletOutcome::Idle;
        }

        info!(wallet = %wallet.address, amount = %balance, "Payment received: {} TRX", balance);

        // Webhook failures never block fund recovery
        let delivered = match self
            .bounded(self.notifier.deliver(&wallet.address, balance))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(wallet = %wallet.address, amount = %balance, "Webhook delivery failed: {}", e);
                false
            }
        };

        // A wallet may still hold resources from an earlier delegation
        let delegated = match self
            .bounded(self.chain.delegate_resource(
                treasury,
                &wallet.address,
                self.settings.delegation_amount,
                self.settings.resource,
            ))
            .await
        {
            Ok(confirmation) => {
                debug!("Delegation confirmed: {}", confirmation.txid);
                true
            }
            Err(e) => {
                warn!(
                    wallet = %wallet.address,
                    "Delegation of {} {} failed, attempting sweep anyway: {}",
                    self.settings.delegation_amount, self.settings.resource, e
                );
                false
            }
        };

        let completed = if delegated {
            SweepStage::Delegated
        } else if delivered {
            SweepStage::Notified
        } else {
            SweepStage::BalanceChecked
        };

        // Sweep the balance observed at detection
        let confirmation = match self
            .bounded(self.chain.transfer(wallet, &treasury.address, balance))
            .await
        {
            Ok(confirmation) => confirmation,
            Err(e) => {
                match &e {
                    Error::Unconfirmed { txid, .. } => {
                        self.remember_unconfirmed(wallet, balance, Some(txid.clone()), delivered, &e)
                            .await;
                    }
                    // Cancelled mid-call, the broadcast may have happened
                    Error::Timeout(_) => {
                        self.remember_unconfirmed(wallet, balance, None, delivered, &e)
                            .await;
                    }
                    _ if e.is_retryable() => warn!(
                        wallet = %wallet.address,
                        amount = %balance,
                        "Sweep failed, will retry next cycle: {}", e
                    ),
                    _ => error!(
                        wallet = %wallet.address,
                        amount = %balance,
                        "Sweep rejected by the network: {}", e
                    ),
                }
                return WalletOutcome::Failed {
                    stage: completed,
                    amount: Some(balance),
                    error: e,
                };
            }
        };

        self.finish_sweep(
            &wallet.address,
            balance,
            Some(confirmation.txid),
            delivered,
            delegated,
        )
        .await
    }

    /// Record a landed transfer and set its notification flag.
    async fn finish_sweep(
        &self,
        wallet: &Address,
        amount: Sun,
        txid: Option<String>,
        delivered: bool,
        delegated: bool,
    ) -> WalletOutcome {
        let txid_label = txid.as_deref().unwrap_or("unknown");

        let record_id = match self.store.record_transfer(wallet, amount, txid.clone()).await {
            Ok(id) => id,
            Err(e) => {
                error!(
                    wallet = %wallet,
                    amount = %amount,
                    txid = %txid_label,
                    "Sweep confirmed but could not be recorded: {}", e
                );
                return WalletOutcome::Failed {
                    stage: SweepStage::Swept,
                    amount: Some(amount),
                    error: e,
                };
            }
        };

        // The flag can only be set once the record exists
        let notified = if delivered {
            match self.store.mark_notified(wallet, amount).await {
                Ok(flipped) => flipped,
                Err(e) => {
                    warn!("Could not mark record #{} as notified: {}", record_id, e);
                    false
                }
            }
        } else {
            false
        };

        info!(
            wallet = %wallet,
            amount = %amount,
            txid = %txid_label,
            "Swept {} TRX to treasury (record #{}, notified: {})",
            amount, record_id, notified
        );

        WalletOutcome::Swept {
            record_id,
            amount,
            txid,
            notified,
            delegated,
        }
    }

    /// Persist a transfer whose outcome is unknown so that a later cycle
    /// records it instead of finding an empty wallet.
    async fn remember_unconfirmed(
        &self,
        wallet: &Keypair,
        amount: Sun,
        txid: Option<String>,
        delivered: bool,
        cause: &Error,
    ) {
        warn!(
            wallet = %wallet.address,
            amount = %amount,
            txid = %txid.as_deref().unwrap_or("unknown"),
            "Sweep outcome unknown, resolving next cycle: {}", cause
        );

        let pending = PendingSweep {
            wallet: wallet.address.clone(),
            amount,
            txid,
            notify_delivered: delivered,
            submitted_at: Utc::now(),
        };
        if let Err(e) = self.store.save_pending_sweep(pending).await {
            error!(
                wallet = %wallet.address,
                amount = %amount,
                "Could not persist unconfirmed sweep: {}", e
            );
        }
    }

    /// Settle an earlier transfer of unknown outcome.
    ///
    /// Returns the wallet's outcome for this cycle, or `None` when the
    /// earlier transfer is known not to have landed and the normal
    /// sequence should run.
    async fn resolve_pending(&self, wallet: &Keypair, pending: PendingSweep) -> Option<WalletOutcome> {
        let resolution = match &pending.txid {
            Some(txid) => match self.bounded(self.chain.transaction_status(txid)).await {
                Ok(Some(confirmation)) => Resolution::Landed(Some(confirmation.txid)),
                Ok(None) => Resolution::Unknown,
                Err(Error::RejectedTransaction(reason)) => {
                    warn!(
                        wallet = %wallet.address,
                        txid = %txid,
                        "Earlier sweep failed on chain: {}", reason
                    );
                    Resolution::Dropped
                }
                Err(e) => return Some(pending_failure(&pending, e)),
            },
            // No txid: the balance tells whether the funds left
            None => match self.bounded(self.chain.get_balance(&wallet.address)).await {
                Ok(balance) if balance < pending.amount => Resolution::Landed(None),
                Ok(_) => Resolution::Unknown,
                Err(e) => return Some(pending_failure(&pending, e)),
            },
        };

        let age = (Utc::now() - pending.submitted_at)
            .to_std()
            .unwrap_or_default();

        match resolution {
            Resolution::Landed(txid) => {
                info!(wallet = %wallet.address, amount = %pending.amount, "Earlier sweep landed");
                Some(
                    self.finish_sweep(
                        &wallet.address,
                        pending.amount,
                        txid.or(pending.txid),
                        pending.notify_delivered,
                        false,
                    )
                    .await,
                )
            }
            Resolution::Unknown if age < self.settings.pending_expiry => {
                debug!("Sweep for {} still unconfirmed after {:?}", wallet.address, age);
                let reason = format!("awaiting inclusion for {}s", age.as_secs());
                Some(pending_failure(
                    &pending,
                    Error::Unconfirmed {
                        txid: pending.txid.clone().unwrap_or_default(),
                        reason,
                    },
                ))
            }
            Resolution::Unknown | Resolution::Dropped => {
                info!(
                    wallet = %wallet.address,
                    amount = %pending.amount,
                    "Earlier sweep never landed, sweeping again"
                );
                match self.store.clear_pending_sweep(&wallet.address).await {
                    Ok(()) => None,
                    Err(e) => Some(pending_failure(&pending, e)),
                }
            }
        }
    }

    /// Apply the configured call timeout to an external call
    async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(self.settings.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.settings.call_timeout.as_millis() as u64)),
        }
    }
}

enum Resolution {
    /// In a block, with the txid when one is known
    Landed(Option<String>),
    /// Failed on chain, funds never left
    Dropped,
    Unknown,
}

fn pending_failure(pending: &PendingSweep, error: Error) -> WalletOutcome {
    WalletOutcome::Failed {
        stage: SweepStage::Idle,
        amount: Some(pending.amount),
        error,
    }
}
