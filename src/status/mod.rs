//! Read-only status view
//!
//! Lists deposit wallets and the transaction log without exposing key
//! material. Served over HTTP by [`server`] and printed by the CLI.

pub mod server;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::store::WalletStore;
use crate::types::{Address, Sun, TransactionRecordId, WalletId};

/// Wallet as shown in the status view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletView {
    pub id: WalletId,
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

/// Transaction record as shown in the status view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionView {
    pub id: TransactionRecordId,
    pub wallet: Address,
    /// TRX amount as a decimal string
    pub amount: String,
    pub amount_sun: u64,
    pub timestamp: DateTime<Utc>,
    pub notification_sent: bool,
    pub txid: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub wallets: Vec<WalletView>,
    /// Most recent first
    pub transactions: Vec<TransactionView>,
    pub total_swept: String,
    pub total_swept_sun: u64,
    /// Records whose webhook was never accepted
    pub pending_notifications: usize,
}

impl StatusSnapshot {
    /// Keep only the `limit` most recent transactions
    pub fn truncate_transactions(&mut self, limit: usize) {
        self.transactions.truncate(limit);
    }
}

/// Builds status snapshots from the store
pub struct StatusReader {
    store: Arc<dyn WalletStore>,
}

impl StatusReader {
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self { store }
    }

    pub async fn snapshot(&self) -> Result<StatusSnapshot> {
        let ledger = self.store.list_wallets_with_transactions().await?;

        let wallets = ledger
            .wallets
            .into_iter()
            .map(|w| WalletView {
                id: w.id,
                address: w.address,
                created_at: w.created_at,
            })
            .collect();

        let total_swept = ledger
            .transactions
            .iter()
            .fold(Sun::ZERO, |acc, t| acc.saturating_add(t.amount));
        let pending_notifications = ledger
            .transactions
            .iter()
            .filter(|t| !t.notification_sent)
            .count();

        let mut transactions: Vec<TransactionView> = ledger
            .transactions
            .into_iter()
            .map(|t| TransactionView {
                id: t.id,
                wallet: t.wallet,
                amount: t.amount.to_string(),
                amount_sun: t.amount.as_u64(),
                timestamp: t.timestamp,
                notification_sent: t.notification_sent,
                txid: t.txid,
            })
            .collect();
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        Ok(StatusSnapshot {
            wallets,
            transactions,
            total_swept: total_swept.to_string(),
            total_swept_sun: total_swept.as_u64(),
            pending_notifications,
        })
    }
}
