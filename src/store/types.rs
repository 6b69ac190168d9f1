//! Persisted records for the wallet store
//!
//! Defines wallet rows, transaction records and the on-disk document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Address, Keypair, SigningKey, Sun, TransactionRecordId, WalletId};

/// Current on-disk document format version
pub const STORE_FORMAT_VERSION: &str = "1.0";

/// Generated deposit wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    /// Sequential row id
    pub id: WalletId,

    /// Deposit address (unique across the store)
    pub address: Address,

    /// Private key for the deposit address
    pub signing_key: SigningKey,

    /// When the wallet was generated
    pub created_at: DateTime<Utc>,
}

impl WalletRecord {
    pub fn keypair(&self) -> Keypair {
        Keypair::new(self.address.clone(), self.signing_key.clone())
    }

    pub fn summary(&self) -> WalletSummary {
        WalletSummary {
            id: self.id,
            address: self.address.clone(),
            created_at: self.created_at,
        }
    }
}

/// Wallet row without key material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub id: WalletId,
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

/// Record of a sweep transfer that was submitted and confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Sequential record id
    pub id: TransactionRecordId,

    /// Swept deposit wallet
    pub wallet: Address,

    /// Amount moved to the treasury
    pub amount: Sun,

    /// When the record was written
    pub timestamp: DateTime<Utc>,

    /// Whether the payment webhook was accepted for this (wallet, amount)
    #[serde(default)]
    pub notification_sent: bool,

    /// Sweep transaction id, when the gateway returned one
    #[serde(default)]
    pub txid: Option<String>,
}

/// Sweep transfer handed to the network whose outcome is not yet known
///
/// Kept until a later cycle resolves it into a record or discards it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSweep {
    pub wallet: Address,

    /// Balance observed at detection
    pub amount: Sun,

    /// Transaction id, when the broadcast was acknowledged
    #[serde(default)]
    pub txid: Option<String>,

    /// Whether the webhook for this detection was accepted
    #[serde(default)]
    pub notify_delivered: bool,

    pub submitted_at: DateTime<Utc>,
}

/// Wallets and transaction log, as read by the status view
#[derive(Debug, Clone, Default)]
pub struct LedgerView {
    pub wallets: Vec<WalletSummary>,
    pub transactions: Vec<TransactionRecord>,
}

/// Whole store document as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocument {
    /// Format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Next wallet id to assign
    pub next_wallet_id: u64,

    /// Next transaction record id to assign
    pub next_record_id: u64,

    /// Wallet rows, insertion order
    #[serde(default)]
    pub wallets: Vec<WalletRecord>,

    /// Transaction log, append order
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,

    /// Unresolved sweeps, at most one per wallet
    #[serde(default)]
    pub pending_sweeps: Vec<PendingSweep>,
}

fn default_version() -> String {
    STORE_FORMAT_VERSION.to_string()
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: default_version(),
            next_wallet_id: 1,
            next_record_id: 1,
            wallets: Vec::new(),
            transactions: Vec::new(),
            pending_sweeps: Vec::new(),
        }
    }
}

impl StoreDocument {
    /// Bring id counters past any ids already present
    pub fn normalize(&mut self) {
        let max_wallet = self.wallets.iter().map(|w| w.id.0).max().unwrap_or(0);
        let max_record = self.transactions.iter().map(|t| t.id.0).max().unwrap_or(0);
        self.next_wallet_id = self.next_wallet_id.max(max_wallet + 1);
        self.next_record_id = self.next_record_id.max(max_record + 1);
    }

    pub fn contains_address(&self, address: &Address) -> bool {
        self.wallets.iter().any(|w| &w.address == address)
    }

    pub fn pending_for(&self, wallet: &Address) -> Option<&PendingSweep> {
        self.pending_sweeps.iter().find(|p| &p.wallet == wallet)
    }

    /// Drop the pending sweep for `wallet`. Returns whether one existed.
    pub fn remove_pending(&mut self, wallet: &Address) -> bool {
        let before = self.pending_sweeps.len();
        self.pending_sweeps.retain(|p| &p.wallet != wallet);
        self.pending_sweeps.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults_on_older_documents() {
        let json = r#"{
            "id": 3,
            "wallet": "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8",
            "amount": 50000000,
            "timestamp": "2025-01-01T00:00:00Z"
        }"#;

        let record: TransactionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, TransactionRecordId(3));
        assert_eq!(record.amount, Sun::from_trx(50));
        assert!(!record.notification_sent);
        assert!(record.txid.is_none());
    }

    #[test]
    fn test_normalize_moves_counters_forward() {
        let mut doc = StoreDocument {
            next_wallet_id: 1,
            next_record_id: 1,
            wallets: vec![WalletRecord {
                id: WalletId(7),
                address: Address::new("TA"),
                signing_key: SigningKey::new("00"),
                created_at: Utc::now(),
            }],
            ..Default::default()
        };

        doc.normalize();
        assert_eq!(doc.next_wallet_id, 8);
        assert_eq!(doc.next_record_id, 1);
    }

    #[test]
    fn test_wallet_summary_has_no_key() {
        let record = WalletRecord {
            id: WalletId(1),
            address: Address::new("TA"),
            signing_key: SigningKey::new("secret"),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&record.summary()).unwrap();
        assert!(!json.contains("secret"));
    }
}
