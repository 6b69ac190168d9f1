//! Wallet store
//!
//! Durable ownership record for deposit wallets and the append-only
//! transaction log. The store is the single source of truth for the sweep
//! engine; every write is on disk before the call returns.
//!
//! Callers share one `Arc<dyn WalletStore>`; the implementation serializes
//! concurrent access itself, including access from other processes using
//! the same store.

pub mod file;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Address, Keypair, SigningKey, Sun, TransactionRecordId, WalletId};

pub use file::JsonFileStore;
pub use types::{
    LedgerView, PendingSweep, StoreDocument, TransactionRecord, WalletRecord, WalletSummary,
};

/// Read/write contract over wallets and transaction records
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Persist a new wallet. Fails with `DuplicateAddress` if the address exists.
    async fn create_wallet(&self, address: Address, signing_key: SigningKey) -> Result<WalletId>;

    /// Snapshot of every wallet with its key
    async fn list_wallets(&self) -> Result<Vec<Keypair>>;

    async fn count_wallets(&self) -> Result<usize>;

    /// Append a record for a confirmed sweep transfer. Any pending sweep for
    /// `wallet` is cleared in the same write.
    async fn record_transfer(
        &self,
        wallet: &Address,
        amount: Sun,
        txid: Option<String>,
    ) -> Result<TransactionRecordId>;

    /// Set the notification flag on the most recent unsent record matching
    /// (wallet, amount). Returns `false` when nothing matched.
    async fn mark_notified(&self, wallet: &Address, amount: Sun) -> Result<bool>;

    /// Wallets (without keys) and the full transaction log
    async fn list_wallets_with_transactions(&self) -> Result<LedgerView>;

    /// Remember a sweep whose outcome is unknown, replacing any earlier one
    /// for the same wallet
    async fn save_pending_sweep(&self, pending: PendingSweep) -> Result<()>;

    async fn pending_sweep(&self, wallet: &Address) -> Result<Option<PendingSweep>>;

    /// Forget an unresolved sweep that never landed
    async fn clear_pending_sweep(&self, wallet: &Address) -> Result<()>;
}
