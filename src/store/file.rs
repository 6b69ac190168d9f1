//! JSON file backed wallet store
//!
//! The whole store is one JSON document. A write builds the next document
//! from a copy, writes it to `<path>.tmp`, fsyncs, renames it over `<path>`
//! and only then swaps it into memory, so a failed write changes nothing.
//!
//! Several processes may share one store (a running sweeper and a
//! `pool ensure` from the CLI). Writers take an exclusive lock on
//! `<path>.lock` and rebuild from the document on disk, and readers reload
//! it, so no process overwrites rows it has not seen.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use fs2::FileExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

use super::types::{LedgerView, PendingSweep, StoreDocument, TransactionRecord, WalletRecord};
use super::WalletStore;
use crate::error::{Error, Result};
use crate::types::{Address, Keypair, SigningKey, Sun, TransactionRecordId, WalletId};

/// Durable store persisted as a single JSON file
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    /// Last document seen on disk, served while the file does not exist yet
    state: RwLock<StoreDocument>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let document = match load_document(&path).await? {
            Some(document) => {
                info!(
                    "Loaded wallet store from {} ({} wallets, {} transactions)",
                    path.display(),
                    document.wallets.len(),
                    document.transactions.len()
                );
                document
            }
            None => {
                info!("No wallet store at {}, starting empty", path.display());
                StoreDocument::default()
            }
        };

        Ok(Self {
            lock_path: sidecar(&path, ".lock"),
            path,
            state: RwLock::new(document),
        })
    }

    /// Reload the document from disk and hand out a read guard on it
    async fn refresh(&self) -> Result<RwLockReadGuard<'_, StoreDocument>> {
        if let Some(document) = load_document(&self.path).await? {
            *self.state.write().await = document;
        }
        Ok(self.state.read().await)
    }

    /// Apply `change` to the latest document and persist it.
    ///
    /// `change` returns its result and whether the document was modified.
    /// The in-process write lock and the cross-process file lock are both
    /// held from the reload until the new document is on disk.
    async fn update<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut StoreDocument) -> Result<(T, bool)> + Send,
        T: Send,
    {
        let mut state = self.state.write().await;
        let _lock = self.lock_exclusive().await?;

        let mut next = match load_document(&self.path).await? {
            Some(document) => document,
            None => state.clone(),
        };

        let (value, changed) = change(&mut next)?;
        if changed {
            self.persist(&next).await?;
        }
        *state = next;
        Ok(value)
    }

    /// Exclusive advisory lock on the sidecar, released when the file drops
    async fn lock_exclusive(&self) -> Result<std::fs::File> {
        let lock_path = self.lock_path.clone();
        let locked = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&lock_path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(|e| Error::Internal(format!("Store lock task failed: {}", e)))?;

        locked.map_err(|e| {
            Error::StorageUnavailable(format!("Failed to lock {}: {}", self.lock_path.display(), e))
        })
    }

    async fn persist(&self, document: &StoreDocument) -> Result<()> {
        let json = serde_json::to_vec_pretty(document)?;
        let temp_path = sidecar(&self.path, ".tmp");

        let unavailable = |action: &str, e: std::io::Error| {
            Error::StorageUnavailable(format!("{} {}: {}", action, temp_path.display(), e))
        };

        // The document holds private keys
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&temp_path)
            .await
            .map_err(|e| unavailable("Failed to create", e))?;
        file.write_all(&json)
            .await
            .map_err(|e| unavailable("Failed to write", e))?;
        file.sync_all()
            .await
            .map_err(|e| unavailable("Failed to fsync", e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::StorageUnavailable(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        debug!("Wallet store persisted to {}", self.path.display());
        Ok(())
    }
}

/// `<path><suffix>`, keeping the full file name
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Read the document at `path`, `None` if there is no file
async fn load_document(path: &Path) -> Result<Option<StoreDocument>> {
    let exists = fs::try_exists(path).await.map_err(|e| {
        Error::StorageUnavailable(format!("Failed to access {}: {}", path.display(), e))
    })?;
    if !exists {
        return Ok(None);
    }

    let content = fs::read_to_string(path).await.map_err(|e| {
        Error::StorageUnavailable(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let mut document: StoreDocument = serde_json::from_str(&content)
        .map_err(|e| Error::Storage(format!("Failed to parse {}: {}", path.display(), e)))?;
    document.normalize();
    Ok(Some(document))
}

#[async_trait]
impl WalletStore for JsonFileStore {
    async fn create_wallet(&self, address: Address, signing_key: SigningKey) -> Result<WalletId> {
        self.update(move |doc| {
            if doc.contains_address(&address) {
                return Err(Error::DuplicateAddress(address.to_string()));
            }

            let id = WalletId(doc.next_wallet_id);
            doc.next_wallet_id += 1;
            doc.wallets.push(WalletRecord {
                id,
                address,
                signing_key,
                created_at: Utc::now(),
            });
            Ok((id, true))
        })
        .await
    }

    async fn list_wallets(&self) -> Result<Vec<Keypair>> {
        let state = self.refresh().await?;
        Ok(state.wallets.iter().map(WalletRecord::keypair).collect())
    }

    async fn count_wallets(&self) -> Result<usize> {
        Ok(self.refresh().await?.wallets.len())
    }

    async fn record_transfer(
        &self,
        wallet: &Address,
        amount: Sun,
        txid: Option<String>,
    ) -> Result<TransactionRecordId> {
        self.update(|doc| {
            let id = TransactionRecordId(doc.next_record_id);
            doc.next_record_id += 1;
            doc.transactions.push(TransactionRecord {
                id,
                wallet: wallet.clone(),
                amount,
                timestamp: Utc::now(),
                notification_sent: false,
                txid,
            });
            doc.remove_pending(wallet);
            Ok((id, true))
        })
        .await
    }

    async fn mark_notified(&self, wallet: &Address, amount: Sun) -> Result<bool> {
        self.update(|doc| {
            let position = doc
                .transactions
                .iter()
                .rposition(|t| &t.wallet == wallet && t.amount == amount && !t.notification_sent);

            let Some(index) = position else {
                debug!("No unsent record for {} / {} TRX", wallet, amount);
                return Ok((false, false));
            };

            doc.transactions[index].notification_sent = true;
            Ok((true, true))
        })
        .await
    }

    async fn list_wallets_with_transactions(&self) -> Result<LedgerView> {
        let state = self.refresh().await?;
        Ok(LedgerView {
            wallets: state.wallets.iter().map(WalletRecord::summary).collect(),
            transactions: state.transactions.clone(),
        })
    }

    async fn save_pending_sweep(&self, pending: PendingSweep) -> Result<()> {
        self.update(move |doc| {
            doc.remove_pending(&pending.wallet);
            doc.pending_sweeps.push(pending);
            Ok(((), true))
        })
        .await
    }

    async fn pending_sweep(&self, wallet: &Address) -> Result<Option<PendingSweep>> {
        Ok(self.refresh().await?.pending_for(wallet).cloned())
    }

    async fn clear_pending_sweep(&self, wallet: &Address) -> Result<()> {
        self.update(|doc| {
            let removed = doc.remove_pending(wallet);
            Ok(((), removed))
        })
        .await
    }
}
