//! Wallet pool management
//!
//! Keeps at least a minimum number of deposit wallets in the store.

use std::sync::Arc;

use tracing::{debug, info};

use crate::chain::ChainGateway;
use crate::error::Result;
use crate::store::WalletStore;

/// Result of an `ensure_pool_size` pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReport {
    /// Wallets present before the pass
    pub previous: usize,
    /// Wallets generated during the pass
    pub created: usize,
    /// Wallets present after the pass
    pub total: usize,
}

/// Generates deposit wallets until the pool reaches its minimum size
pub struct WalletPoolManager {
    store: Arc<dyn WalletStore>,
    chain: Arc<dyn ChainGateway>,
}

impl WalletPoolManager {
    pub fn new(store: Arc<dyn WalletStore>, chain: Arc<dyn ChainGateway>) -> Self {
        Self { store, chain }
    }

    /// Grow the pool to `minimum` wallets. Never removes wallets.
    ///
    /// Stops at the first failure; wallets created before it stay in the
    /// store, so calling again resumes where the batch left off.
    pub async fn ensure_pool_size(&self, minimum: usize) -> Result<PoolReport> {
        let previous = self.store.count_wallets().await?;

        if previous >= minimum {
            debug!("Pool has {} wallets (minimum {})", previous, minimum);
            return Ok(PoolReport {
                previous,
                created: 0,
                total: previous,
            });
        }

        let missing = minimum - previous;
        info!("Pool has {} wallets, generating {} more", previous, missing);

        for _ in 0..missing {
            let keypair = self.chain.generate_keypair().await?;
            let id = self
                .store
                .create_wallet(keypair.address.clone(), keypair.key)
                .await?;
            info!("Created deposit wallet #{}: {}", id, keypair.address);
        }

        let total = self.store.count_wallets().await?;
        info!("Created {} new wallets ({} total)", missing, total);

        Ok(PoolReport {
            previous,
            created: missing,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ResourceKind, TxConfirmation};
    use crate::error::Error;
    use crate::store::JsonFileStore;
    use crate::types::{Address, Keypair, SigningKey, Sun};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Key generator that hands out scripted addresses
    struct ScriptedKeygen {
        addresses: Mutex<Vec<Result<String>>>,
    }

    impl ScriptedKeygen {
        fn new(addresses: Vec<Result<String>>) -> Self {
            Self {
                addresses: Mutex::new(addresses.into_iter().rev().collect()),
            }
        }

        fn sequential(count: usize) -> Self {
            Self::new((0..count).map(|i| Ok(format!("TWallet{}", i))).collect())
        }
    }

    #[async_trait]
    impl ChainGateway for ScriptedKeygen {
        async fn get_balance(&self, _address: &Address) -> Result<Sun> {
            Ok(Sun::ZERO)
        }

        async fn delegate_resource(
            &self,
            _from: &Keypair,
            _to: &Address,
            _quantity: u64,
            _resource: ResourceKind,
        ) -> Result<TxConfirmation> {
            unreachable!("pool manager never delegates")
        }

        async fn transfer(&self, _from: &Keypair, _to: &Address, _amount: Sun) -> Result<TxConfirmation> {
            unreachable!("pool manager never transfers")
        }

        async fn transaction_status(&self, _txid: &str) -> Result<Option<TxConfirmation>> {
            unreachable!("pool manager never submits transactions")
        }

        async fn generate_keypair(&self) -> Result<Keypair> {
            let next = self
                .addresses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(Error::Network("keygen exhausted".to_string())));
            next.map(|a| Keypair::new(Address::new(a), SigningKey::new("00")))
        }
    }

    async fn store_in(dir: &tempfile::TempDir) -> Arc<JsonFileStore> {
        Arc::new(JsonFileStore::open(dir.path().join("wallets.json")).await.unwrap())
    }

    #[tokio::test]
    async fn test_fills_empty_pool() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir).await;
        let manager = WalletPoolManager::new(store.clone(), Arc::new(ScriptedKeygen::sequential(5)));

        let report = manager.ensure_pool_size(5).await.unwrap();
        assert_eq!(report, PoolReport { previous: 0, created: 5, total: 5 });
        assert_eq!(store.count_wallets().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_second_pass_is_noop() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir).await;
        let manager = WalletPoolManager::new(store.clone(), Arc::new(ScriptedKeygen::sequential(3)));

        manager.ensure_pool_size(3).await.unwrap();
        // the keygen is exhausted, so any generation attempt would fail
        let report = manager.ensure_pool_size(3).await.unwrap();

        assert_eq!(report.created, 0);
        assert_eq!(report.total, 3);
    }

    #[tokio::test]
    async fn test_never_shrinks_pool() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir).await;
        let manager = WalletPoolManager::new(store.clone(), Arc::new(ScriptedKeygen::sequential(4)));

        manager.ensure_pool_size(4).await.unwrap();
        let report = manager.ensure_pool_size(2).await.unwrap();

        assert_eq!(report.total, 4);
        assert_eq!(store.count_wallets().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_partial_batch_keeps_created_wallets() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir).await;
        let keygen = ScriptedKeygen::new(vec![
            Ok("TWallet0".to_string()),
            Ok("TWallet1".to_string()),
            Err(Error::Network("node down".to_string())),
        ]);
        let manager = WalletPoolManager::new(store.clone(), Arc::new(keygen));

        let err = manager.ensure_pool_size(5).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(store.count_wallets().await.unwrap(), 2);

        // retry with a working generator finishes the batch
        let manager = WalletPoolManager::new(
            store.clone(),
            Arc::new(ScriptedKeygen::new(
                (2..5).map(|i| Ok(format!("TWallet{}", i))).collect(),
            )),
        );
        let report = manager.ensure_pool_size(5).await.unwrap();
        assert_eq!(report, PoolReport { previous: 2, created: 3, total: 5 });
    }

    #[tokio::test]
    async fn test_duplicate_generated_address_is_rejected() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir).await;
        let keygen = ScriptedKeygen::new(vec![
            Ok("TSame".to_string()),
            Ok("TSame".to_string()),
        ]);
        let manager = WalletPoolManager::new(store.clone(), Arc::new(keygen));

        let err = manager.ensure_pool_size(2).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateAddress(_)));
        assert_eq!(store.count_wallets().await.unwrap(), 1);
    }
}
