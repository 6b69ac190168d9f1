//! In-memory fakes for the chain gateway and the webhook sink

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use deposit_sweeper::chain::{ChainGateway, ResourceKind, TxConfirmation};
use deposit_sweeper::error::{Error, Result};
use deposit_sweeper::notify::NotificationSink;
use deposit_sweeper::store::{JsonFileStore, WalletStore};
use deposit_sweeper::sweep::{SweepEngine, SweepSettings, DEFAULT_PENDING_EXPIRY};
use deposit_sweeper::types::{Address, Keypair, SigningKey, Sun};

pub const TREASURY: &str = "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8";

/// Every call the fake chain received, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    Balance(Address),
    Delegate {
        from: Address,
        to: Address,
        quantity: u64,
        resource: ResourceKind,
    },
    Transfer {
        from: Address,
        to: Address,
        amount: Sun,
    },
    Status(String),
    Generate,
}

/// Chain with in-memory balances. A successful transfer moves funds.
#[derive(Default)]
pub struct FakeChain {
    balances: Mutex<HashMap<Address, Sun>>,
    calls: Mutex<Vec<ChainCall>>,
    pub fail_balance: AtomicBool,
    pub fail_delegate: AtomicBool,
    pub fail_transfer: AtomicBool,
    /// Balance calls never complete while set
    pub stall_balance: AtomicBool,
    /// Transfers move funds but report `Unconfirmed`
    pub unconfirmed_transfer: AtomicBool,
    /// Transfers report `Unconfirmed` and never land
    pub dropped_transfer: AtomicBool,
    /// Transfers move funds, then never return
    pub stall_after_transfer: AtomicBool,
    /// Transactions that made it into a block
    landed: Mutex<HashSet<String>>,
    next_tx: AtomicU64,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit(&self, address: &Address, amount: Sun) {
        let mut balances = self.balances.lock().unwrap();
        let entry = balances.entry(address.clone()).or_insert(Sun::ZERO);
        *entry = entry.saturating_add(amount);
    }

    pub fn balance_of(&self, address: &Address) -> Sun {
        self.balances
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(Sun::ZERO)
    }

    pub fn calls(&self) -> Vec<ChainCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than balance and status lookups
    pub fn side_effects(&self) -> Vec<ChainCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, ChainCall::Balance(_) | ChainCall::Status(_)))
            .collect()
    }

    pub fn transfer_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ChainCall::Transfer { .. }))
            .count()
    }

    fn log(&self, call: ChainCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn confirmation(&self) -> TxConfirmation {
        let n = self.next_tx.fetch_add(1, Ordering::SeqCst);
        TxConfirmation {
            txid: format!("{:064x}", n + 1),
            block_number: Some(1_000 + n),
        }
    }
}

#[async_trait]
impl ChainGateway for FakeChain {
    async fn get_balance(&self, address: &Address) -> Result<Sun> {
        self.log(ChainCall::Balance(address.clone()));
        if self.stall_balance.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(Error::Network("node unreachable".to_string()));
        }
        Ok(self.balance_of(address))
    }

    async fn delegate_resource(
        &self,
        from: &Keypair,
        to: &Address,
        quantity: u64,
        resource: ResourceKind,
    ) -> Result<TxConfirmation> {
        self.log(ChainCall::Delegate {
            from: from.address.clone(),
            to: to.clone(),
            quantity,
            resource,
        });
        if self.fail_delegate.load(Ordering::SeqCst) {
            return Err(Error::RejectedTransaction(
                "insufficient frozen balance".to_string(),
            ));
        }
        Ok(self.confirmation())
    }

    async fn transfer(&self, from: &Keypair, to: &Address, amount: Sun) -> Result<TxConfirmation> {
        self.log(ChainCall::Transfer {
            from: from.address.clone(),
            to: to.clone(),
            amount,
        });
        if self.fail_transfer.load(Ordering::SeqCst) {
            return Err(Error::RejectedTransaction("bandwidth exhausted".to_string()));
        }
        if self.dropped_transfer.load(Ordering::SeqCst) {
            return Err(Error::Unconfirmed {
                txid: self.confirmation().txid,
                reason: "not in a block".to_string(),
            });
        }

        {
            let mut balances = self.balances.lock().unwrap();
            let source = balances.entry(from.address.clone()).or_insert(Sun::ZERO);
            if *source < amount {
                return Err(Error::RejectedTransaction("balance is not sufficient".to_string()));
            }
            *source = Sun(source.as_u64() - amount.as_u64());
            let target = balances.entry(to.clone()).or_insert(Sun::ZERO);
            *target = target.saturating_add(amount);
            drop(balances);
        }

        let confirmation = self.confirmation();
        self.landed.lock().unwrap().insert(confirmation.txid.clone());

        if self.stall_after_transfer.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.unconfirmed_transfer.load(Ordering::SeqCst) {
            return Err(Error::Unconfirmed {
                txid: confirmation.txid,
                reason: "confirmation polling gave up".to_string(),
            });
        }
        Ok(confirmation)
    }

    async fn transaction_status(&self, txid: &str) -> Result<Option<TxConfirmation>> {
        self.log(ChainCall::Status(txid.to_string()));
        if !self.landed.lock().unwrap().contains(txid) {
            return Ok(None);
        }
        Ok(Some(TxConfirmation {
            txid: txid.to_string(),
            block_number: Some(2_000),
        }))
    }

    async fn generate_keypair(&self) -> Result<Keypair> {
        self.log(ChainCall::Generate);
        let n = self.next_tx.fetch_add(1, Ordering::SeqCst);
        Ok(Keypair::new(
            Address::new(format!("TDeposit{:04}", n)),
            SigningKey::new(format!("{:064x}", n)),
        ))
    }
}

/// Webhook sink that records deliveries
#[derive(Default)]
pub struct FakeSink {
    deliveries: Mutex<Vec<(Address, Sun)>>,
    pub reject: AtomicBool,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<(Address, Sun)> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for FakeSink {
    async fn deliver(&self, wallet: &Address, amount: Sun) -> Result<()> {
        self.deliveries.lock().unwrap().push((wallet.clone(), amount));
        if self.reject.load(Ordering::SeqCst) {
            return Err(Error::Notification("webhook returned 503".to_string()));
        }
        Ok(())
    }
}

/// Engine wired to fresh fakes and a temp-dir store
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<JsonFileStore>,
    pub chain: Arc<FakeChain>,
    pub sink: Arc<FakeSink>,
    pub engine: Arc<SweepEngine>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_timeout(Duration::from_secs(5)).await
    }

    pub async fn with_timeout(call_timeout: Duration) -> Self {
        Self::with_settings(settings(call_timeout)).await
    }

    pub async fn with_settings(settings: SweepSettings) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            JsonFileStore::open(dir.path().join("wallets.json"))
                .await
                .unwrap(),
        );
        let chain = Arc::new(FakeChain::new());
        let sink = Arc::new(FakeSink::new());
        let engine = Arc::new(SweepEngine::new(
            store.clone(),
            chain.clone(),
            sink.clone(),
            settings,
        ));

        Self {
            dir,
            store,
            chain,
            sink,
            engine,
        }
    }

    /// Add a deposit wallet to the store
    pub async fn add_wallet(&self, address: &str) -> Keypair {
        let keypair = Keypair::new(Address::new(address), SigningKey::new(format!("key-{}", address)));
        self.store
            .create_wallet(keypair.address.clone(), keypair.key.clone())
            .await
            .unwrap();
        keypair
    }
}

pub fn treasury() -> Address {
    Address::new(TREASURY)
}

pub fn settings(call_timeout: Duration) -> SweepSettings {
    SweepSettings {
        treasury: Keypair::new(treasury(), SigningKey::new("treasury-key")),
        delegation_amount: 100_000,
        resource: ResourceKind::Energy,
        call_timeout,
        pending_expiry: DEFAULT_PENDING_EXPIRY,
    }
}
