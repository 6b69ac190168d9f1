//! Chain gateway
//!
//! Capability interface over the TRON network: balance lookup, resource
//! delegation, transfers and key generation. The sweep engine and pool
//! manager only see this trait.

pub mod tron;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::types::{Address, Keypair, Sun};

pub use tron::TronHttpGateway;

/// Resource a treasury can delegate to another address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[default]
    Energy,
    Bandwidth,
}

impl ResourceKind {
    /// Name used by the node API
    pub fn as_api_str(&self) -> &'static str {
        match self {
            ResourceKind::Energy => "ENERGY",
            ResourceKind::Bandwidth => "BANDWIDTH",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Energy => write!(f, "energy"),
            ResourceKind::Bandwidth => write!(f, "bandwidth"),
        }
    }
}

/// Confirmed on-chain transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxConfirmation {
    /// Transaction id (hex)
    pub txid: String,

    /// Block the transaction landed in, when reported
    pub block_number: Option<u64>,
}

/// Operations the sweeper needs from the network
///
/// Every call may fail with `Error::Network` or `Error::RejectedTransaction`.
/// A transaction-submitting call that was broadcast but not seen in a block
/// fails with `Error::Unconfirmed`, carrying the txid.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Current native balance of `address`
    async fn get_balance(&self, address: &Address) -> Result<Sun>;

    /// Delegate `quantity` of `resource` from `from` to `to`, signed by `from`
    async fn delegate_resource(
        &self,
        from: &Keypair,
        to: &Address,
        quantity: u64,
        resource: ResourceKind,
    ) -> Result<TxConfirmation>;

    /// Transfer `amount` from `from` to `to`, signed by `from`
    async fn transfer(&self, from: &Keypair, to: &Address, amount: Sun) -> Result<TxConfirmation>;

    /// Look up a broadcast transaction: `Ok(None)` while it is not in a
    /// block, `Err(RejectedTransaction)` if it executed and failed
    async fn transaction_status(&self, txid: &str) -> Result<Option<TxConfirmation>>;

    /// Create a fresh address and its private key
    async fn generate_keypair(&self) -> Result<Keypair>;
}
