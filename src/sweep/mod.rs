//! Deposit detection and treasury sweeping
//!
//! Each cycle walks the wallet pool and, for every wallet holding funds,
//! runs the fixed sequence:
//!
//! ```text
//! balance check → webhook → delegate resource → transfer to treasury
//!                                                  → record → mark notified
//! ```
//!
//! # Retry policy
//!
//! Nothing is retried inside a cycle. A wallet whose sweep fails still holds
//! its balance, so the next cycle detects it again and repeats the whole
//! sequence, webhook included. Side effects are therefore attempted at least
//! once per outstanding balance, and a persistently failing sweep produces a
//! webhook attempt every cycle.
//!
//! A transfer whose outcome is unknown (broadcast but unconfirmed, or cut
//! off by the call timeout) is not retried blindly. It is stored as a
//! pending sweep; later cycles record it once it lands, or discard it when
//! the chain reports it failed or `pending_expiry` passes.

pub mod engine;

use std::fmt;
use std::time::Duration;

use crate::chain::ResourceKind;
use crate::config::Config;
use crate::error::Error;
use crate::types::{Keypair, Sun, TransactionRecordId};

pub use engine::SweepEngine;

/// Per-wallet progress within one cycle: the last step that succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStage {
    /// Nothing done yet, or balance was zero
    Idle,
    /// Positive balance observed
    BalanceChecked,
    /// Webhook accepted
    Notified,
    /// Delegation confirmed
    Delegated,
    /// Transfer confirmed
    Swept,
}

impl fmt::Display for SweepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepStage::Idle => write!(f, "idle"),
            SweepStage::BalanceChecked => write!(f, "balance_checked"),
            SweepStage::Notified => write!(f, "notified"),
            SweepStage::Delegated => write!(f, "delegated"),
            SweepStage::Swept => write!(f, "swept"),
        }
    }
}

/// What happened to one wallet in one cycle
#[derive(Debug)]
pub enum WalletOutcome {
    /// Zero balance, no side effects
    Idle,

    /// Funds moved to the treasury and recorded
    Swept {
        record_id: TransactionRecordId,
        amount: Sun,
        /// Absent when a timed-out transfer was recognised by the balance
        txid: Option<String>,
        /// Webhook accepted and the record's flag is set
        notified: bool,
        /// Delegation call succeeded
        delegated: bool,
    },

    /// The sequence stopped after `stage`
    Failed {
        stage: SweepStage,
        amount: Option<Sun>,
        error: Error,
    },
}

/// Summary of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub checked: usize,
    pub idle: usize,
    pub swept: usize,
    pub failed: usize,
    pub notified: usize,
    pub total_swept: Sun,
}

impl CycleReport {
    pub fn record(&mut self, outcome: &WalletOutcome) {
        self.checked += 1;
        match outcome {
            WalletOutcome::Idle => self.idle += 1,
            WalletOutcome::Swept {
                amount, notified, ..
            } => {
                self.swept += 1;
                self.total_swept = self.total_swept.saturating_add(*amount);
                if *notified {
                    self.notified += 1;
                }
            }
            WalletOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// TRON drops a transaction that is not in a block within 60 s of creation
pub const DEFAULT_PENDING_EXPIRY: Duration = Duration::from_secs(180);

/// Fixed parameters for the engine
#[derive(Debug, Clone)]
pub struct SweepSettings {
    /// Destination of sweeps and source of delegations
    pub treasury: Keypair,
    /// Quantity passed to every delegation
    pub delegation_amount: u64,
    pub resource: ResourceKind,
    /// Bound applied to every external call
    pub call_timeout: Duration,
    /// How long an unconfirmed sweep holds back new transfers from its
    /// wallet before it is treated as dropped
    pub pending_expiry: Duration,
}

impl SweepSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            treasury: config.treasury.keypair(),
            delegation_amount: config.sweep.energy_amount,
            resource: config.sweep.resource,
            call_timeout: Duration::from_millis(config.sweep.call_timeout_ms),
            pending_expiry: DEFAULT_PENDING_EXPIRY,
        }
    }
}
