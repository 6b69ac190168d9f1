//! TRON Deposit Sweeper Library
//!
//! Maintains a pool of deposit wallets, detects incoming TRX, notifies a
//! webhook and sweeps the funds into a treasury wallet.

pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod notify;
pub mod pool;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod sweep;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
