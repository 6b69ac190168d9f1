//! Error types for the deposit sweeper

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the deposit sweeper
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Store errors
    #[error("Duplicate wallet address: {0}")]
    DuplicateAddress(String),

    #[error("Wallet store unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Wallet store corrupted: {0}")]
    Storage(String),

    // Chain errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Transaction rejected: {0}")]
    RejectedTransaction(String),

    #[error("Call timed out after {0}ms")]
    Timeout(u64),

    #[error("Transaction {txid} broadcast but not confirmed: {reason}")]
    Unconfirmed { txid: String, reason: String },

    // Notification errors
    #[error("Notification failed: {0}")]
    Notification(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is transient (a later cycle may succeed)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::Timeout(_)
                | Error::Unconfirmed { .. }
                | Error::StorageUnavailable(_)
                | Error::Notification(_)
        )
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Network(format!("request timed out: {}", e))
        } else if e.is_decode() {
            Error::Serialization(e.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Network("reset".to_string()).is_retryable());
        assert!(Error::Timeout(500).is_retryable());
        assert!(Error::Unconfirmed {
            txid: "abc".to_string(),
            reason: "still pending".to_string(),
        }
        .is_retryable());
        assert!(Error::StorageUnavailable("disk".to_string()).is_retryable());
        assert!(!Error::DuplicateAddress("T1".to_string()).is_retryable());
        assert!(!Error::RejectedTransaction("BANDWITH_ERROR".to_string()).is_retryable());
    }
}
