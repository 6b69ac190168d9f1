//! Payment notifications
//!
//! Delivers "funds received" events to an external system.

pub mod webhook;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Address, Sun};

pub use webhook::{WebhookNotifier, WebhookPayload};

/// Destination for payment events
///
/// `Ok(())` means the receiver affirmatively accepted the event. Anything
/// else, including transport errors, is `Err(Error::Notification)`.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, wallet: &Address, amount: Sun) -> Result<()>;
}
