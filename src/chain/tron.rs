//! TRON full-node HTTP gateway
//!
//! Talks to a full node (or TronGrid) over its `/wallet/*` HTTP API.
//! Transactions are built, signed and broadcast by the node; this client
//! only moves JSON around and waits for confirmation.
//!
//! API Documentation: https://developers.tron.network/reference/full-node-api-overview

use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{ChainGateway, ResourceKind, TxConfirmation};
use crate::config::ChainConfig;
use crate::error::{Error, Result};
use crate::types::{Address, Keypair, SigningKey, Sun};

/// Header carrying the TronGrid API key
pub const API_KEY_HEADER: &str = "TRON-PRO-API-KEY";

/// `/wallet/generateaddress` response
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedAddress {
    #[serde(rename = "privateKey")]
    pub private_key: String,
    pub address: String,
}

/// `/wallet/getaccount` response (empty object for unactivated accounts)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub balance: u64,
}

/// `/wallet/broadcasttransaction` response
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastResponse {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub code: Option<String>,
    /// Hex-encoded error message
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub txid: Option<String>,
}

impl BroadcastResponse {
    /// Human-readable rejection reason
    pub fn rejection_reason(&self) -> String {
        let message = self
            .message
            .as_deref()
            .map(decode_node_message)
            .unwrap_or_default();
        match &self.code {
            Some(code) if message.is_empty() => code.clone(),
            Some(code) => format!("{}: {}", code, message),
            None if message.is_empty() => "broadcast rejected".to_string(),
            None => message,
        }
    }
}

/// `/wallet/gettransactioninfobyid` response (empty object until included)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<u64>,
    /// `FAILED` for failed transactions, absent otherwise
    #[serde(default)]
    pub result: Option<String>,
    #[serde(rename = "resMessage", default)]
    pub res_message: Option<String>,
}

impl TransactionInfo {
    /// `None` while the transaction is not yet in a block
    pub fn outcome(&self) -> Option<Result<TxConfirmation>> {
        let id = self.id.as_ref()?;
        if self.result.as_deref() == Some("FAILED") {
            let reason = self
                .res_message
                .as_deref()
                .map(decode_node_message)
                .unwrap_or_else(|| "execution failed".to_string());
            return Some(Err(Error::RejectedTransaction(format!("{}: {}", id, reason))));
        }
        Some(Ok(TxConfirmation {
            txid: id.clone(),
            block_number: self.block_number,
        }))
    }
}

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    owner_address: &'a str,
    to_address: &'a str,
    amount: u64,
    visible: bool,
}

#[derive(Debug, Serialize)]
struct DelegateRequest<'a> {
    owner_address: &'a str,
    receiver_address: &'a str,
    balance: u64,
    resource: &'static str,
    lock: bool,
    visible: bool,
}

/// Node messages are hex-encoded UTF-8; fall back to the raw text
pub fn decode_node_message(message: &str) -> String {
    match hex::decode(message) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => message.to_string(),
    }
}

/// Reject a built transaction that carries an `Error` field or no `txID`
pub fn check_built_transaction(tx: &Value) -> Result<String> {
    if let Some(err) = tx.get("Error").and_then(Value::as_str) {
        return Err(Error::RejectedTransaction(err.to_string()));
    }
    tx.get("txID")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::RejectedTransaction(format!("node returned no txID: {}", tx)))
}

/// HTTP client for a TRON full node
pub struct TronHttpGateway {
    client: Client,
    endpoint: String,
    confirm_timeout: Duration,
    confirm_poll: Duration,
}

impl TronHttpGateway {
    /// Create a gateway from chain configuration
    pub fn new(config: &ChainConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if !config.api_key.is_empty() {
            let value = HeaderValue::from_str(&config.api_key)
                .map_err(|e| Error::Config(format!("Invalid chain api_key: {}", e)))?;
            headers.insert(API_KEY_HEADER, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        info!("TRON gateway initialized for {}", config.endpoint);

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            confirm_timeout: Duration::from_millis(config.confirm_timeout_ms),
            confirm_poll: Duration::from_millis(config.confirm_poll_ms),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.endpoint, path);
        debug!("POST {}", path);

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!("{} returned {}: {}", path, status, text)));
        }

        Ok(response.json::<R>().await?)
    }

    /// Sign a node-built transaction, broadcast it and wait for inclusion
    async fn sign_and_submit(&self, tx: Value, key: &SigningKey) -> Result<TxConfirmation> {
        let txid = check_built_transaction(&tx)?;

        let signed: Value = self
            .post(
                "/wallet/gettransactionsign",
                &json!({ "transaction": tx, "privateKey": key.expose_secret() }),
            )
            .await?;
        if signed.get("signature").is_none() {
            return Err(Error::RejectedTransaction(format!("signing failed for {}", txid)));
        }

        let broadcast: BroadcastResponse =
            self.post("/wallet/broadcasttransaction", &signed).await?;
        if !broadcast.result {
            return Err(Error::RejectedTransaction(broadcast.rejection_reason()));
        }

        debug!("Broadcast {} accepted, waiting for confirmation", txid);
        self.wait_for_confirmation(&txid).await
    }

    /// Poll until the transaction is in a block.
    ///
    /// Once the broadcast was accepted the transaction may still land, so
    /// giving up surfaces `Unconfirmed` with the txid rather than a plain
    /// network error.
    async fn wait_for_confirmation(&self, txid: &str) -> Result<TxConfirmation> {
        let backoff = ExponentialBackoff {
            initial_interval: self.confirm_poll,
            max_interval: self.confirm_poll * 2,
            max_elapsed_time: Some(self.confirm_timeout),
            ..Default::default()
        };

        retry(backoff, || async {
            let info = self
                .transaction_info(txid)
                .await
                .map_err(backoff::Error::transient)?;

            match info.outcome() {
                Some(Ok(confirmation)) => Ok(confirmation),
                Some(Err(e)) => Err(backoff::Error::permanent(e)),
                None => Err(backoff::Error::transient(Error::Network(format!(
                    "transaction {} not confirmed within {}ms",
                    txid,
                    self.confirm_timeout.as_millis()
                )))),
            }
        })
        .await
        .map_err(|e| match e {
            Error::RejectedTransaction(_) => e,
            other => Error::Unconfirmed {
                txid: txid.to_string(),
                reason: other.to_string(),
            },
        })
    }

    async fn transaction_info(&self, txid: &str) -> Result<TransactionInfo> {
        self.post("/wallet/gettransactioninfobyid", &json!({ "value": txid }))
            .await
    }
}

#[async_trait]
impl ChainGateway for TronHttpGateway {
    async fn get_balance(&self, address: &Address) -> Result<Sun> {
        let account: AccountInfo = self
            .post(
                "/wallet/getaccount",
                &json!({ "address": address.as_str(), "visible": true }),
            )
            .await?;
        Ok(Sun(account.balance))
    }

    async fn delegate_resource(
        &self,
        from: &Keypair,
        to: &Address,
        quantity: u64,
        resource: ResourceKind,
    ) -> Result<TxConfirmation> {
        let tx: Value = self
            .post(
                "/wallet/delegateresource",
                &DelegateRequest {
                    owner_address: from.address.as_str(),
                    receiver_address: to.as_str(),
                    balance: quantity,
                    resource: resource.as_api_str(),
                    lock: false,
                    visible: true,
                },
            )
            .await?;

        let confirmation = self.sign_and_submit(tx, &from.key).await?;
        info!(
            "Delegated {} {} to {} (tx: {})",
            quantity, resource, to, confirmation.txid
        );
        Ok(confirmation)
    }

    async fn transfer(&self, from: &Keypair, to: &Address, amount: Sun) -> Result<TxConfirmation> {
        let tx: Value = self
            .post(
                "/wallet/createtransaction",
                &TransferRequest {
                    owner_address: from.address.as_str(),
                    to_address: to.as_str(),
                    amount: amount.as_u64(),
                    visible: true,
                },
            )
            .await?;

        let confirmation = self.sign_and_submit(tx, &from.key).await?;
        info!(
            "Transfer complete: {} TRX from {} to {} (tx: {})",
            amount, from.address, to, confirmation.txid
        );
        Ok(confirmation)
    }

    async fn transaction_status(&self, txid: &str) -> Result<Option<TxConfirmation>> {
        self.transaction_info(txid).await?.outcome().transpose()
    }

    async fn generate_keypair(&self) -> Result<Keypair> {
        let generated: GeneratedAddress =
            self.post("/wallet/generateaddress", &json!({})).await?;

        if generated.address.is_empty() || generated.private_key.is_empty() {
            warn!("Node returned an empty generated address");
            return Err(Error::Network("generateaddress returned no keypair".to_string()));
        }

        Ok(Keypair::new(
            Address::new(generated.address),
            SigningKey::new(generated.private_key),
        ))
    }
}
