//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::chain::ResourceKind;
use crate::types::{Address, Keypair, SigningKey};

lazy_static::lazy_static! {
    /// Base58 TRON address: 'T' followed by 33 base58 characters
    static ref TRON_ADDRESS_RE: regex::Regex =
        regex::Regex::new(r"^T[1-9A-HJ-NP-Za-km-z]{33}$").expect("Invalid address regex");
}

/// Environment variables used by earlier deployments, mapped onto config keys
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("MAIN_WALLET", "treasury.address"),
    ("MAIN_PRIVATE_KEY", "treasury.private_key"),
    ("WEBHOOK_URL", "webhook.url"),
    ("ENERGY_AMOUNT", "sweep.energy_amount"),
    ("INITIAL_WALLET_COUNT", "pool.initial_wallet_count"),
];

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub treasury: TreasuryConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

/// Treasury (main wallet) that receives swept funds and delegates resources
#[derive(Debug, Clone, Deserialize)]
pub struct TreasuryConfig {
    pub address: String,
    #[serde(default)]
    pub private_key: String,
}

impl TreasuryConfig {
    pub fn address(&self) -> Address {
        Address::new(self.address.trim())
    }

    pub fn keypair(&self) -> Keypair {
        Keypair::new(self.address(), SigningKey::new(self.private_key.trim()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// How long to wait for a broadcast transaction to land
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    #[serde(default = "default_confirm_poll_ms")]
    pub confirm_poll_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Amount handed to the delegation call for each detected payment
    #[serde(default = "default_energy_amount")]
    pub energy_amount: u64,
    #[serde(default)]
    pub resource: ResourceKind,
    /// Upper bound for any single external call made by the engine
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_initial_wallet_count")]
    pub initial_wallet_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_status_bind")]
    pub bind: String,
}

fn default_true() -> bool {
    true
}

fn default_chain_endpoint() -> String {
    "https://api.trongrid.io".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_confirm_timeout_ms() -> u64 {
    60_000
}

fn default_confirm_poll_ms() -> u64 {
    3_000
}

fn default_interval_secs() -> u64 {
    30
}

fn default_energy_amount() -> u64 {
    100_000
}

fn default_call_timeout_ms() -> u64 {
    90_000
}

fn default_initial_wallet_count() -> usize {
    5
}

fn default_store_path() -> String {
    "wallets.json".to_string()
}

fn default_status_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            endpoint: default_chain_endpoint(),
            api_key: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
            confirm_poll_ms: default_confirm_poll_ms(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            energy_amount: default_energy_amount(),
            resource: ResourceKind::default(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_wallet_count: default_initial_wallet_count(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_status_bind(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut builder = config::Config::builder()
            // Start with defaults
            .set_default("chain.endpoint", default_chain_endpoint())?
            .set_default("sweep.interval_secs", default_interval_secs() as i64)?
            .set_default("sweep.energy_amount", default_energy_amount() as i64)?
            .set_default(
                "pool.initial_wallet_count",
                default_initial_wallet_count() as i64,
            )?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SWEEPER_)
            .add_source(
                config::Environment::with_prefix("SWEEPER")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in LEGACY_ENV_KEYS {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(*key, value)?;
            }
        }

        let settings = builder.build().context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !is_tron_address(&self.treasury.address) {
            anyhow::bail!("Invalid treasury address: {}", self.treasury.address);
        }

        if self.treasury.private_key.trim().is_empty() {
            anyhow::bail!(
                "Treasury private key is not set (treasury.private_key / MAIN_PRIVATE_KEY)"
            );
        }

        url::Url::parse(&self.chain.endpoint)
            .with_context(|| format!("Invalid chain endpoint: {}", self.chain.endpoint))?;
        url::Url::parse(&self.webhook.url)
            .with_context(|| format!("Invalid webhook url: {}", self.webhook.url))?;

        if self.sweep.interval_secs == 0 {
            anyhow::bail!("sweep.interval_secs must be positive");
        }

        if self.sweep.energy_amount == 0 {
            anyhow::bail!("sweep.energy_amount must be positive");
        }

        if self.sweep.call_timeout_ms == 0
            || self.chain.request_timeout_ms == 0
            || self.webhook.timeout_ms == 0
        {
            anyhow::bail!("timeouts must be positive");
        }

        if self.sweep.call_timeout_ms < self.chain.confirm_timeout_ms {
            tracing::warn!(
                "sweep.call_timeout_ms ({}) is below chain.confirm_timeout_ms ({}); \
                 transfers may time out while still confirming",
                self.sweep.call_timeout_ms,
                self.chain.confirm_timeout_ms
            );
        }

        if self.status.enabled {
            self.status
                .bind
                .parse::<std::net::SocketAddr>()
                .with_context(|| format!("Invalid status.bind: {}", self.status.bind))?;
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Treasury:
    address: {}
    private_key: {}
  Chain:
    endpoint: {}
    api_key: {}
    request_timeout: {}ms
    confirm_timeout: {}ms
  Webhook:
    url: {}
    timeout: {}ms
  Sweep:
    interval: {}s
    delegation: {} {}
    call_timeout: {}ms
  Pool:
    initial_wallet_count: {}
  Store:
    path: {}
  Status:
    enabled: {}
    bind: {}
"#,
            self.treasury.address,
            if self.treasury.private_key.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            mask_url(&self.chain.endpoint),
            if self.chain.api_key.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            self.chain.request_timeout_ms,
            self.chain.confirm_timeout_ms,
            mask_url(&self.webhook.url),
            self.webhook.timeout_ms,
            self.sweep.interval_secs,
            self.sweep.energy_amount,
            self.sweep.resource,
            self.sweep.call_timeout_ms,
            self.pool.initial_wallet_count,
            self.store.path,
            self.status.enabled,
            self.status.bind,
        )
    }
}

/// Check the base58 shape of a TRON address
pub fn is_tron_address(address: &str) -> bool {
    TRON_ADDRESS_RE.is_match(address.trim())
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}
