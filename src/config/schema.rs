//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the blackhole
//! workflow engine. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the blackhole workflow engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BlackholeConfig {
    /// Ledger endpoints and query limits.
    pub ledger: LedgerConfig,

    /// External signer service settings.
    pub signer: SignerConfig,

    /// Service fee settings.
    pub fee: FeeConfig,

    /// Post-signing ledger re-check settings.
    pub validation: ValidationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Ledger network endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// WebSocket endpoint of the main network.
    pub mainnet_url: String,

    /// WebSocket endpoint of the test network.
    pub testnet_url: String,

    /// Per-query timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum number of history entries scanned for a prior fee payment.
    pub history_limit: u32,

    /// Page size requested from `account_tx`.
    pub history_page_size: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mainnet_url: "wss://xrplcluster.com".to_string(),
            testnet_url: "wss://s.altnet.rippletest.net:51233".to_string(),
            request_timeout_secs: 10,
            history_limit: 1000,
            history_page_size: 200,
        }
    }
}

/// Signer service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Base URL of the signer backend (payload submission and checks).
    pub base_url: String,

    /// Optional API key sent as `x-api-key`.
    pub api_key: Option<String>,

    /// Optional API secret sent as `x-api-secret`. Never logged.
    pub api_secret: Option<String>,

    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Lifetime of a signing request in seconds.
    pub expiry_secs: u64,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.xrpl.services".to_string(),
            api_key: None,
            api_secret: None,
            request_timeout_secs: 15,
            expiry_secs: 120,
        }
    }
}

/// Service fee configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Account receiving the service fee.
    pub recipient: String,

    /// Fee amount in drops, used when the backend publishes no fixed amount.
    pub amount_drops: u64,

    /// Prefer the fixed amount published by the signer backend.
    pub use_backend_fixed_amount: bool,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            recipient: "rNixerUVPwrhxGDt4UooDu6FJ7zuofvjCF".to_string(),
            amount_drops: 20_000_000,
            use_backend_fixed_amount: true,
        }
    }
}

/// Bounded re-query settings for confirming a signed transaction on ledger.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Number of ledger checks before giving up on a missing effect.
    pub requery_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            requery_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 4000,
        }
    }
}

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
