//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate endpoint URLs and their schemes
//! - Validate value ranges (timeouts > 0, expiry bounds, fee > 0)
//! - Check the fee recipient is a well-formed account address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BlackholeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::account::address::is_valid_classic_address;
use crate::config::schema::BlackholeConfig;

/// Shortest signing request lifetime the signer service accepts.
const MIN_EXPIRY_SECS: u64 = 30;
/// Longest signing request lifetime we are willing to leave pending.
const MAX_EXPIRY_SECS: u64 = 24 * 3600;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field}: unsupported scheme '{scheme}', expected {expected}")]
    UnsupportedScheme {
        field: &'static str,
        scheme: String,
        expected: &'static str,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("signer.expiry_secs {0} out of range ({MIN_EXPIRY_SECS}..={MAX_EXPIRY_SECS})")]
    ExpiryOutOfRange(u64),

    #[error("fee.recipient '{0}' is not a valid account address")]
    InvalidFeeRecipient(String),

    #[error("validation.base_delay_ms ({base}) exceeds max_delay_ms ({max})")]
    DelayOrdering { base: u64, max: u64 },

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &BlackholeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url(&mut errors, "ledger.mainnet_url", &config.ledger.mainnet_url, &["ws", "wss"], "ws or wss");
    check_url(&mut errors, "ledger.testnet_url", &config.ledger.testnet_url, &["ws", "wss"], "ws or wss");
    check_url(&mut errors, "signer.base_url", &config.signer.base_url, &["http", "https"], "http or https");

    if config.ledger.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "ledger.request_timeout_secs" });
    }
    if config.ledger.history_limit == 0 {
        errors.push(ValidationError::Zero { field: "ledger.history_limit" });
    }
    if config.ledger.history_page_size == 0 {
        errors.push(ValidationError::Zero { field: "ledger.history_page_size" });
    }
    if config.signer.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "signer.request_timeout_secs" });
    }
    if !(MIN_EXPIRY_SECS..=MAX_EXPIRY_SECS).contains(&config.signer.expiry_secs) {
        errors.push(ValidationError::ExpiryOutOfRange(config.signer.expiry_secs));
    }

    if config.fee.amount_drops == 0 {
        errors.push(ValidationError::Zero { field: "fee.amount_drops" });
    }
    if !is_valid_classic_address(&config.fee.recipient) {
        errors.push(ValidationError::InvalidFeeRecipient(config.fee.recipient.clone()));
    }

    if config.validation.requery_attempts == 0 {
        errors.push(ValidationError::Zero { field: "validation.requery_attempts" });
    }
    if config.validation.base_delay_ms > config.validation.max_delay_ms {
        errors.push(ValidationError::DelayOrdering {
            base: config.validation.base_delay_ms,
            max: config.validation.max_delay_ms,
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: &str,
    schemes: &[&str],
    expected: &'static str,
) {
    match url::Url::parse(value) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => errors.push(ValidationError::UnsupportedScheme {
            field,
            scheme: url.scheme().to_string(),
            expected,
        }),
        Err(_) => errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        }),
    }
}
