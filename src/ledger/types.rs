//! Ledger query types and error definitions.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Ledger network a query is routed to.
///
/// Every query names its network explicitly; nothing infers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Test,
}

impl Network {
    pub fn is_test(self) -> bool {
        matches!(self, Network::Test)
    }

    /// Map the signer's `testnet` flag onto a network.
    pub fn from_testnet_flag(testnet: bool) -> Self {
        if testnet {
            Network::Test
        } else {
            Network::Main
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Main => "main",
            Network::Test => "test",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only ledger commands used by the workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `account_info`, optionally with the account's signer lists.
    AccountInfo { account: String, signer_lists: bool },
    /// `account_lines` against the validated ledger, one page per marker.
    AccountLines { account: String, marker: Option<Value> },
    /// `account_tx`, one page bounded by `limit`.
    AccountTransactions {
        account: String,
        limit: u32,
        marker: Option<Value>,
    },
    /// `ledger_entry` by object index.
    LedgerEntry { index: String },
}

impl Command {
    /// Protocol command name, also used as a metrics label.
    pub fn name(&self) -> &'static str {
        match self {
            Command::AccountInfo { .. } => "account_info",
            Command::AccountLines { .. } => "account_lines",
            Command::AccountTransactions { .. } => "account_tx",
            Command::LedgerEntry { .. } => "ledger_entry",
        }
    }

    /// Build the request envelope sent over the wire.
    pub fn to_request(&self, id: u64) -> Value {
        match self {
            Command::AccountInfo { account, signer_lists } => json!({
                "id": id,
                "command": "account_info",
                "account": account,
                "signer_lists": signer_lists,
                "strict": true,
                "ledger_index": "validated",
            }),
            Command::AccountLines { account, marker } => {
                let mut request = json!({
                    "id": id,
                    "command": "account_lines",
                    "account": account,
                    "ledger_index": "validated",
                });
                if let Some(marker) = marker {
                    request["marker"] = marker.clone();
                }
                request
            }
            Command::AccountTransactions { account, limit, marker } => {
                let mut request = json!({
                    "id": id,
                    "command": "account_tx",
                    "account": account,
                    "limit": limit,
                });
                if let Some(marker) = marker {
                    request["marker"] = marker.clone();
                }
                request
            }
            Command::LedgerEntry { index } => json!({
                "id": id,
                "command": "ledger_entry",
                "index": index,
                "ledger_index": "validated",
            }),
        }
    }
}

/// Why a query did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Could not connect, or the connection dropped mid-request.
    Transport(String),
    /// No response within the configured timeout.
    Timeout,
    /// The ledger answered with an error status.
    Ledger {
        error: String,
        message: Option<String>,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transport(e) => write!(f, "transport: {}", e),
            FailureReason::Timeout => f.write_str("timeout"),
            FailureReason::Ledger { error, message: Some(m) } => write!(f, "{}: {}", error, m),
            FailureReason::Ledger { error, message: None } => f.write_str(error),
        }
    }
}

/// Discriminated response of a single query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    /// `status: "success"`; carries the `result` object.
    Success(Value),
    Failure { reason: FailureReason },
    /// Anything that is not a well-formed response envelope.
    Malformed,
}

impl QueryResponse {
    /// Classify a raw response envelope.
    pub fn from_envelope(envelope: Value) -> Self {
        if envelope.get("type").and_then(Value::as_str) != Some("response") {
            return QueryResponse::Malformed;
        }

        match envelope.get("status").and_then(Value::as_str) {
            Some("success") => match envelope.get("result") {
                Some(result) if result.is_object() => QueryResponse::Success(result.clone()),
                _ => QueryResponse::Malformed,
            },
            Some("error") => {
                // Errors appear at the top level or inside `result` depending on server version.
                let source = envelope
                    .get("error")
                    .map(|_| &envelope)
                    .or_else(|| envelope.get("result"))
                    .unwrap_or(&envelope);
                let error = source
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let message = source
                    .get("error_message")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                QueryResponse::Failure {
                    reason: FailureReason::Ledger { error, message },
                }
            }
            _ => QueryResponse::Malformed,
        }
    }

    /// Label used for metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            QueryResponse::Success(_) => "success",
            QueryResponse::Failure { reason: FailureReason::Timeout } => "timeout",
            QueryResponse::Failure { .. } => "failure",
            QueryResponse::Malformed => "malformed",
        }
    }

    /// Convert into a `Result`, keeping the failure detail.
    pub fn into_result(self) -> LedgerResult<Value> {
        match self {
            QueryResponse::Success(result) => Ok(result),
            QueryResponse::Failure { reason } => Err(reason.into()),
            QueryResponse::Malformed => Err(LedgerError::Malformed("response envelope".to_string())),
        }
    }
}

/// Errors that can occur during ledger queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Connection failed or dropped.
    #[error("Ledger transport error: {0}")]
    Transport(String),

    /// Query timed out.
    #[error("Ledger query timed out")]
    Timeout,

    /// The account does not exist on the queried network.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// The ledger rejected the query.
    #[error("Ledger error {error}{}", .message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Rejected {
        error: String,
        message: Option<String>,
    },

    /// The response was missing or mis-typed a required field.
    #[error("Malformed ledger response: {0}")]
    Malformed(String),

    /// A paged result did not end within the page limit.
    #[error("Ledger result incomplete: {0}")]
    Incomplete(String),
}

impl From<FailureReason> for LedgerError {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::Transport(e) => LedgerError::Transport(e),
            FailureReason::Timeout => LedgerError::Timeout,
            FailureReason::Ledger { error, message } => LedgerError::Rejected { error, message },
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
