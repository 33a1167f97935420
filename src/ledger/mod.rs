//! Ledger query subsystem.
//!
//! # Data Flow
//! ```text
//! caller (validator, orchestrator)
//!     → queries.rs (typed helpers: account_info, account_lines, account_tx, fee settings)
//!     → client.rs (LedgerQueryClient: one WebSocket per network, id correlation)
//!     → types.rs (QueryResponse: Success | Failure | Malformed)
//!     → model.rs (AccountRoot, TrustLine, TxEntry, FeeSettings)
//! ```
//!
//! # Design Decisions
//! - Read-only: the engine never submits transactions itself
//! - Network is an explicit parameter of every call, never inferred
//! - No retries at this layer

pub mod client;
pub mod model;
pub mod queries;
pub mod types;

pub use client::{LedgerQueryClient, WebSocketLedgerClient};
pub use model::{AccountRoot, AccountTxPage, FeeSettings, Memo, TrustLine, TxEntry};
pub use queries::AccountInfo;
pub use types::{Command, FailureReason, LedgerError, LedgerResult, Network, QueryResponse};
