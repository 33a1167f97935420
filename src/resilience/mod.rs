//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call (ledger query, signer HTTP):
//!     → timeouts.rs (enforce per-call deadline)
//!
//! Post-signing ledger re-check:
//!     → backoff.rs (bounded re-query while the ledger catches up)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Core calls are single-attempt; only the ledger re-check after a
//!   signed transaction is retried, and only a bounded number of times

pub mod backoff;
pub mod timeouts;
