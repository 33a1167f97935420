//! Post-signing validation subsystem.
//!
//! # Data Flow
//! ```text
//! SigningResolution::Signed
//!     → transaction.rs (backend verdict: success, account, network)
//!     → account / network checks against the session
//!     → ledger re-check with backoff (flags, regular key, signer lists)
//!     → history.rs (payments: destination, exact delivered amount, memo account)
//!     → TransactionValidation
//! ```

pub mod history;
pub mod transaction;
pub mod types;

pub use history::{find_payment, PaymentCriteria, ScanLimits};
pub use transaction::TransactionValidator;
pub use types::{Discrepancy, ExpectedEffect, TransactionValidation, ValidatorError, ValidatorResult};
