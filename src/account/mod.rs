//! Account state subsystem.
//!
//! # Data Flow
//! ```text
//! ledger account_info + account_lines + fee settings
//!     → snapshot.rs (AccountSnapshot, ReserveSchedule: raw fields only)
//!     → evaluator.rs (spendable balance, token balance)
//!     → flags.rs (bit tests on the Flags mask)
//!     → AccountState (derived flags for the presentation layer)
//! ```
//!
//! # Design Decisions
//! - Snapshots are replaced whole on refresh, never patched field by field
//! - Derived values are recomputed from raw fields on every read

pub mod address;
pub mod evaluator;
pub mod flags;
pub mod snapshot;

pub use address::{is_valid_classic_address, BLACKHOLE_ADDRESS};
pub use snapshot::{AccountSnapshot, AccountState, ReserveSchedule};
