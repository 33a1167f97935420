//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger → every suspended resolution wait returns Cancelled
//!             → its notification channel is closed
//!
//! Signals (signals.rs):
//!     SIGINT → trigger
//! ```
//!
//! # Design Decisions
//! - Cancellation only stops local waiting; it never revokes a remote request

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
