//! OS signal handling.
//!
//! # Responsibilities
//! - Translate ctrl-c into the workflow cancellation signal
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The first interrupt cancels the pending wait; the signer request itself
//!   stays open on the signer's side until it expires

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// Spawn a task that triggers `shutdown` on ctrl-c.
pub fn spawn_interrupt_listener(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, abandoning outstanding wait");
                shutdown.trigger();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for interrupt"),
        }
    })
}
