//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap outbound calls (ledger queries, signer HTTP) with a deadline
//! - Convert signer-side expiry into a local deadline
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Deadlines are `tokio::time::Instant` so paused-clock tests drive them

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Marker returned when a deadline elapsed before the wrapped future finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed;

/// Run `fut` with a relative timeout.
pub async fn with_timeout<F, T>(limit: Duration, fut: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| Elapsed)
}

/// Run `fut` until an absolute deadline.
pub async fn until_deadline<F, T>(deadline: Instant, fut: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout_at(deadline, fut).await.map_err(|_| Elapsed)
}

/// Deadline `secs` from now.
pub fn deadline_in(secs: u64) -> Instant {
    Instant::now() + Duration::from_secs(secs)
}

/// Pull `current` forward to `now + remaining_secs` when that is earlier.
///
/// Never extends a deadline.
pub fn tighten_deadline(current: Instant, remaining_secs: u64) -> Instant {
    current.min(deadline_in(remaining_secs))
}
