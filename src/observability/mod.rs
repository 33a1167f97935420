//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Signer payload uuid flows through every log line of a step as `request_id`
//! - Metrics are cheap (atomic increments) and safe without an exporter

pub mod logging;
pub mod metrics;
