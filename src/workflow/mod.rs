//! Blackhole workflow subsystem.
//!
//! # Data Flow
//! ```text
//! presentation layer
//!     → orchestrator.rs (WorkflowOrchestrator operations over a WorkflowSession)
//!     → steps.rs (guards, FlagChecklist, WorkflowStep ordering)
//!     → signer / validator / ledger subsystems
//!     → session.rs (snapshot, checklist and step updated only on confirmation)
//!     → outcome.rs (StepOutcome or WorkflowError with a diagnostic payload)
//! ```
//!
//! # Design Decisions
//! - The session is an explicit value; there is no global workflow state
//! - Steps only move forward; a reset starts a new session
//! - A declined request is an outcome, not an error

pub mod orchestrator;
pub mod outcome;
pub mod session;
pub mod steps;

pub use orchestrator::{Collaborators, FeeStatus, SubmissionListener, WorkflowOrchestrator};
pub use outcome::{StepOutcome, WorkflowError, WorkflowResult};
pub use session::{FeeQuote, WorkflowSession};
pub use steps::{ActionStatus, FlagAction, FlagChecklist, Precondition, WorkflowStep};
