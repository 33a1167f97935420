//! XRPL account blackholing workflow engine.
//!
//! Drives an issuer account through fee payment, the four irreversible
//! account configuration transactions and a final balance sweep. Every
//! transaction is signed by an external signer; the engine only builds
//! templates, waits for resolutions and checks the ledger afterwards.

pub mod account;
pub mod config;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod signer;
pub mod validator;
pub mod workflow;

pub use account::{AccountSnapshot, AccountState, ReserveSchedule};
pub use config::BlackholeConfig;
pub use ledger::{LedgerQueryClient, Network, WebSocketLedgerClient};
pub use lifecycle::Shutdown;
pub use signer::{HttpSignerService, ResolutionWaiter, WebSocketNotificationSource};
pub use workflow::{Collaborators, StepOutcome, WorkflowError, WorkflowOrchestrator, WorkflowSession};
