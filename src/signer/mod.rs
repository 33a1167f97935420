//! External signer subsystem.
//!
//! # Data Flow
//! ```text
//! SigningRequest (template + instruction + expiry)
//!     → gateway.rs (SigningRequestGateway::submit → RequestHandle)
//!     → waiter.rs (ResolutionWaiter: one channel per request, shared outcome)
//!     → channel.rs (NotificationSource / ChannelLease)
//!     → backend.rs (ValidationBackend: who signed, which network)
//! ```
//!
//! # Design Decisions
//! - The engine never holds keys; every signature comes from the external signer
//! - Submissions and validation calls are single-shot
//! - `http.rs` implements both the gateway and the validation backend

pub mod backend;
pub mod channel;
pub mod gateway;
pub mod http;
pub mod types;
pub mod waiter;

pub use backend::ValidationBackend;
pub use channel::{ChannelLease, NotificationChannel, NotificationSource, WebSocketNotificationSource};
pub use gateway::SigningRequestGateway;
pub use http::HttpSignerService;
pub use types::{
    BackendError, ChannelError, FixedAmounts, GatewayError, RequestHandle, ResolutionError, SignerVerdict,
    SigningRequest, SigningResolution, TransactionKind, TransactionTemplate,
};
pub use waiter::ResolutionWaiter;
