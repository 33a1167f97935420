//! Outward validation calls against the signer backend.
//!
//! Each call takes the id of a signed request and reports who signed it and on
//! which network. The answers are claims; the validator re-checks the ledger.

use async_trait::async_trait;
use uuid::Uuid;

use crate::signer::types::{BackendError, FixedAmounts, SignerVerdict};

#[async_trait]
pub trait ValidationBackend: Send + Sync {
    /// Verify a sign-in request and report the signing account.
    async fn check_sign_in(&self, request_id: Uuid) -> Result<SignerVerdict, BackendError>;

    /// Verify a fee payment request.
    async fn check_payment(&self, request_id: Uuid) -> Result<SignerVerdict, BackendError>;

    /// Verify any other signed transaction.
    async fn validate_transaction(&self, request_id: Uuid) -> Result<SignerVerdict, BackendError>;

    /// Service fee amounts published by the backend.
    async fn fixed_amounts(&self) -> Result<FixedAmounts, BackendError>;
}
