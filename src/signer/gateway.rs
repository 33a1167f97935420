//! Signing request submission seam.

use async_trait::async_trait;

use crate::signer::types::{GatewayResult, RequestHandle, SigningRequest};

/// Submits transaction templates to an external signer.
///
/// A failed submission is never retried here; the user re-triggers the step.
#[async_trait]
pub trait SigningRequestGateway: Send + Sync {
    async fn submit(&self, request: &SigningRequest) -> GatewayResult<RequestHandle>;
}
