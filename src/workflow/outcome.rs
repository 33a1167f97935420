//! Step outcomes and the workflow error taxonomy.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::LedgerError;
use crate::signer::{BackendError, GatewayError, ResolutionError};
use crate::validator::{Discrepancy, ValidatorError};
use crate::workflow::steps::Precondition;

/// Non-error result of a workflow operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Signed, validated and reflected on the ledger.
    Completed { account: String, txid: Option<String> },
    /// The ledger already shows the effect; nothing was submitted.
    AlreadySatisfied,
    /// The user declined in the signer. Not an error.
    Declined,
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed { .. } | StepOutcome::AlreadySatisfied)
    }
}

/// Why a workflow operation failed. Never fatal; the step can be re-invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Signer service unreachable: {0}")]
    SignerUnreachable(String),

    #[error("Signing request {request_id} expired before it was signed")]
    SignerTimeout { request_id: Uuid },

    #[error("Ledger query failed: {0}")]
    LedgerQueryFailure(#[from] LedgerError),

    #[error("Ledger does not confirm the signed {step} transaction")]
    ValidationMismatch {
        step: &'static str,
        request_id: Uuid,
        discrepancy: Discrepancy,
    },

    #[error("Step {step} is not possible yet: {unmet:?}")]
    PreconditionFailed {
        step: &'static str,
        unmet: Vec<Precondition>,
    },

    #[error("Wait for signing request {request_id} was cancelled")]
    Cancelled { request_id: Uuid },

    #[error("Signing request {request_id} was replaced by a newer request")]
    Superseded { request_id: Uuid },
}

impl WorkflowError {
    pub(crate) fn precondition(step: &'static str, unmet: Vec<Precondition>) -> Self {
        WorkflowError::PreconditionFailed { step, unmet }
    }

    /// Single line for the user.
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::SignerUnreachable(_) => {
                "The signing service could not be reached. Please try again.".to_string()
            }
            WorkflowError::SignerTimeout { .. } => {
                "The signing request expired before it was signed. You can start it again.".to_string()
            }
            WorkflowError::LedgerQueryFailure(LedgerError::AccountNotFound(account)) => {
                format!("Account {} does not exist on the selected network.", account)
            }
            WorkflowError::LedgerQueryFailure(_) => {
                "The ledger could not be queried. Account data may be out of date.".to_string()
            }
            WorkflowError::ValidationMismatch { .. } => {
                "The transaction could not be confirmed on the ledger. Nothing was marked as done.".to_string()
            }
            WorkflowError::PreconditionFailed { unmet, .. } => {
                let reasons: Vec<&str> = unmet.iter().map(Precondition::describe).collect();
                format!("This step is not available yet: {}.", reasons.join("; "))
            }
            WorkflowError::Cancelled { .. } => "Waiting for the signature was cancelled.".to_string(),
            WorkflowError::Superseded { .. } => "A newer signing request replaced this one.".to_string(),
        }
    }

    /// Copyable diagnostic payload.
    pub fn diagnostic(&self) -> Value {
        let details = match self {
            WorkflowError::SignerUnreachable(reason) => json!({ "reason": reason }),
            WorkflowError::SignerTimeout { request_id }
            | WorkflowError::Cancelled { request_id }
            | WorkflowError::Superseded { request_id } => json!({ "request_id": request_id }),
            WorkflowError::LedgerQueryFailure(e) => json!({ "reason": e.to_string() }),
            WorkflowError::ValidationMismatch {
                step,
                request_id,
                discrepancy,
            } => json!({
                "step": step,
                "request_id": request_id,
                "discrepancy": discrepancy,
            }),
            WorkflowError::PreconditionFailed { step, unmet } => json!({ "step": step, "unmet": unmet }),
        };

        json!({
            "error": self.kind(),
            "message": self.to_string(),
            "details": details,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::SignerUnreachable(_) => "signer_unreachable",
            WorkflowError::SignerTimeout { .. } => "signer_timeout",
            WorkflowError::LedgerQueryFailure(_) => "ledger_query_failure",
            WorkflowError::ValidationMismatch { .. } => "validation_mismatch",
            WorkflowError::PreconditionFailed { .. } => "precondition_failed",
            WorkflowError::Cancelled { .. } => "cancelled",
            WorkflowError::Superseded { .. } => "superseded",
        }
    }
}

impl From<GatewayError> for WorkflowError {
    fn from(e: GatewayError) -> Self {
        WorkflowError::SignerUnreachable(e.to_string())
    }
}

impl From<BackendError> for WorkflowError {
    fn from(e: BackendError) -> Self {
        WorkflowError::SignerUnreachable(e.to_string())
    }
}

impl From<ValidatorError> for WorkflowError {
    fn from(e: ValidatorError) -> Self {
        match e {
            ValidatorError::Backend(e) => e.into(),
            ValidatorError::Ledger(e) => e.into(),
        }
    }
}

impl From<ResolutionError> for WorkflowError {
    fn from(e: ResolutionError) -> Self {
        match e {
            ResolutionError::Timeout { request_id } => WorkflowError::SignerTimeout { request_id },
            ResolutionError::Cancelled { request_id } => WorkflowError::Cancelled { request_id },
            ResolutionError::Superseded { request_id } => WorkflowError::Superseded { request_id },
            ResolutionError::Channel { .. } => WorkflowError::SignerUnreachable(e.to_string()),
        }
    }
}

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;
