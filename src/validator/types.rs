//! Validation outcome types.

use serde::Serialize;
use thiserror::Error;

use crate::ledger::{LedgerError, Network};
use crate::signer::BackendError;
use crate::validator::history::PaymentCriteria;

/// Ledger effect a signed transaction must have produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum ExpectedEffect {
    /// Sign-in proves control of an account and changes nothing on the ledger.
    SignIn,
    MasterKeyDisabled,
    IncomingXrpDisallowed,
    RegularKeyBlackholed,
    SignerListRemoved,
    /// Service fee payment; checked through the payment verdict call.
    FeePayment(PaymentCriteria),
    /// Any other payment, e.g. the balance sweep.
    Payment(PaymentCriteria),
}

impl ExpectedEffect {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ExpectedEffect::SignIn => "sign_in",
            ExpectedEffect::MasterKeyDisabled => "disable_master_key",
            ExpectedEffect::IncomingXrpDisallowed => "disallow_incoming_xrp",
            ExpectedEffect::RegularKeyBlackholed => "set_regular_key",
            ExpectedEffect::SignerListRemoved => "delete_signer_list",
            ExpectedEffect::FeePayment(_) => "fee_payment",
            ExpectedEffect::Payment(_) => "payment",
        }
    }
}

/// Why a signed request was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    /// The signer backend itself reported failure.
    SignerReportedFailure,
    /// The reported account is missing or not a classic address.
    InvalidAccount { reported: Option<String> },
    AccountMismatch { expected: String, actual: String },
    NetworkMismatch { expected: Network, actual: Network },
    /// The ledger never showed the effect within the re-query budget.
    EffectNotObserved { effect: &'static str, detail: String },
}

/// Result of validating one signed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionValidation {
    pub success: bool,
    /// Account that signed, as reported by the signer backend.
    pub account: Option<String>,
    /// Network the signer reported the transaction on.
    pub network: Network,
    /// Transaction hash, when known.
    pub txid: Option<String>,
    pub discrepancy: Option<Discrepancy>,
}

impl TransactionValidation {
    pub(crate) fn accepted(account: String, network: Network, txid: Option<String>) -> Self {
        Self {
            success: true,
            account: Some(account),
            network,
            txid,
            discrepancy: None,
        }
    }

    pub(crate) fn rejected(account: Option<String>, network: Network, discrepancy: Discrepancy) -> Self {
        Self {
            success: false,
            account,
            network,
            txid: None,
            discrepancy: Some(discrepancy),
        }
    }
}

/// Validation could not reach a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type ValidatorResult<T> = Result<T, ValidatorError>;
