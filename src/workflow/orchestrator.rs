//! Workflow orchestration.
//!
//! # Responsibilities
//! - Expose every workflow operation over an explicit [`WorkflowSession`]
//! - Run each signed step as submit → wait → validate → refresh
//! - Guard step transitions and roll back unconfirmed checklist entries
//! - Keep reserve and fee lookups cached per session
//!
//! # Data Flow
//! ```text
//! operation(session)
//!     → steps.rs guard
//!     → SigningRequestGateway::submit      (SignerUnreachable)
//!     → ResolutionWaiter::wait              (SignerTimeout, Cancelled, Declined)
//!     → TransactionValidator::validate      (ValidationMismatch, LedgerQueryFailure)
//!     → refresh issuer snapshot → StepOutcome
//! ```
//!
//! # Design Decisions
//! - Nothing is retried automatically; every failure leaves the session resumable
//! - A refresh failure after a confirmed step is logged, not reported, since the
//!   step itself was confirmed on the ledger
//! - The fee history scan runs before the fee step is offered

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::account::evaluator::{drops_to_units, has_non_zero_token_balance};
use crate::account::{AccountSnapshot, AccountState, ReserveSchedule};
use crate::config::{BlackholeConfig, FeeConfig};
use crate::ledger::queries::{account_info, account_lines, fee_settings};
use crate::ledger::{LedgerQueryClient, Network};
use crate::lifecycle::Shutdown;
use crate::signer::{
    NotificationSource, RequestHandle, ResolutionWaiter, SigningRequest, SigningRequestGateway, SigningResolution,
    TransactionKind, TransactionTemplate, ValidationBackend,
};
use crate::validator::{find_payment, Discrepancy, ExpectedEffect, PaymentCriteria, ScanLimits, TransactionValidator};
use crate::workflow::outcome::{StepOutcome, WorkflowError, WorkflowResult};
use crate::workflow::session::{FeeQuote, WorkflowSession};
use crate::workflow::steps::{
    fee_payment_preconditions, flag_action_preconditions, sweep_preconditions, FlagAction, Precondition,
    WorkflowStep,
};

const ISSUER_SIGN_IN_INSTRUCTION: &str =
    "Please sign in with the account you want to blackhole.\n\nThis account becomes the ISSUER for the next steps.";
const RECIPIENT_SIGN_IN_INSTRUCTION: &str =
    "Please sign in with the account that should receive the remaining XRP of the ISSUER.";
const FEE_INSTRUCTION: &str = "Pay the blackhole service fee.\n\nPlease sign with the ISSUER account!";

/// Called with every submitted request so the presentation layer can show its sign link.
pub type SubmissionListener = Arc<dyn Fn(&RequestHandle, &SigningRequest) + Send + Sync>;

/// External collaborators of the orchestrator.
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn LedgerQueryClient>,
    pub gateway: Arc<dyn SigningRequestGateway>,
    pub backend: Arc<dyn ValidationBackend>,
    pub notifications: Arc<dyn NotificationSource>,
}

/// Whether a fee for an issuer was already paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeStatus {
    pub issuer: String,
    pub network: Network,
    pub paid: bool,
    pub quote: Option<FeeQuote>,
}

enum Signature {
    Confirmed { account: String, txid: Option<String> },
    Declined,
}

/// Composes ledger queries, signing and validation into workflow operations.
pub struct WorkflowOrchestrator {
    ledger: Arc<dyn LedgerQueryClient>,
    gateway: Arc<dyn SigningRequestGateway>,
    backend: Arc<dyn ValidationBackend>,
    waiter: ResolutionWaiter,
    validator: TransactionValidator,
    fee: FeeConfig,
    expiry: Duration,
    scan: ScanLimits,
    listener: Option<SubmissionListener>,
}

impl WorkflowOrchestrator {
    pub fn new(collaborators: Collaborators, config: &BlackholeConfig, shutdown: Shutdown) -> Self {
        let scan = ScanLimits::from(&config.ledger);
        let validator = TransactionValidator::new(
            collaborators.ledger.clone(),
            collaborators.backend.clone(),
            config.validation.clone(),
            scan,
        );

        Self {
            ledger: collaborators.ledger,
            gateway: collaborators.gateway,
            backend: collaborators.backend,
            waiter: ResolutionWaiter::new(collaborators.notifications, shutdown),
            validator,
            fee: config.fee.clone(),
            expiry: Duration::from_secs(config.signer.expiry_secs),
            scan,
            listener: None,
        }
    }

    pub fn with_submission_listener(mut self, listener: SubmissionListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sign in with the account to blackhole and make it the session issuer.
    pub async fn change_signer(&self, session: &mut WorkflowSession) -> WorkflowResult<StepOutcome> {
        let request = self.request(TransactionTemplate::sign_in(), ISSUER_SIGN_IN_INSTRUCTION);
        let (account, txid) = match self.sign(session, request, None, &ExpectedEffect::SignIn).await? {
            Signature::Declined => return Ok(StepOutcome::Declined),
            Signature::Confirmed { account, txid } => (account, txid),
        };

        tracing::info!(session = %session.id(), account = %account, network = %session.network(), "Issuer selected");
        session.select_issuer(account.clone());
        self.refresh_account(session).await?;
        self.check_prior_fee_payment(session).await?;

        Ok(StepOutcome::Completed { account, txid })
    }

    /// Sign in with the account that receives the swept balance.
    pub async fn sign_in_recipient(&self, session: &mut WorkflowSession) -> WorkflowResult<StepOutcome> {
        if session.issuer().is_none() {
            return Err(WorkflowError::precondition(
                "sign_in_recipient",
                vec![Precondition::IssuerNotSelected],
            ));
        }

        let request = self.request(TransactionTemplate::sign_in(), RECIPIENT_SIGN_IN_INSTRUCTION);
        let (account, txid) = match self.sign(session, request, None, &ExpectedEffect::SignIn).await? {
            Signature::Declined => return Ok(StepOutcome::Declined),
            Signature::Confirmed { account, txid } => (account, txid),
        };

        if session.issuer() == Some(account.as_str()) {
            return Err(WorkflowError::precondition(
                "sign_in_recipient",
                vec![Precondition::RecipientIsIssuer],
            ));
        }

        let info = account_info(self.ledger.as_ref(), "load_recipient", &account, false, session.network()).await?;
        session.select_recipient(account.clone());
        session.set_recipient_snapshot(AccountSnapshot::from_account_info(&info, None));
        tracing::info!(session = %session.id(), account = %account, "Recipient selected");

        Ok(StepOutcome::Completed { account, txid })
    }

    /// Scan the issuer's history for a fee already paid. Advances the step either way.
    pub async fn check_prior_fee_payment(&self, session: &mut WorkflowSession) -> WorkflowResult<bool> {
        let issuer = require_issuer(session, "check_prior_fee_payment")?;
        let quote = self.fee_quote(session).await;
        let criteria = PaymentCriteria::fee(&quote.recipient, quote.amount_drops, &issuer);

        let found = find_payment(self.ledger.as_ref(), &issuer, &criteria, session.network(), self.scan).await?;
        match &found {
            Some(entry) => {
                tracing::info!(account = %issuer, hash = ?entry.hash, "Fee already paid, skipping fee step");
                session.mark_fee_paid();
            }
            None => session.advance_to(WorkflowStep::FeePayment),
        }

        Ok(found.is_some())
    }

    /// Pay the service fee from the issuer.
    pub async fn pay_fee(&self, session: &mut WorkflowSession) -> WorkflowResult<StepOutcome> {
        if session.fee_paid() {
            return Ok(StepOutcome::AlreadySatisfied);
        }
        let unmet = fee_payment_preconditions(session);
        if !unmet.is_empty() {
            return Err(WorkflowError::precondition("pay_fee", unmet));
        }

        let issuer = require_issuer(session, "pay_fee")?;
        let quote = self.fee_quote(session).await;
        let criteria = PaymentCriteria::fee(&quote.recipient, quote.amount_drops, &issuer);
        let template = TransactionTemplate::for_account(
            &issuer,
            TransactionKind::Payment {
                destination: quote.recipient.clone(),
                amount_drops: quote.amount_drops,
                memos: criteria.memos(),
            },
        );

        let request = self.request(template, FEE_INSTRUCTION);
        let effect = ExpectedEffect::FeePayment(criteria);
        match self.sign(session, request, Some(issuer), &effect).await? {
            Signature::Declined => Ok(StepOutcome::Declined),
            Signature::Confirmed { account, txid } => {
                session.mark_fee_paid();
                self.refresh_after_confirmation(session).await;
                Ok(StepOutcome::Completed { account, txid })
            }
        }
    }

    pub async fn disallow_incoming_xrp(&self, session: &mut WorkflowSession) -> WorkflowResult<StepOutcome> {
        self.run_flag_action(session, FlagAction::DisallowIncomingXrp).await
    }

    pub async fn set_unrecoverable_regular_key(&self, session: &mut WorkflowSession) -> WorkflowResult<StepOutcome> {
        self.run_flag_action(session, FlagAction::SetUnrecoverableRegularKey).await
    }

    pub async fn disable_master_key(&self, session: &mut WorkflowSession) -> WorkflowResult<StepOutcome> {
        self.run_flag_action(session, FlagAction::DisableMasterKey).await
    }

    pub async fn delete_signer_list(&self, session: &mut WorkflowSession) -> WorkflowResult<StepOutcome> {
        self.run_flag_action(session, FlagAction::DeleteSignerList).await
    }

    /// Run one flag action by value, for callers iterating the checklist.
    pub async fn run_flag_action(&self, session: &mut WorkflowSession, action: FlagAction) -> WorkflowResult<StepOutcome> {
        let unmet = flag_action_preconditions(session);
        if !unmet.is_empty() {
            return Err(WorkflowError::precondition(action.label(), unmet));
        }
        let issuer = require_issuer(session, action.label())?;

        if session.issuer_snapshot().is_some_and(|s| action.is_satisfied(s)) {
            session.checklist_mut().confirm(action);
            session.sync_progress();
            return Ok(StepOutcome::AlreadySatisfied);
        }

        let prior = session.checklist_mut().begin(action);
        let template = TransactionTemplate::for_account(&issuer, action.transaction());
        let request = self.request(template, action.instruction());

        match self.sign(session, request, Some(issuer), &action.effect()).await {
            Ok(Signature::Confirmed { account, txid }) => {
                session.checklist_mut().confirm(action);
                self.refresh_after_confirmation(session).await;
                session.sync_progress();
                Ok(StepOutcome::Completed { account, txid })
            }
            Ok(Signature::Declined) => {
                session.checklist_mut().restore(action, prior);
                Ok(StepOutcome::Declined)
            }
            Err(e) => {
                session.checklist_mut().restore(action, prior);
                if let WorkflowError::ValidationMismatch { discrepancy, .. } = &e {
                    tracing::warn!(step = action.label(), discrepancy = ?discrepancy, "Checklist entry rolled back");
                }
                Err(e)
            }
        }
    }

    /// Send the issuer's whole spendable balance to the recipient.
    pub async fn sweep_remaining_balance(&self, session: &mut WorkflowSession) -> WorkflowResult<StepOutcome> {
        let issuer = require_issuer(session, "sweep_remaining_balance")?;
        self.refresh_account(session).await?;

        let drops = sweep_preconditions(session)
            .map_err(|unmet| WorkflowError::precondition("sweep_remaining_balance", unmet))?;
        let Some(recipient) = session.recipient().map(str::to_string) else {
            return Err(WorkflowError::precondition(
                "sweep_remaining_balance",
                vec![Precondition::RecipientNotSelected],
            ));
        };

        let criteria = PaymentCriteria::transfer(&recipient, drops);
        let template = TransactionTemplate::for_account(
            &issuer,
            TransactionKind::Payment {
                destination: recipient,
                amount_drops: drops,
                memos: Vec::new(),
            },
        );
        let instruction = format!(
            "Sending {} XRP to the account of your choice.\n\nPlease sign with the ISSUER account!",
            drops_to_units(drops)
        );

        let request = self.request(template, instruction);
        match self.sign(session, request, Some(issuer), &ExpectedEffect::Payment(criteria)).await? {
            Signature::Declined => Ok(StepOutcome::Declined),
            Signature::Confirmed { account, txid } => {
                session.advance_to(WorkflowStep::Complete);
                self.refresh_after_confirmation(session).await;
                Ok(StepOutcome::Completed { account, txid })
            }
        }
    }

    /// Reload the issuer snapshot and return its derived state.
    ///
    /// A failed account query keeps the previous snapshot. Failed trust lines
    /// keep the previous token balance flag, or leave it unknown.
    pub async fn refresh_account(&self, session: &mut WorkflowSession) -> WorkflowResult<AccountState> {
        let issuer = require_issuer(session, "refresh_account")?;
        let network = session.network();
        let reserves = self.reserves(session).await?;

        let info = account_info(self.ledger.as_ref(), "refresh_issuer", &issuer, true, network).await?;
        let previous_token_balance = session.issuer_snapshot().and_then(|s| s.has_token_balance);
        let has_token_balance = match account_lines(self.ledger.as_ref(), "refresh_issuer", &issuer, network).await {
            Ok(lines) => Some(has_non_zero_token_balance(&lines)),
            Err(e) => {
                tracing::warn!(account = %issuer, error = %e, "Trust lines unavailable, keeping last known token state");
                previous_token_balance
            }
        };

        let snapshot = AccountSnapshot::from_account_info(&info, has_token_balance);
        let state = snapshot.evaluate(&reserves);
        session.set_issuer_snapshot(snapshot);
        Ok(state)
    }

    /// Derived state of any account, outside a workflow.
    pub async fn inspect(&self, account: &str, network: Network) -> WorkflowResult<AccountState> {
        let mut scratch = WorkflowSession::new(network);
        scratch.select_issuer(account.to_string());
        self.refresh_account(&mut scratch).await
    }

    /// Whether `issuer` already paid the fee, outside a workflow.
    pub async fn fee_status(&self, issuer: &str, network: Network) -> WorkflowResult<FeeStatus> {
        let mut scratch = WorkflowSession::new(network);
        scratch.select_issuer(issuer.to_string());
        let paid = self.check_prior_fee_payment(&mut scratch).await?;
        Ok(FeeStatus {
            issuer: issuer.to_string(),
            network,
            paid,
            quote: scratch.fee().cloned(),
        })
    }

    /// Reset the session and forget its settled requests.
    pub fn reset(&self, session: &mut WorkflowSession) {
        let forgotten = session.reset();
        self.waiter.forget(&forgotten);
    }

    /// Reserve schedule, fetched once per session.
    async fn reserves(&self, session: &mut WorkflowSession) -> WorkflowResult<ReserveSchedule> {
        if let Some(reserves) = session.reserves() {
            return Ok(*reserves);
        }
        let settings = fee_settings(self.ledger.as_ref(), "load_reserves", session.network()).await?;
        let reserves = ReserveSchedule::from(settings);
        tracing::debug!(
            network = %session.network(),
            base = reserves.base_reserve_drops,
            owner = reserves.owner_reserve_drops,
            "Reserve schedule loaded"
        );
        session.set_reserves(reserves);
        Ok(reserves)
    }

    /// Fee amount for this session, preferring the backend's fixed amount.
    async fn fee_quote(&self, session: &mut WorkflowSession) -> FeeQuote {
        if let Some(quote) = session.fee() {
            return quote.clone();
        }

        let mut amount_drops = self.fee.amount_drops;
        if self.fee.use_backend_fixed_amount {
            match self.backend.fixed_amounts().await {
                Ok(amounts) => match amounts.native_drops() {
                    Some(drops) => amount_drops = drops,
                    None if amounts.is_issued_currency() => {
                        tracing::warn!("Backend fixed amount is an issued currency, using configured fee")
                    }
                    None => {}
                },
                Err(e) => tracing::warn!(error = %e, "Fixed amounts unavailable, using configured fee"),
            }
        }

        let quote = FeeQuote {
            recipient: self.fee.recipient.clone(),
            amount_drops,
        };
        session.set_fee(quote.clone());
        quote
    }

    async fn refresh_after_confirmation(&self, session: &mut WorkflowSession) {
        if let Err(e) = self.refresh_account(session).await {
            tracing::warn!(session = %session.id(), error = %e, "Refresh after confirmed step failed");
        }
    }

    fn request(&self, template: TransactionTemplate, instruction: impl Into<String>) -> SigningRequest {
        SigningRequest::new(template, instruction).with_expiry(self.expiry)
    }

    /// Submit, wait and validate one signing request.
    async fn sign(
        &self,
        session: &mut WorkflowSession,
        request: SigningRequest,
        expected_account: Option<String>,
        effect: &ExpectedEffect,
    ) -> WorkflowResult<Signature> {
        let handle = self.gateway.submit(&request).await?;
        session.track_request(handle.id);
        if let Some(listener) = &self.listener {
            listener(&handle, &request);
        }

        match self.waiter.wait(session.id(), &handle).await? {
            SigningResolution::Signed { .. } => {}
            SigningResolution::Declined { request_id } => {
                tracing::info!(request_id = %request_id, step = effect.label(), "Signing request declined");
                return Ok(Signature::Declined);
            }
            SigningResolution::Expired { request_id } => return Err(WorkflowError::SignerTimeout { request_id }),
        }

        let validation = self
            .validator
            .validate(handle.id, expected_account.as_deref(), effect, session.network())
            .await?;

        match (validation.success, validation.account) {
            (true, Some(account)) => Ok(Signature::Confirmed {
                account,
                txid: validation.txid,
            }),
            (_, account) => Err(WorkflowError::ValidationMismatch {
                step: effect.label(),
                request_id: handle.id,
                discrepancy: validation
                    .discrepancy
                    .unwrap_or(Discrepancy::InvalidAccount { reported: account }),
            }),
        }
    }
}

fn require_issuer(session: &WorkflowSession, step: &'static str) -> WorkflowResult<String> {
    session
        .issuer()
        .map(str::to_string)
        .ok_or_else(|| WorkflowError::precondition(step, vec![Precondition::IssuerNotSelected]))
}
