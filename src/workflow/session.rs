//! Per-run workflow session state.

use serde::Serialize;
use uuid::Uuid;

use crate::account::{AccountSnapshot, ReserveSchedule};
use crate::ledger::Network;
use crate::workflow::steps::{FlagChecklist, WorkflowStep};

/// Fee amount and recipient resolved for this session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeQuote {
    pub recipient: String,
    pub amount_drops: u64,
}

/// State of one workflow run.
///
/// Passed explicitly to every orchestrator operation. Only the orchestrator
/// mutates it; the presentation layer reads it.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSession {
    id: Uuid,
    network: Network,
    step: WorkflowStep,
    issuer: Option<String>,
    recipient: Option<String>,
    issuer_snapshot: Option<AccountSnapshot>,
    recipient_snapshot: Option<AccountSnapshot>,
    reserves: Option<ReserveSchedule>,
    fee: Option<FeeQuote>,
    fee_paid: bool,
    checklist: FlagChecklist,
    master_key_skip_acknowledged: bool,
    #[serde(skip)]
    request_ids: Vec<Uuid>,
}

impl WorkflowSession {
    pub fn new(network: Network) -> Self {
        Self {
            id: Uuid::new_v4(),
            network,
            step: WorkflowStep::AccountSelection,
            issuer: None,
            recipient: None,
            issuer_snapshot: None,
            recipient_snapshot: None,
            reserves: None,
            fee: None,
            fee_paid: false,
            checklist: FlagChecklist::default(),
            master_key_skip_acknowledged: false,
            request_ids: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    pub fn issuer_snapshot(&self) -> Option<&AccountSnapshot> {
        self.issuer_snapshot.as_ref()
    }

    pub fn recipient_snapshot(&self) -> Option<&AccountSnapshot> {
        self.recipient_snapshot.as_ref()
    }

    pub fn reserves(&self) -> Option<&ReserveSchedule> {
        self.reserves.as_ref()
    }

    pub fn fee(&self) -> Option<&FeeQuote> {
        self.fee.as_ref()
    }

    pub fn fee_paid(&self) -> bool {
        self.fee_paid
    }

    pub fn checklist(&self) -> &FlagChecklist {
        &self.checklist
    }

    pub fn master_key_skip_acknowledged(&self) -> bool {
        self.master_key_skip_acknowledged
    }

    /// The user accepts sweeping without disabling the master key.
    pub fn acknowledge_master_key_skip(&mut self) {
        self.master_key_skip_acknowledged = true;
    }

    /// Back to account selection with nothing selected. The network is kept.
    pub fn reset(&mut self) -> Vec<Uuid> {
        let network = self.network;
        let request_ids = std::mem::take(&mut self.request_ids);
        *self = Self::new(network);
        request_ids
    }

    /// Reset and select another network.
    pub fn switch_network(&mut self, network: Network) -> Vec<Uuid> {
        let request_ids = self.reset();
        self.network = network;
        request_ids
    }

    /// Drop the issuer and everything derived from it.
    pub(crate) fn clear_issuer(&mut self) {
        self.issuer = None;
        self.issuer_snapshot = None;
        self.fee_paid = false;
        self.checklist = FlagChecklist::default();
        self.master_key_skip_acknowledged = false;
        self.step = WorkflowStep::AccountSelection;
    }

    pub(crate) fn select_issuer(&mut self, issuer: String) {
        self.clear_issuer();
        self.issuer = Some(issuer);
    }

    pub(crate) fn select_recipient(&mut self, recipient: String) {
        self.recipient = Some(recipient);
    }

    pub(crate) fn set_recipient_snapshot(&mut self, snapshot: AccountSnapshot) {
        self.recipient_snapshot = Some(snapshot);
    }

    /// Replace the issuer snapshot and align the checklist with it.
    pub(crate) fn set_issuer_snapshot(&mut self, snapshot: AccountSnapshot) {
        self.checklist.sync(&snapshot);
        self.issuer_snapshot = Some(snapshot);
        self.sync_progress();
    }

    pub(crate) fn set_reserves(&mut self, reserves: ReserveSchedule) {
        self.reserves = Some(reserves);
    }

    pub(crate) fn set_fee(&mut self, fee: FeeQuote) {
        self.fee = Some(fee);
    }

    pub(crate) fn mark_fee_paid(&mut self) {
        self.fee_paid = true;
        self.advance_to(WorkflowStep::FlagConfiguration);
        self.sync_progress();
    }

    /// Leave flag configuration once every action is confirmed.
    pub(crate) fn sync_progress(&mut self) {
        if self.step == WorkflowStep::FlagConfiguration && self.checklist.all_confirmed() {
            self.advance_to(WorkflowStep::BalanceSweep);
        }
    }

    pub(crate) fn checklist_mut(&mut self) -> &mut FlagChecklist {
        &mut self.checklist
    }

    /// Move forward to `step`; never moves backwards.
    pub(crate) fn advance_to(&mut self, step: WorkflowStep) {
        if step > self.step {
            tracing::info!(session = %self.id, from = self.step.as_str(), to = step.as_str(), "Workflow step advanced");
            self.step = step;
        }
    }

    pub(crate) fn track_request(&mut self, request_id: Uuid) {
        self.request_ids.push(request_id);
    }
}
