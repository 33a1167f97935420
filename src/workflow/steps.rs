//! Workflow steps, the flag checklist and step guards.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::account::address::BLACKHOLE_ADDRESS;
use crate::account::flags::{SET_FLAG_DISABLE_MASTER, SET_FLAG_DISALLOW_XRP};
use crate::account::AccountSnapshot;
use crate::signer::TransactionKind;
use crate::validator::ExpectedEffect;
use crate::workflow::session::WorkflowSession;

/// Top-level workflow position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    AccountSelection,
    FeePayment,
    FlagConfiguration,
    BalanceSweep,
    Complete,
}

impl WorkflowStep {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStep::AccountSelection => "account_selection",
            WorkflowStep::FeePayment => "fee_payment",
            WorkflowStep::FlagConfiguration => "flag_configuration",
            WorkflowStep::BalanceSweep => "balance_sweep",
            WorkflowStep::Complete => "complete",
        }
    }
}

/// One of the four independent account configuration transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagAction {
    DisallowIncomingXrp,
    SetUnrecoverableRegularKey,
    DisableMasterKey,
    DeleteSignerList,
}

impl FlagAction {
    pub const ALL: [FlagAction; 4] = [
        FlagAction::DisallowIncomingXrp,
        FlagAction::SetUnrecoverableRegularKey,
        FlagAction::DisableMasterKey,
        FlagAction::DeleteSignerList,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FlagAction::DisallowIncomingXrp => "disallow_incoming_xrp",
            FlagAction::SetUnrecoverableRegularKey => "set_regular_key",
            FlagAction::DisableMasterKey => "disable_master_key",
            FlagAction::DeleteSignerList => "delete_signer_list",
        }
    }

    pub fn transaction(self) -> TransactionKind {
        match self {
            FlagAction::DisallowIncomingXrp => TransactionKind::AccountSet {
                set_flag: SET_FLAG_DISALLOW_XRP,
            },
            FlagAction::SetUnrecoverableRegularKey => TransactionKind::SetRegularKey {
                regular_key: BLACKHOLE_ADDRESS.to_string(),
            },
            FlagAction::DisableMasterKey => TransactionKind::AccountSet {
                set_flag: SET_FLAG_DISABLE_MASTER,
            },
            FlagAction::DeleteSignerList => TransactionKind::SignerListSet { signer_quorum: 0 },
        }
    }

    pub fn effect(self) -> ExpectedEffect {
        match self {
            FlagAction::DisallowIncomingXrp => ExpectedEffect::IncomingXrpDisallowed,
            FlagAction::SetUnrecoverableRegularKey => ExpectedEffect::RegularKeyBlackholed,
            FlagAction::DisableMasterKey => ExpectedEffect::MasterKeyDisabled,
            FlagAction::DeleteSignerList => ExpectedEffect::SignerListRemoved,
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            FlagAction::DisallowIncomingXrp => "Disallow incoming XRP payments.\n\nPlease sign with the ISSUER account!",
            FlagAction::SetUnrecoverableRegularKey => {
                "Set the regular key to an unrecoverable address.\n\nPlease sign with the ISSUER account!"
            }
            FlagAction::DisableMasterKey => {
                "Disable the master key. This cannot be undone.\n\nPlease sign with the ISSUER account!"
            }
            FlagAction::DeleteSignerList => "Delete the signer list.\n\nPlease sign with the ISSUER account!",
        }
    }

    /// Whether the ledger already shows this action's effect.
    pub fn is_satisfied(self, snapshot: &AccountSnapshot) -> bool {
        match self {
            FlagAction::DisallowIncomingXrp => snapshot.incoming_xrp_disallowed(),
            FlagAction::SetUnrecoverableRegularKey => snapshot.regular_key_blackholed(),
            FlagAction::DisableMasterKey => snapshot.master_key_disabled(),
            FlagAction::DeleteSignerList => !snapshot.has_signer_list,
        }
    }
}

/// Confirmation state of one flag action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Unconfirmed,
    /// A signing request for the action is outstanding.
    Pending,
    Confirmed,
}

/// Status of the four flag actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagChecklist {
    statuses: BTreeMap<FlagAction, ActionStatus>,
}

impl Default for FlagChecklist {
    fn default() -> Self {
        Self {
            statuses: FlagAction::ALL
                .into_iter()
                .map(|action| (action, ActionStatus::Unconfirmed))
                .collect(),
        }
    }
}

impl FlagChecklist {
    pub fn status(&self, action: FlagAction) -> ActionStatus {
        self.statuses.get(&action).copied().unwrap_or(ActionStatus::Unconfirmed)
    }

    /// Mark `action` pending and return the status to restore on failure.
    pub(crate) fn begin(&mut self, action: FlagAction) -> ActionStatus {
        let prior = self.status(action);
        self.statuses.insert(action, ActionStatus::Pending);
        prior
    }

    pub(crate) fn restore(&mut self, action: FlagAction, prior: ActionStatus) {
        self.statuses.insert(action, prior);
    }

    pub(crate) fn confirm(&mut self, action: FlagAction) {
        self.statuses.insert(action, ActionStatus::Confirmed);
    }

    /// Align every non-pending action with what the ledger shows.
    pub(crate) fn sync(&mut self, snapshot: &AccountSnapshot) {
        for action in FlagAction::ALL {
            if self.status(action) == ActionStatus::Pending {
                continue;
            }
            let status = if action.is_satisfied(snapshot) {
                ActionStatus::Confirmed
            } else {
                ActionStatus::Unconfirmed
            };
            self.statuses.insert(action, status);
        }
    }

    pub fn all_confirmed(&self) -> bool {
        FlagAction::ALL
            .iter()
            .all(|action| self.status(*action) == ActionStatus::Confirmed)
    }
}

/// A guard condition that does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Precondition {
    IssuerNotSelected,
    FeeNotPaid,
    WrongStep { current: WorkflowStep },
    ReservesUnknown,
    NothingToSweep,
    RecipientNotSelected,
    RecipientIsIssuer,
    MasterKeyEnabled,
}

impl Precondition {
    pub fn describe(&self) -> &'static str {
        match self {
            Precondition::IssuerNotSelected => "no issuer account has been signed in",
            Precondition::FeeNotPaid => "the service fee has not been paid",
            Precondition::WrongStep { .. } => "the workflow is at a different step",
            Precondition::ReservesUnknown => "reserve requirements could not be loaded",
            Precondition::NothingToSweep => "there is no spendable balance",
            Precondition::RecipientNotSelected => "no recipient account has been signed in",
            Precondition::RecipientIsIssuer => "the recipient must differ from the issuer",
            Precondition::MasterKeyEnabled => "the master key is still enabled and skipping it was not acknowledged",
        }
    }
}

/// Guard for the fee payment step.
pub fn fee_payment_preconditions(session: &WorkflowSession) -> Vec<Precondition> {
    let mut unmet = Vec::new();
    if session.issuer().is_none() {
        unmet.push(Precondition::IssuerNotSelected);
    }
    if session.step() != WorkflowStep::FeePayment {
        unmet.push(Precondition::WrongStep { current: session.step() });
    }
    unmet
}

/// Guard for the flag configuration actions.
pub fn flag_action_preconditions(session: &WorkflowSession) -> Vec<Precondition> {
    let mut unmet = Vec::new();
    if session.issuer().is_none() {
        unmet.push(Precondition::IssuerNotSelected);
    }
    if !session.fee_paid() {
        unmet.push(Precondition::FeeNotPaid);
    }
    if !matches!(session.step(), WorkflowStep::FlagConfiguration | WorkflowStep::BalanceSweep) {
        unmet.push(Precondition::WrongStep { current: session.step() });
    }
    unmet
}

/// Guard for the balance sweep. Returns the drops to sweep when every condition holds.
pub fn sweep_preconditions(session: &WorkflowSession) -> Result<u64, Vec<Precondition>> {
    let mut unmet = flag_action_preconditions(session);

    let spendable = match (session.issuer_snapshot(), session.reserves()) {
        (Some(snapshot), Some(reserves)) => Some(snapshot.spendable_drops(reserves)),
        (Some(_), None) => {
            unmet.push(Precondition::ReservesUnknown);
            None
        }
        (None, _) => None,
    };
    if spendable == Some(0) {
        unmet.push(Precondition::NothingToSweep);
    }

    match session.recipient() {
        None => unmet.push(Precondition::RecipientNotSelected),
        Some(recipient) if session.issuer() == Some(recipient) => unmet.push(Precondition::RecipientIsIssuer),
        Some(_) => {}
    }

    let master_disabled = session
        .issuer_snapshot()
        .is_some_and(AccountSnapshot::master_key_disabled);
    if !master_disabled && !session.master_key_skip_acknowledged() {
        unmet.push(Precondition::MasterKeyEnabled);
    }

    match spendable {
        Some(drops) if unmet.is_empty() => Ok(drops),
        _ => {
            if unmet.is_empty() {
                unmet.push(Precondition::IssuerNotSelected);
            }
            Err(unmet)
        }
    }
}
