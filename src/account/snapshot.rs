//! Account snapshot and reserve schedule.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::account::address::BLACKHOLE_ADDRESS;
use crate::account::evaluator;
use crate::ledger::{AccountInfo, FeeSettings};

/// Network reserve requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReserveSchedule {
    /// Minimum balance every account must keep.
    pub base_reserve_drops: u64,
    /// Additional reserve per owned ledger object.
    pub owner_reserve_drops: u64,
}

impl From<FeeSettings> for ReserveSchedule {
    fn from(settings: FeeSettings) -> Self {
        Self {
            base_reserve_drops: settings.reserve_base_drops,
            owner_reserve_drops: settings.reserve_increment_drops,
        }
    }
}

/// Immutable view of one account at one point in time.
///
/// Only raw ledger fields are stored; every derived flag is computed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub address: String,
    pub balance_drops: u64,
    pub owner_count: u32,
    /// Raw `Flags` bitmask.
    pub flags: u32,
    pub regular_key: Option<String>,
    pub has_signer_list: bool,
    /// `None` while trust lines could not be loaded.
    pub has_token_balance: Option<bool>,
}

impl AccountSnapshot {
    pub fn from_account_info(info: &AccountInfo, has_token_balance: Option<bool>) -> Self {
        let data = &info.account_data;
        Self {
            address: data.account.clone(),
            balance_drops: data.balance,
            owner_count: data.owner_count,
            flags: data.flags,
            regular_key: data.regular_key.clone(),
            has_signer_list: info.signer_list_count > 0,
            has_token_balance,
        }
    }

    pub fn master_key_disabled(&self) -> bool {
        evaluator::master_key_disabled(self.flags)
    }

    pub fn incoming_xrp_disallowed(&self) -> bool {
        evaluator::incoming_xrp_disallowed(self.flags)
    }

    pub fn regular_key_blackholed(&self) -> bool {
        self.regular_key.as_deref() == Some(BLACKHOLE_ADDRESS)
    }

    pub fn has_owner_objects(&self) -> bool {
        self.owner_count > 0
    }

    /// No key, regular key or signer list can sign for the account anymore.
    pub fn is_blackholed(&self) -> bool {
        self.master_key_disabled()
            && (self.regular_key.is_none() || self.regular_key_blackholed())
            && !self.has_signer_list
    }

    pub fn spendable_drops(&self, reserves: &ReserveSchedule) -> u64 {
        evaluator::spendable_drops(self, reserves)
    }

    pub fn spendable_balance(&self, reserves: &ReserveSchedule) -> Decimal {
        evaluator::spendable_balance(self, reserves)
    }

    /// All derived flags at once, for presentation.
    pub fn evaluate(&self, reserves: &ReserveSchedule) -> AccountState {
        AccountState {
            address: self.address.clone(),
            master_key_disabled: self.master_key_disabled(),
            incoming_xrp_disallowed: self.incoming_xrp_disallowed(),
            regular_key_blackholed: self.regular_key_blackholed(),
            has_signer_list: self.has_signer_list,
            has_token_balance: self.has_token_balance,
            has_owner_objects: self.has_owner_objects(),
            spendable_balance: self.spendable_balance(reserves),
            blackholed: self.is_blackholed(),
        }
    }
}

/// Derived account flags, recomputed from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountState {
    pub address: String,
    pub master_key_disabled: bool,
    pub incoming_xrp_disallowed: bool,
    pub regular_key_blackholed: bool,
    pub has_signer_list: bool,
    pub has_token_balance: Option<bool>,
    pub has_owner_objects: bool,
    pub spendable_balance: Decimal,
    pub blackholed: bool,
}
