//! Account state evaluation.
//!
//! Pure functions over raw ledger data. All reserve arithmetic and trust-line
//! balance checks happen here.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::account::snapshot::{AccountSnapshot, ReserveSchedule};
use crate::ledger::TrustLine;

pub use crate::account::flags::{incoming_xrp_disallowed, master_key_disabled};

/// Drops in one whole unit of the native currency.
pub const DROPS_PER_UNIT: u64 = 1_000_000;

/// Amounts below this many drops are dust and reported as zero.
pub const DUST_THRESHOLD_DROPS: u64 = 1;

/// Spendable drops after base and owner reserves, floored at zero.
pub fn spendable_drops(snapshot: &AccountSnapshot, reserves: &ReserveSchedule) -> u64 {
    let locked = u128::from(reserves.base_reserve_drops)
        + u128::from(snapshot.owner_count) * u128::from(reserves.owner_reserve_drops);
    let free = u128::from(snapshot.balance_drops).saturating_sub(locked);

    if free < u128::from(DUST_THRESHOLD_DROPS) {
        0
    } else {
        // free <= balance_drops, which is a u64.
        free as u64
    }
}

/// Spendable balance in whole units. Never negative.
pub fn spendable_balance(snapshot: &AccountSnapshot, reserves: &ReserveSchedule) -> Decimal {
    drops_to_units(spendable_drops(snapshot, reserves))
}

/// Exact conversion of drops into whole units.
pub fn drops_to_units(drops: u64) -> Decimal {
    Decimal::from(drops) / Decimal::from(DROPS_PER_UNIT)
}

/// True iff any trust line carries a strictly positive balance.
pub fn has_non_zero_token_balance(lines: &[TrustLine]) -> bool {
    lines.iter().any(|line| match parse_balance(&line.balance) {
        Some(balance) => balance > Decimal::ZERO,
        None => {
            tracing::warn!(
                currency = %line.currency,
                counterparty = %line.account,
                balance = %line.balance,
                "Unparseable trust line balance"
            );
            false
        }
    })
}

fn parse_balance(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}
