//! Account flag bit tests.
//!
//! Two numbering schemes exist: `AccountSet.SetFlag` takes a small integer,
//! while the `Flags` field of the stored account is a bitmask. Both tables live
//! here and nowhere else.

/// Bits of the `Flags` field of an account object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerFlag {
    PasswordSpent,
    RequireDestTag,
    RequireAuth,
    DisallowXrp,
    DisableMaster,
    NoFreeze,
    GlobalFreeze,
    DefaultRipple,
    DepositAuth,
}

impl LedgerFlag {
    pub const ALL: [LedgerFlag; 9] = [
        LedgerFlag::PasswordSpent,
        LedgerFlag::RequireDestTag,
        LedgerFlag::RequireAuth,
        LedgerFlag::DisallowXrp,
        LedgerFlag::DisableMaster,
        LedgerFlag::NoFreeze,
        LedgerFlag::GlobalFreeze,
        LedgerFlag::DefaultRipple,
        LedgerFlag::DepositAuth,
    ];

    pub const fn bit(self) -> u32 {
        match self {
            LedgerFlag::PasswordSpent => 0x0001_0000,
            LedgerFlag::RequireDestTag => 0x0002_0000,
            LedgerFlag::RequireAuth => 0x0004_0000,
            LedgerFlag::DisallowXrp => 0x0008_0000,
            LedgerFlag::DisableMaster => 0x0010_0000,
            LedgerFlag::NoFreeze => 0x0020_0000,
            LedgerFlag::GlobalFreeze => 0x0040_0000,
            LedgerFlag::DefaultRipple => 0x0080_0000,
            LedgerFlag::DepositAuth => 0x0100_0000,
        }
    }

    pub fn is_set(self, flags: u32) -> bool {
        flags & self.bit() != 0
    }
}

/// `SetFlag` value that disallows incoming XRP.
pub const SET_FLAG_DISALLOW_XRP: u32 = 3;
/// `SetFlag` value that disables the master key.
pub const SET_FLAG_DISABLE_MASTER: u32 = 4;

/// True iff the disable-master-key bit is set.
pub fn master_key_disabled(flags: u32) -> bool {
    LedgerFlag::DisableMaster.is_set(flags)
}

/// True iff the disallow-incoming-XRP bit is set.
pub fn incoming_xrp_disallowed(flags: u32) -> bool {
    LedgerFlag::DisallowXrp.is_set(flags)
}

/// Every flag set in `flags`.
pub fn set_flags(flags: u32) -> Vec<LedgerFlag> {
    LedgerFlag::ALL.into_iter().filter(|f| f.is_set(flags)).collect()
}
