//! Classic account address syntax.

/// Base58 alphabet used by the ledger (differs from Bitcoin's ordering).
const LEDGER_ALPHABET: &str = "rpshnaf39wBUDNEGHJKLM4PQRST7VWXYZ2bcdeCg65jkm8oFqi1tuvAxyz";

/// Address whose key nobody can hold; used as the unrecoverable regular key.
pub const BLACKHOLE_ADDRESS: &str = "rrrrrrrrrrrrrrrrrrrrBZbvji";

/// Whether `candidate` is a syntactically valid classic address.
///
/// Checks the leading `r`, the length bounds and the alphabet. The checksum is
/// not verified; the ledger rejects such addresses on query.
pub fn is_valid_classic_address(candidate: &str) -> bool {
    let len = candidate.len();
    (25..=35).contains(&len)
        && candidate.starts_with('r')
        && candidate.chars().all(|c| LEDGER_ALPHABET.contains(c))
}
