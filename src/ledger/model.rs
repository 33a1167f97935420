//! Typed views over ledger response objects.
//!
//! Only the fields the workflow reads are modelled; everything else is ignored.

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

/// `account_data` of an `account_info` result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountRoot {
    pub account: String,

    /// Balance in drops.
    #[serde(deserialize_with = "drops")]
    pub balance: u64,

    #[serde(default)]
    pub flags: u32,

    #[serde(default)]
    pub owner_count: u32,

    #[serde(default)]
    pub regular_key: Option<String>,

    #[serde(default)]
    pub sequence: u32,

    /// Older servers nest signer lists inside `account_data`.
    #[serde(default, rename = "signer_lists")]
    pub signer_lists: Option<Vec<Value>>,
}

/// One trust line from `account_lines`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrustLine {
    /// Counterparty.
    pub account: String,
    /// Signed decimal string, from this account's perspective.
    pub balance: String,
    pub currency: String,
    #[serde(default)]
    pub limit: Option<String>,
}

/// Network fee settings ledger object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSettings {
    pub reserve_base_drops: u64,
    pub reserve_increment_drops: u64,
}

impl FeeSettings {
    /// Read either the legacy numeric fields or the newer `*Drops` string fields.
    pub fn from_node(node: &Value) -> Option<Self> {
        let base = drops_field(node, "ReserveBaseDrops").or_else(|| drops_field(node, "ReserveBase"))?;
        let increment = drops_field(node, "ReserveIncrementDrops")
            .or_else(|| drops_field(node, "ReserveIncrement"))?;
        Some(Self {
            reserve_base_drops: base,
            reserve_increment_drops: increment,
        })
    }
}

/// A decoded transaction memo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memo {
    pub memo_type: Option<String>,
    pub memo_data: Option<String>,
}

impl Memo {
    /// Hex-encode a memo the way the ledger stores it (upper-case hex of UTF-8).
    pub fn encode(memo_type: &str, memo_data: &str) -> Value {
        serde_json::json!({
            "Memo": {
                "MemoType": hex::encode_upper(memo_type),
                "MemoData": hex::encode_upper(memo_data),
            }
        })
    }
}

/// One entry of an `account_tx` page.
#[derive(Debug, Clone, PartialEq)]
pub struct TxEntry {
    pub hash: Option<String>,
    pub tx: Value,
    pub meta: Value,
    pub validated: bool,
}

impl TxEntry {
    /// Accepts both the `tx` (API v1) and `tx_json` (API v2) shapes.
    pub fn from_value(value: &Value) -> Option<Self> {
        let tx = value.get("tx").or_else(|| value.get("tx_json"))?.clone();
        let meta = value.get("meta").cloned().unwrap_or(Value::Null);
        let hash = value
            .get("hash")
            .or_else(|| tx.get("hash"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let validated = value.get("validated").and_then(Value::as_bool).unwrap_or(false);
        Some(Self { hash, tx, meta, validated })
    }

    pub fn transaction_type(&self) -> Option<&str> {
        self.tx.get("TransactionType").and_then(Value::as_str)
    }

    pub fn account(&self) -> Option<&str> {
        self.tx.get("Account").and_then(Value::as_str)
    }

    pub fn destination(&self) -> Option<&str> {
        self.tx.get("Destination").and_then(Value::as_str)
    }

    pub fn result(&self) -> Option<&str> {
        self.meta.get("TransactionResult").and_then(Value::as_str)
    }

    pub fn is_success(&self) -> bool {
        self.result() == Some("tesSUCCESS")
    }

    /// Delivered native amount in drops; `None` for issued-currency or missing amounts.
    pub fn delivered_drops(&self) -> Option<u64> {
        self.meta
            .get("delivered_amount")
            .or_else(|| self.meta.get("DeliveredAmount"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Decode every memo; undecodable fields become `None`.
    pub fn memos(&self) -> Vec<Memo> {
        self.tx
            .get("Memos")
            .and_then(Value::as_array)
            .map(|memos| {
                memos
                    .iter()
                    .filter_map(|m| m.get("Memo"))
                    .map(|m| Memo {
                        memo_type: decode_hex_field(m, "MemoType"),
                        memo_data: decode_hex_field(m, "MemoData"),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One page of `account_tx`.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountTxPage {
    pub transactions: Vec<TxEntry>,
    /// Opaque pagination cursor; `None` on the last page.
    pub marker: Option<Value>,
}

fn decode_hex_field(memo: &Value, field: &str) -> Option<String> {
    let raw = memo.get(field).and_then(Value::as_str)?;
    let bytes = hex::decode(raw).ok()?;
    String::from_utf8(bytes).ok()
}

fn drops_field(node: &Value, field: &str) -> Option<u64> {
    match node.get(field)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn drops<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_root_parse() {
        let root: AccountRoot = serde_json::from_value(json!({
            "Account": "rISSUER1",
            "Balance": "12000000",
            "Flags": 1048576,
            "OwnerCount": 1,
            "Sequence": 42,
            "LedgerEntryType": "AccountRoot"
        }))
        .unwrap();
        assert_eq!(root.balance, 12_000_000);
        assert_eq!(root.flags, 0x0010_0000);
        assert_eq!(root.owner_count, 1);
        assert!(root.regular_key.is_none());
        assert!(root.signer_lists.is_none());
    }

    #[test]
    fn test_account_root_rejects_bad_balance() {
        let result: Result<AccountRoot, _> =
            serde_json::from_value(json!({"Account": "rA", "Balance": "lots"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_fee_settings_both_shapes() {
        let legacy = FeeSettings::from_node(&json!({"ReserveBase": 10000000, "ReserveIncrement": 2000000}));
        let modern =
            FeeSettings::from_node(&json!({"ReserveBaseDrops": "1000000", "ReserveIncrementDrops": "200000"}));
        assert_eq!(
            legacy,
            Some(FeeSettings { reserve_base_drops: 10_000_000, reserve_increment_drops: 2_000_000 })
        );
        assert_eq!(
            modern,
            Some(FeeSettings { reserve_base_drops: 1_000_000, reserve_increment_drops: 200_000 })
        );
        assert_eq!(FeeSettings::from_node(&json!({"ReserveBase": 1})), None);
    }

    #[test]
    fn test_memo_encode_decode() {
        let encoded = Memo::encode("Blackhole-Info", r#"{"account":"rISSUER1"}"#);
        let entry = TxEntry::from_value(&json!({
            "tx": {"TransactionType": "Payment", "Memos": [encoded, {"Memo": {"MemoType": "zz"}}]},
            "meta": {"TransactionResult": "tesSUCCESS", "delivered_amount": "20000000"},
            "validated": true
        }))
        .unwrap();

        let memos = entry.memos();
        assert_eq!(memos.len(), 2);
        assert_eq!(memos[0].memo_type.as_deref(), Some("Blackhole-Info"));
        assert_eq!(memos[0].memo_data.as_deref(), Some(r#"{"account":"rISSUER1"}"#));
        assert_eq!(memos[1].memo_type, None);
        assert_eq!(entry.delivered_drops(), Some(20_000_000));
        assert!(entry.is_success());
    }

    #[test]
    fn test_tx_entry_v2_shape() {
        let entry = TxEntry::from_value(&json!({
            "tx_json": {"TransactionType": "AccountSet", "Account": "rA"},
            "meta": {"TransactionResult": "tecNO_PERMISSION"},
            "hash": "ABC"
        }))
        .unwrap();
        assert_eq!(entry.hash.as_deref(), Some("ABC"));
        assert_eq!(entry.account(), Some("rA"));
        assert!(!entry.is_success());
        assert!(!entry.validated);
        assert_eq!(entry.delivered_drops(), None);
    }
}
