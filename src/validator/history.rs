//! Transaction history scans.
//!
//! Finds a successful native payment in an account's history. Used both to
//! detect a fee that was already paid in an earlier session and to confirm a
//! just-signed payment actually landed.

use serde::Serialize;
use serde_json::Value;

use crate::config::LedgerConfig;
use crate::ledger::queries::account_transactions;
use crate::ledger::{LedgerQueryClient, LedgerResult, Network, TxEntry};

/// Memo type carrying the blackholed account of a fee payment.
pub const INFO_MEMO_TYPE: &str = "Blackhole-Info";
/// Memo type of the human-readable fee payment note.
pub const SERVICE_MEMO_TYPE: &str = "[https://xrpl.services]-Memo";
pub const SERVICE_MEMO_TEXT: &str = "Payment to blackhole XRPL account via xApp.";

/// What a matching payment looks like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentCriteria {
    pub destination: String,
    /// Exact delivered amount.
    pub amount_drops: u64,
    /// Account that must appear in the info memo, for fee payments.
    pub memo_account: Option<String>,
}

impl PaymentCriteria {
    /// A service fee payment on behalf of `issuer`.
    pub fn fee(recipient: &str, amount_drops: u64, issuer: &str) -> Self {
        Self {
            destination: recipient.to_string(),
            amount_drops,
            memo_account: Some(issuer.to_string()),
        }
    }

    /// A plain payment with no memo requirement.
    pub fn transfer(destination: &str, amount_drops: u64) -> Self {
        Self {
            destination: destination.to_string(),
            amount_drops,
            memo_account: None,
        }
    }

    /// `(MemoType, MemoData)` pairs to attach when submitting this payment.
    pub fn memos(&self) -> Vec<(String, String)> {
        match &self.memo_account {
            Some(account) => vec![
                (SERVICE_MEMO_TYPE.to_string(), SERVICE_MEMO_TEXT.to_string()),
                (INFO_MEMO_TYPE.to_string(), serde_json::json!({ "account": account }).to_string()),
            ],
            None => Vec::new(),
        }
    }

    /// Whether `entry` is a successful payment from `payer` matching these criteria.
    pub fn matches(&self, payer: &str, entry: &TxEntry) -> bool {
        entry.transaction_type() == Some("Payment")
            && entry.account() == Some(payer)
            && entry.destination() == Some(self.destination.as_str())
            && entry.is_success()
            && entry.delivered_drops() == Some(self.amount_drops)
            && self.memo_matches(entry)
    }

    fn memo_matches(&self, entry: &TxEntry) -> bool {
        let Some(expected) = &self.memo_account else {
            return true;
        };
        entry.memos().iter().any(|memo| {
            memo.memo_type.as_deref() == Some(INFO_MEMO_TYPE)
                && memo
                    .memo_data
                    .as_deref()
                    .and_then(|data| serde_json::from_str::<Value>(data).ok())
                    .and_then(|data| data.get("account").and_then(Value::as_str).map(str::to_string))
                    .as_deref()
                    == Some(expected.as_str())
        })
    }
}

/// Bounds of a history scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    /// Maximum number of entries inspected.
    pub max_entries: u32,
    pub page_size: u32,
}

impl From<&LedgerConfig> for ScanLimits {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            max_entries: config.history_limit,
            page_size: config.history_page_size,
        }
    }
}

/// Walk `payer`'s history, newest first, until a matching payment or the limit.
pub async fn find_payment(
    client: &dyn LedgerQueryClient,
    payer: &str,
    criteria: &PaymentCriteria,
    network: Network,
    limits: ScanLimits,
) -> LedgerResult<Option<TxEntry>> {
    let mut marker = None;
    let mut scanned: u32 = 0;

    while scanned < limits.max_entries {
        let page_size = limits.page_size.min(limits.max_entries - scanned).max(1);
        let page = account_transactions(client, "payment_scan", payer, page_size, marker, network).await?;
        let page_len = page.transactions.len() as u32;

        if let Some(found) = page.transactions.into_iter().find(|entry| criteria.matches(payer, entry)) {
            tracing::debug!(
                account = %payer,
                network = %network,
                hash = ?found.hash,
                "Matching payment found in history"
            );
            return Ok(Some(found));
        }

        scanned = scanned.saturating_add(page_len);
        match page.marker {
            Some(next) if page_len > 0 => marker = Some(next),
            _ => break,
        }
    }

    tracing::debug!(account = %payer, network = %network, scanned = scanned, "No matching payment in history");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::queries::testing::ScriptedLedger;
    use crate::ledger::{Command, Memo, QueryResponse};
    use serde_json::json;

    const ISSUER: &str = "rISSUER1xxxxxxxxxxxxxxxxxxxxxxx";
    const RECIPIENT: &str = "rNixerUVPwrhxGDt4UooDu6FJ7zuofvjCF";

    fn payment(destination: &str, delivered: &str, memo_account: Option<&str>) -> Value {
        let mut memos = Vec::new();
        if let Some(account) = memo_account {
            memos.push(Memo::encode(SERVICE_MEMO_TYPE, SERVICE_MEMO_TEXT));
            memos.push(Memo::encode(INFO_MEMO_TYPE, &json!({ "account": account }).to_string()));
        }
        json!({
            "tx": {
                "TransactionType": "Payment",
                "Account": ISSUER,
                "Destination": destination,
                "Amount": delivered,
                "Memos": memos,
                "hash": "ABC"
            },
            "meta": { "TransactionResult": "tesSUCCESS", "delivered_amount": delivered },
            "validated": true
        })
    }

    fn entry(value: Value) -> TxEntry {
        TxEntry::from_value(&value).unwrap()
    }

    #[test]
    fn test_fee_criteria_matching() {
        let criteria = PaymentCriteria::fee(RECIPIENT, 20_000_000, ISSUER);

        assert!(criteria.matches(ISSUER, &entry(payment(RECIPIENT, "20000000", Some(ISSUER)))));
        assert!(!criteria.matches(ISSUER, &entry(payment(RECIPIENT, "19999999", Some(ISSUER)))));
        assert!(!criteria.matches(ISSUER, &entry(payment(RECIPIENT, "20000000", Some("rOTHER")))));
        assert!(!criteria.matches(ISSUER, &entry(payment(RECIPIENT, "20000000", None))));
        assert!(!criteria.matches(ISSUER, &entry(payment("rELSEWHERE", "20000000", Some(ISSUER)))));
        assert!(!criteria.matches("rSOMEONEELSE", &entry(payment(RECIPIENT, "20000000", Some(ISSUER)))));
    }

    #[test]
    fn test_failed_payment_does_not_match() {
        let mut value = payment(RECIPIENT, "20000000", Some(ISSUER));
        value["meta"]["TransactionResult"] = json!("tecUNFUNDED_PAYMENT");
        let criteria = PaymentCriteria::fee(RECIPIENT, 20_000_000, ISSUER);
        assert!(!criteria.matches(ISSUER, &entry(value)));
    }

    #[test]
    fn test_fee_memos() {
        let memos = PaymentCriteria::fee(RECIPIENT, 1, ISSUER).memos();
        assert_eq!(memos.len(), 2);
        assert_eq!(memos[1].0, INFO_MEMO_TYPE);
        assert_eq!(memos[1].1, format!(r#"{{"account":"{}"}}"#, ISSUER));
        assert!(PaymentCriteria::transfer(RECIPIENT, 1).memos().is_empty());
    }

    #[tokio::test]
    async fn test_scan_follows_marker() {
        let ledger = ScriptedLedger::new(|command, _| match command {
            Command::AccountTransactions { marker: None, .. } => QueryResponse::Success(json!({
                "transactions": [payment("rELSEWHERE", "5", None)],
                "marker": {"ledger": 10, "seq": 1}
            })),
            Command::AccountTransactions { marker: Some(_), .. } => QueryResponse::Success(json!({
                "transactions": [payment(RECIPIENT, "20000000", Some(ISSUER))]
            })),
            _ => QueryResponse::Malformed,
        });

        let criteria = PaymentCriteria::fee(RECIPIENT, 20_000_000, ISSUER);
        let limits = ScanLimits { max_entries: 100, page_size: 10 };
        let found = find_payment(&ledger, ISSUER, &criteria, Network::Test, limits).await.unwrap();

        assert!(found.is_some());
        assert_eq!(ledger.call_count(), 2);
    }

    #[tokio::test]
    async fn test_scan_stops_at_limit() {
        let ledger = ScriptedLedger::new(|_, _| {
            QueryResponse::Success(json!({
                "transactions": [payment("rELSEWHERE", "5", None), payment("rELSEWHERE", "6", None)],
                "marker": "next"
            }))
        });

        let criteria = PaymentCriteria::transfer(RECIPIENT, 1);
        let limits = ScanLimits { max_entries: 5, page_size: 2 };
        let found = find_payment(&ledger, ISSUER, &criteria, Network::Main, limits).await.unwrap();

        assert!(found.is_none());
        assert_eq!(ledger.call_count(), 3);
    }
}
