//! Typed query helpers built on [`LedgerQueryClient`].

use serde_json::Value;

use crate::ledger::client::LedgerQueryClient;
use crate::ledger::model::{AccountRoot, AccountTxPage, FeeSettings, TrustLine, TxEntry};
use crate::ledger::types::{Command, LedgerError, LedgerResult, Network, QueryResponse};

/// Well-known index of the network fee settings object.
pub const FEE_SETTINGS_INDEX: &str = "4BC50C9B0D8515D3EAAE1E74B29A95804346C491EE1A95BF25E4AAB854A6A651";

/// `account_info` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_data: AccountRoot,
    /// Number of signer lists attached to the account.
    pub signer_list_count: usize,
}

/// Fetch account info, optionally including signer lists.
pub async fn account_info(
    client: &dyn LedgerQueryClient,
    purpose: &str,
    account: &str,
    signer_lists: bool,
    network: Network,
) -> LedgerResult<AccountInfo> {
    let command = Command::AccountInfo {
        account: account.to_string(),
        signer_lists,
    };
    let result = match client.query(purpose, command, network).await {
        QueryResponse::Failure { reason } => {
            let err = LedgerError::from(reason);
            return Err(match err {
                LedgerError::Rejected { ref error, .. } if error == "actNotFound" => {
                    LedgerError::AccountNotFound(account.to_string())
                }
                other => other,
            });
        }
        other => other.into_result()?,
    };

    let raw = result
        .get("account_data")
        .ok_or_else(|| LedgerError::Malformed("missing account_data".to_string()))?;
    let account_data: AccountRoot =
        serde_json::from_value(raw.clone()).map_err(|e| LedgerError::Malformed(format!("account_data: {}", e)))?;

    // API v2 returns signer lists next to account_data rather than inside it.
    let signer_list_count = result
        .get("signer_lists")
        .and_then(Value::as_array)
        .map(Vec::len)
        .or_else(|| account_data.signer_lists.as_ref().map(Vec::len))
        .unwrap_or(0);

    Ok(AccountInfo {
        account_data,
        signer_list_count,
    })
}

/// Upper bound on `account_lines` pages followed for one account.
pub const MAX_TRUST_LINE_PAGES: usize = 50;

/// Fetch all of the account's trust lines from the validated ledger.
///
/// Follows the `marker` across pages. Running out of pages is an error
/// rather than a partial list, so callers never judge balances on part of the data.
pub async fn account_lines(
    client: &dyn LedgerQueryClient,
    purpose: &str,
    account: &str,
    network: Network,
) -> LedgerResult<Vec<TrustLine>> {
    let mut lines = Vec::new();
    let mut marker = None;

    for _ in 0..MAX_TRUST_LINE_PAGES {
        let command = Command::AccountLines {
            account: account.to_string(),
            marker,
        };
        let result = client.query(purpose, command, network).await.into_result()?;

        let page = result.get("lines").cloned().unwrap_or(Value::Array(Vec::new()));
        let page: Vec<TrustLine> =
            serde_json::from_value(page).map_err(|e| LedgerError::Malformed(format!("lines: {}", e)))?;
        lines.extend(page);

        marker = result.get("marker").cloned().filter(|m| !m.is_null());
        if marker.is_none() {
            return Ok(lines);
        }
    }

    Err(LedgerError::Incomplete(format!(
        "trust lines of {} exceed {} pages",
        account, MAX_TRUST_LINE_PAGES
    )))
}

/// Fetch one page of account transaction history.
pub async fn account_transactions(
    client: &dyn LedgerQueryClient,
    purpose: &str,
    account: &str,
    limit: u32,
    marker: Option<Value>,
    network: Network,
) -> LedgerResult<AccountTxPage> {
    let command = Command::AccountTransactions {
        account: account.to_string(),
        limit,
        marker,
    };
    let result = client.query(purpose, command, network).await.into_result()?;

    let transactions = result
        .get("transactions")
        .and_then(Value::as_array)
        .ok_or_else(|| LedgerError::Malformed("missing transactions".to_string()))?
        .iter()
        .filter_map(TxEntry::from_value)
        .collect();

    Ok(AccountTxPage {
        transactions,
        marker: result.get("marker").cloned().filter(|m| !m.is_null()),
    })
}

/// Fetch the network reserve settings.
pub async fn fee_settings(
    client: &dyn LedgerQueryClient,
    purpose: &str,
    network: Network,
) -> LedgerResult<FeeSettings> {
    let command = Command::LedgerEntry {
        index: FEE_SETTINGS_INDEX.to_string(),
    };
    let result = client.query(purpose, command, network).await.into_result()?;
    result
        .get("node")
        .and_then(FeeSettings::from_node)
        .ok_or_else(|| LedgerError::Malformed("fee settings node".to_string()))
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedLedger;
    use super::*;
    use crate::ledger::types::FailureReason;
    use serde_json::json;

    #[tokio::test]
    async fn test_account_info_with_v2_signer_lists() {
        let ledger = ScriptedLedger::new(|_, _| {
            QueryResponse::Success(json!({
                "account_data": {"Account": "rA", "Balance": "5000000", "Flags": 0, "OwnerCount": 2},
                "signer_lists": [{"SignerQuorum": 1}]
            }))
        });

        let info = account_info(&ledger, "test", "rA", true, Network::Test).await.unwrap();
        assert_eq!(info.account_data.balance, 5_000_000);
        assert_eq!(info.signer_list_count, 1);
        assert_eq!(ledger.calls.lock().unwrap()[0].1, Network::Test);
    }

    #[tokio::test]
    async fn test_account_info_not_found() {
        let ledger = ScriptedLedger::new(|_, _| QueryResponse::Failure {
            reason: FailureReason::Ledger {
                error: "actNotFound".to_string(),
                message: None,
            },
        });
        let err = account_info(&ledger, "test", "rGONE", false, Network::Main).await.unwrap_err();
        assert_eq!(err, LedgerError::AccountNotFound("rGONE".to_string()));
    }

    #[tokio::test]
    async fn test_account_info_malformed() {
        let ledger = ScriptedLedger::new(|_, _| QueryResponse::Success(json!({"ledger_index": 1})));
        let err = account_info(&ledger, "test", "rA", false, Network::Main).await.unwrap_err();
        assert!(matches!(err, LedgerError::Malformed(_)));

        let ledger = ScriptedLedger::new(|_, _| QueryResponse::Malformed);
        let err = account_info(&ledger, "test", "rA", false, Network::Main).await.unwrap_err();
        assert!(matches!(err, LedgerError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_account_transactions_page() {
        let ledger = ScriptedLedger::new(|command, _| {
            let Command::AccountTransactions { limit, .. } = command else {
                panic!("unexpected command");
            };
            assert_eq!(*limit, 50);
            QueryResponse::Success(json!({
                "transactions": [
                    {"tx": {"TransactionType": "Payment"}, "meta": {}, "validated": true},
                    {"nonsense": true}
                ],
                "marker": {"ledger": 10, "seq": 0}
            }))
        });

        let page = account_transactions(&ledger, "test", "rA", 50, None, Network::Main).await.unwrap();
        assert_eq!(page.transactions.len(), 1);
        assert!(page.marker.is_some());
    }

    #[tokio::test]
    async fn test_account_lines_follow_marker() {
        let ledger = ScriptedLedger::new(|command, _| match command {
            Command::AccountLines { marker: None, .. } => QueryResponse::Success(json!({
                "lines": [{"account": "rB", "balance": "0", "currency": "USD"}],
                "marker": "page-2"
            })),
            Command::AccountLines { marker: Some(_), .. } => QueryResponse::Success(json!({
                "lines": [{"account": "rC", "balance": "-4.5", "currency": "EUR"}]
            })),
            other => panic!("unexpected {:?}", other),
        });

        let lines = account_lines(&ledger, "test", "rA", Network::Test).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].balance, "-4.5");

        let calls = ledger.calls.lock().unwrap();
        assert_eq!(
            calls[1].0,
            Command::AccountLines {
                account: "rA".to_string(),
                marker: Some(json!("page-2"))
            }
        );
    }

    #[tokio::test]
    async fn test_account_lines_without_end_are_incomplete() {
        let ledger = ScriptedLedger::new(|_, _| {
            QueryResponse::Success(json!({
                "lines": [{"account": "rB", "balance": "0", "currency": "USD"}],
                "marker": "more"
            }))
        });

        let err = account_lines(&ledger, "test", "rA", Network::Main).await.unwrap_err();
        assert!(matches!(err, LedgerError::Incomplete(_)));
        assert_eq!(ledger.call_count(), MAX_TRUST_LINE_PAGES);
    }

    #[tokio::test]
    async fn test_fee_settings() {
        let ledger = ScriptedLedger::new(|command, _| {
            assert_eq!(
                command,
                &Command::LedgerEntry {
                    index: FEE_SETTINGS_INDEX.to_string()
                }
            );
            QueryResponse::Success(json!({"node": {"ReserveBase": 10000000, "ReserveIncrement": 2000000}}))
        });
        let fees = fee_settings(&ledger, "test", Network::Main).await.unwrap();
        assert_eq!(fees.reserve_base_drops, 10_000_000);
        assert_eq!(fees.reserve_increment_drops, 2_000_000);
    }
}
