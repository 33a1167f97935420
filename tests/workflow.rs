//! Orchestrator wired to the real ledger, signer and channel clients.

use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use xrpl_blackhole::config::BlackholeConfig;
use xrpl_blackhole::signer::http::{CHECK_SIGN_IN_PATH, FIXED_AMOUNTS_PATH, PAYLOAD_PATH};
use xrpl_blackhole::workflow::{StepOutcome, WorkflowStep};
use xrpl_blackhole::{
    Collaborators, HttpSignerService, Network, Shutdown, WebSocketLedgerClient, WebSocketNotificationSource,
    WorkflowError, WorkflowOrchestrator, WorkflowSession,
};

mod common;

struct Stack {
    orchestrator: WorkflowOrchestrator,
    submissions: Arc<AtomicU32>,
}

async fn start_ledger() -> SocketAddr {
    common::start_mock_ledger(|request| match request["command"].as_str() {
        Some("account_info") if request["account"] == common::ISSUER => {
            common::ledger_success(common::account_data(common::ISSUER, 60_000_000, 0))
        }
        Some("account_info") => common::ledger_error("actNotFound"),
        Some("account_lines") => common::ledger_success(json!({
            "lines": [{ "account": common::RECIPIENT, "balance": "0", "currency": "USD" }]
        })),
        Some("account_tx") => common::ledger_success(json!({ "transactions": [] })),
        Some("ledger_entry") => common::ledger_success(json!({
            "node": { "ReserveBase": 10_000_000, "ReserveIncrement": 2_000_000 }
        })),
        _ => common::ledger_error("unknownCmd"),
    })
    .await
}

async fn start_stack(signed: bool, testnet_verdict: bool) -> Stack {
    let ledger_addr = start_ledger().await;
    let status_addr =
        common::start_status_channel(move |uuid| vec![json!({ "payload_uuidv4": uuid, "signed": signed }).to_string()])
            .await;

    let submissions = Arc::new(AtomicU32::new(0));
    let counter = submissions.clone();
    let signer_addr = common::start_mock_signer(move |request| {
        let body = if request.method == "POST" && request.path == PAYLOAD_PATH {
            counter.fetch_add(1, Ordering::SeqCst);
            common::payload_created(&Uuid::new_v4().to_string(), status_addr)
        } else if request.path.starts_with(CHECK_SIGN_IN_PATH) {
            json!({ "success": true, "account": common::ISSUER, "testnet": testnet_verdict }).to_string()
        } else if request.path == FIXED_AMOUNTS_PATH {
            json!({ "*": "25000000" }).to_string()
        } else {
            json!({ "success": false }).to_string()
        };
        async move { (200, body) }
    })
    .await;

    let mut config = BlackholeConfig::default();
    config.ledger.mainnet_url = format!("ws://{}", ledger_addr);
    config.ledger.testnet_url = format!("ws://{}", ledger_addr);
    config.signer.base_url = format!("http://{}", signer_addr);
    config.fee.use_backend_fixed_amount = true;

    let signer = Arc::new(HttpSignerService::new(&config.signer).unwrap());
    let collaborators = Collaborators {
        ledger: Arc::new(WebSocketLedgerClient::new(config.ledger.clone())),
        gateway: signer.clone(),
        backend: signer,
        notifications: Arc::new(WebSocketNotificationSource::new(Duration::from_secs(5))),
    };

    Stack {
        orchestrator: WorkflowOrchestrator::new(collaborators, &config, Shutdown::new()),
        submissions,
    }
}

#[tokio::test]
async fn test_sign_in_selects_issuer_and_offers_fee() {
    let stack = start_stack(true, true).await;
    let mut session = WorkflowSession::new(Network::Test);

    let outcome = stack.orchestrator.change_signer(&mut session).await.unwrap();

    assert!(matches!(outcome, StepOutcome::Completed { ref account, .. } if account == common::ISSUER));
    assert_eq!(session.issuer(), Some(common::ISSUER));
    assert_eq!(session.step(), WorkflowStep::FeePayment);
    assert_eq!(session.fee().unwrap().amount_drops, 25_000_000);

    let snapshot = session.issuer_snapshot().unwrap();
    assert_eq!(snapshot.balance_drops, 60_000_000);
    assert_eq!(snapshot.has_token_balance, Some(false));
    assert_eq!(stack.submissions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sign_in_on_wrong_network_is_rejected() {
    let stack = start_stack(true, false).await;
    let mut session = WorkflowSession::new(Network::Test);

    let err = stack.orchestrator.change_signer(&mut session).await.unwrap_err();

    assert_eq!(err.kind(), "validation_mismatch");
    assert_eq!(err.diagnostic()["details"]["discrepancy"]["kind"], "network_mismatch");
    assert!(session.issuer().is_none());
}

#[tokio::test]
async fn test_declined_sign_in() {
    let stack = start_stack(false, true).await;
    let mut session = WorkflowSession::new(Network::Main);

    let outcome = stack.orchestrator.change_signer(&mut session).await.unwrap();

    assert_eq!(outcome, StepOutcome::Declined);
    assert_eq!(session.step(), WorkflowStep::AccountSelection);
}

#[tokio::test]
async fn test_inspect_unknown_account() {
    let stack = start_stack(true, true).await;

    let err = stack
        .orchestrator
        .inspect(common::RECIPIENT, Network::Main)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::LedgerQueryFailure(_)));
    assert!(err.user_message().contains(common::RECIPIENT));
    assert_eq!(stack.submissions.load(Ordering::SeqCst), 0);
}
