//! xrpl-blackhole command line.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI command
//!       │
//!       ▼
//!   ┌──────────────────────┐      ┌────────────────────┐
//!   │ WorkflowOrchestrator │─────▶│ HttpSignerService  │──▶ signer platform
//!   │  (session, guards)   │      │ (submit, verdicts) │
//!   └──────────┬───────────┘      └────────────────────┘
//!              │                  ┌────────────────────┐
//!              ├─────────────────▶│ ResolutionWaiter   │◀── status WebSocket
//!              │                  └────────────────────┘
//!              │                  ┌────────────────────┐
//!              └─────────────────▶│ WebSocketLedger    │──▶ mainnet / testnet
//!                                 └────────────────────┘
//! ```
//!
//! `inspect` and `fee-status` are read-only. `run` walks the whole workflow
//! and prints a sign link for every request it submits.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use xrpl_blackhole::config::{load_config, BlackholeConfig};
use xrpl_blackhole::lifecycle::signals::spawn_interrupt_listener;
use xrpl_blackhole::observability::{logging, metrics};
use xrpl_blackhole::signer::{RequestHandle, SigningRequest};
use xrpl_blackhole::workflow::{FlagAction, StepOutcome, WorkflowError, WorkflowResult};
use xrpl_blackhole::{
    Collaborators, HttpSignerService, Network, Shutdown, WebSocketLedgerClient, WebSocketNotificationSource,
    WorkflowOrchestrator, WorkflowSession,
};

#[derive(Parser)]
#[command(name = "xrpl-blackhole")]
#[command(about = "Blackhole an XRPL issuer account through an external signer", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the test network
    #[arg(long)]
    testnet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the blackhole state of an account
    Inspect { account: String },
    /// Check whether an issuer already paid the service fee
    FeeStatus { account: String },
    /// Run the full workflow
    Run {
        /// Sweep the balance even if the master key stays enabled
        #[arg(long)]
        skip_master_key: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BlackholeConfig::default(),
    };

    logging::init_logging(&config.observability);
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let network = Network::from_testnet_flag(cli.testnet);
    let shutdown = Shutdown::new();
    spawn_interrupt_listener(shutdown.clone());

    let signer = Arc::new(HttpSignerService::new(&config.signer)?);
    let collaborators = Collaborators {
        ledger: Arc::new(WebSocketLedgerClient::new(config.ledger.clone())),
        gateway: signer.clone(),
        backend: signer,
        notifications: Arc::new(WebSocketNotificationSource::new(Duration::from_secs(
            config.signer.request_timeout_secs,
        ))),
    };
    let orchestrator = WorkflowOrchestrator::new(collaborators, &config, shutdown)
        .with_submission_listener(Arc::new(print_sign_link));

    tracing::info!(network = %network, "xrpl-blackhole v0.1.0 starting");

    let result = match cli.command {
        Commands::Inspect { account } => orchestrator
            .inspect(&account, network)
            .await
            .map(|state| print_json(&state)),
        Commands::FeeStatus { account } => orchestrator
            .fee_status(&account, network)
            .await
            .map(|status| print_json(&status)),
        Commands::Run { skip_master_key } => run(&orchestrator, network, skip_master_key).await,
    };

    if let Err(e) = result {
        report(&e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(orchestrator: &WorkflowOrchestrator, network: Network, skip_master_key: bool) -> WorkflowResult<()> {
    let mut session = WorkflowSession::new(network);
    if skip_master_key {
        session.acknowledge_master_key_skip();
    }

    if !proceed("sign in", orchestrator.change_signer(&mut session).await?) {
        return Ok(());
    }
    if !proceed("fee payment", orchestrator.pay_fee(&mut session).await?) {
        return Ok(());
    }

    for action in FlagAction::ALL {
        if action == FlagAction::DisableMasterKey && skip_master_key {
            continue;
        }
        if !proceed(action.label(), orchestrator.run_flag_action(&mut session, action).await?) {
            return Ok(());
        }
    }

    let state = orchestrator.refresh_account(&mut session).await?;
    print_json(&state);

    // With the master key disabled nothing can sign the sweep anymore.
    if !skip_master_key {
        println!("Master key disabled; the remaining balance stays on the account.");
        return Ok(());
    }
    if !proceed("recipient sign in", orchestrator.sign_in_recipient(&mut session).await?) {
        return Ok(());
    }
    proceed("balance sweep", orchestrator.sweep_remaining_balance(&mut session).await?);
    print_json(&session);
    Ok(())
}

fn proceed(step: &str, outcome: StepOutcome) -> bool {
    match outcome {
        StepOutcome::Completed { account, txid } => {
            println!("{}: signed by {} ({})", step, account, txid.as_deref().unwrap_or("no txid"));
            true
        }
        StepOutcome::AlreadySatisfied => {
            println!("{}: already done", step);
            true
        }
        StepOutcome::Declined => {
            println!("{}: declined, stopping", step);
            false
        }
    }
}

fn print_sign_link(handle: &RequestHandle, request: &SigningRequest) {
    println!("\n{}", request.instruction);
    match &handle.sign_url {
        Some(url) => println!("Sign here: {}", url),
        None => println!("Open request {} in your signer app", handle.id),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => tracing::error!(error = %e, "Failed to render output"),
    }
}

fn report(error: &WorkflowError) {
    eprintln!("Error: {}", error.user_message());
    match serde_json::to_string_pretty(&error.diagnostic()) {
        Ok(text) => eprintln!("{}", text),
        Err(_) => eprintln!("{}", error),
    }
}
