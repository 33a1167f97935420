//! Post-signing validation.
//!
//! # Responsibilities
//! - Ask the signer backend who signed a request and on which network
//! - Reject wrong accounts, invalid addresses and cross-network completions
//! - Re-query the ledger until the expected effect shows up, with backoff
//!
//! # Design Decisions
//! - The signer's claim alone never completes a step
//! - The network check is exact for every step, payments included
//! - A missing effect is re-checked a bounded number of times; a ledger that
//!   fails on every attempt is a ledger failure, not a mismatch

use std::sync::Arc;
use uuid::Uuid;

use crate::account::address::{is_valid_classic_address, BLACKHOLE_ADDRESS};
use crate::account::flags::{incoming_xrp_disallowed, master_key_disabled};
use crate::config::ValidationConfig;
use crate::ledger::queries::account_info;
use crate::ledger::{LedgerError, LedgerQueryClient, Network};
use crate::observability::metrics;
use crate::resilience::backoff::requery_delay;
use crate::signer::ValidationBackend;
use crate::validator::history::{find_payment, ScanLimits};
use crate::validator::types::{Discrepancy, ExpectedEffect, TransactionValidation, ValidatorResult};

/// Confirms signed requests against the signer backend and the ledger.
pub struct TransactionValidator {
    ledger: Arc<dyn LedgerQueryClient>,
    backend: Arc<dyn ValidationBackend>,
    requery: ValidationConfig,
    scan: ScanLimits,
}

impl TransactionValidator {
    pub fn new(
        ledger: Arc<dyn LedgerQueryClient>,
        backend: Arc<dyn ValidationBackend>,
        requery: ValidationConfig,
        scan: ScanLimits,
    ) -> Self {
        Self {
            ledger,
            backend,
            requery,
            scan,
        }
    }

    /// Validate a signed request.
    ///
    /// `expected_account` is `None` only for sign-ins, where any valid account is acceptable.
    pub async fn validate(
        &self,
        request_id: Uuid,
        expected_account: Option<&str>,
        effect: &ExpectedEffect,
        network: Network,
    ) -> ValidatorResult<TransactionValidation> {
        let validation = self.evaluate(request_id, expected_account, effect, network).await?;

        metrics::record_validation(effect.label(), validation.success);
        if validation.success {
            tracing::info!(
                request_id = %request_id,
                step = effect.label(),
                account = ?validation.account,
                network = %network,
                "Signed transaction confirmed"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                step = effect.label(),
                discrepancy = ?validation.discrepancy,
                "Signed transaction rejected by validation"
            );
        }

        Ok(validation)
    }

    async fn evaluate(
        &self,
        request_id: Uuid,
        expected_account: Option<&str>,
        effect: &ExpectedEffect,
        network: Network,
    ) -> ValidatorResult<TransactionValidation> {
        let verdict = match effect {
            ExpectedEffect::SignIn => self.backend.check_sign_in(request_id).await?,
            ExpectedEffect::FeePayment(_) => self.backend.check_payment(request_id).await?,
            _ => self.backend.validate_transaction(request_id).await?,
        };
        let reported_network = Network::from_testnet_flag(verdict.testnet);

        if !verdict.success {
            return Ok(TransactionValidation::rejected(
                verdict.account,
                reported_network,
                Discrepancy::SignerReportedFailure,
            ));
        }

        let account = match verdict.account {
            Some(account) if is_valid_classic_address(&account) => account,
            reported => {
                return Ok(TransactionValidation::rejected(
                    reported.clone(),
                    reported_network,
                    Discrepancy::InvalidAccount { reported },
                ))
            }
        };

        if let Some(expected) = expected_account {
            if expected != account {
                return Ok(TransactionValidation::rejected(
                    Some(account.clone()),
                    reported_network,
                    Discrepancy::AccountMismatch {
                        expected: expected.to_string(),
                        actual: account,
                    },
                ));
            }
        }

        if reported_network != network {
            return Ok(TransactionValidation::rejected(
                Some(account),
                reported_network,
                Discrepancy::NetworkMismatch {
                    expected: network,
                    actual: reported_network,
                },
            ));
        }

        if let Some(detail) = self.confirm(&account, effect, network).await? {
            return Ok(TransactionValidation::rejected(
                Some(account),
                reported_network,
                Discrepancy::EffectNotObserved {
                    effect: effect.label(),
                    detail,
                },
            ));
        }

        Ok(TransactionValidation::accepted(account, reported_network, verdict.txid))
    }

    /// Re-query until the effect is observed. Returns the last miss otherwise.
    async fn confirm(&self, account: &str, effect: &ExpectedEffect, network: Network) -> ValidatorResult<Option<String>> {
        if *effect == ExpectedEffect::SignIn {
            return Ok(None);
        }

        let attempts = self.requery.requery_attempts.max(1);
        let mut last_miss = None;
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(requery_delay(attempt, &self.requery)).await;
            }

            match self.observe(account, effect, network).await {
                Ok(None) => return Ok(None),
                Ok(Some(miss)) => {
                    tracing::debug!(account = %account, attempt = attempt, miss = %miss, "Effect not yet on ledger");
                    last_miss = Some(miss);
                }
                Err(e) => {
                    tracing::warn!(account = %account, attempt = attempt, error = %e, "Ledger re-check failed");
                    last_error = Some(e);
                }
            }
        }

        match (last_miss, last_error) {
            (Some(miss), _) => Ok(Some(miss)),
            (None, Some(e)) => Err(e.into()),
            (None, None) => Ok(Some("not checked".to_string())),
        }
    }

    /// One ledger check. `Ok(None)` means the effect is present.
    async fn observe(&self, account: &str, effect: &ExpectedEffect, network: Network) -> Result<Option<String>, LedgerError> {
        let client = self.ledger.as_ref();
        let purpose = effect.label();

        let miss = match effect {
            ExpectedEffect::SignIn => None,
            ExpectedEffect::MasterKeyDisabled => {
                let info = account_info(client, purpose, account, false, network).await?;
                let flags = info.account_data.flags;
                (!master_key_disabled(flags)).then(|| format!("master key still enabled (Flags={:#010x})", flags))
            }
            ExpectedEffect::IncomingXrpDisallowed => {
                let info = account_info(client, purpose, account, false, network).await?;
                let flags = info.account_data.flags;
                (!incoming_xrp_disallowed(flags)).then(|| format!("incoming XRP still allowed (Flags={:#010x})", flags))
            }
            ExpectedEffect::RegularKeyBlackholed => {
                let info = account_info(client, purpose, account, false, network).await?;
                match info.account_data.regular_key.as_deref() {
                    Some(BLACKHOLE_ADDRESS) => None,
                    other => Some(format!("regular key is {:?}", other)),
                }
            }
            ExpectedEffect::SignerListRemoved => {
                let info = account_info(client, purpose, account, true, network).await?;
                (info.signer_list_count > 0).then(|| format!("{} signer list(s) remain", info.signer_list_count))
            }
            ExpectedEffect::FeePayment(criteria) | ExpectedEffect::Payment(criteria) => {
                let found = find_payment(client, account, criteria, network, self.scan).await?;
                found.is_none().then(|| {
                    format!(
                        "no payment of {} drops to {} in history",
                        criteria.amount_drops, criteria.destination
                    )
                })
            }
        };

        Ok(miss)
    }
}
