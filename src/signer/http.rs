//! HTTP client for the signer service.
//!
//! # Responsibilities
//! - Submit signing requests and return a [`RequestHandle`]
//! - Run the outward validation calls for signed requests
//! - Fetch the backend's fixed fee amounts
//!
//! # Design Decisions
//! - One `reqwest::Client` with the API credentials as default headers
//! - Endpoint paths are appended to the configured base URL so a path prefix survives
//! - Every call is single-shot with the configured request timeout

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::SignerConfig;
use crate::observability::metrics;
use crate::signer::backend::ValidationBackend;
use crate::signer::gateway::SigningRequestGateway;
use crate::signer::types::{
    BackendError, FixedAmounts, GatewayError, GatewayResult, RequestHandle, SignerVerdict, SigningRequest,
    SubmitResponse,
};

pub const PAYLOAD_PATH: &str = "/api/v1/platform/payload";
pub const CHECK_SIGN_IN_PATH: &str = "/api/v1/check/signinToValidate";
pub const CHECK_PAYMENT_PATH: &str = "/api/v1/check/payment";
pub const VALIDATE_TX_PATH: &str = "/api/v1/xrpl/validatetx";
pub const FIXED_AMOUNTS_PATH: &str = "/api/v1/platform/fixAmounts";

const API_KEY_HEADER: &str = "x-api-key";
const API_SECRET_HEADER: &str = "x-api-secret";

/// Signer service reached over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpSignerService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSignerService {
    pub fn new(config: &SignerConfig) -> GatewayResult<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            (API_KEY_HEADER, config.api_key.as_deref()),
            (API_SECRET_HEADER, config.api_secret.as_deref()),
        ] {
            if let Some(value) = value {
                let value = HeaderValue::from_str(value)
                    .map_err(|e| GatewayError::Unreachable(format!("invalid {} header: {}", name, e)))?;
                headers.insert(HeaderName::from_static(name), value);
            }
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_payload(&self, request: &SigningRequest) -> GatewayResult<RequestHandle> {
        let envelope = request.to_envelope();
        let response = self
            .client
            .post(self.url(PAYLOAD_PATH))
            .json(&envelope)
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        if parsed.refs.websocket_status.is_empty() {
            return Err(GatewayError::Malformed("empty notification channel reference".to_string()));
        }

        Ok(RequestHandle {
            id: parsed.uuid,
            status_url: parsed.refs.websocket_status,
            sign_url: parsed.next.map(|next| next.always),
            expires_at: Instant::now() + request.effective_expiry(),
            kind: request.template.kind.label(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, BackendError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Unreachable(format!("{} returned {}", url, status)));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))
    }

    async fn verdict(&self, path: &str, request_id: Uuid) -> Result<SignerVerdict, BackendError> {
        let verdict: SignerVerdict = self.get_json(format!("{}/{}", self.url(path), request_id)).await?;
        tracing::debug!(
            request_id = %request_id,
            success = verdict.success,
            account = ?verdict.account,
            testnet = verdict.testnet,
            "Signer verdict"
        );
        Ok(verdict)
    }
}

#[async_trait]
impl SigningRequestGateway for HttpSignerService {
    async fn submit(&self, request: &SigningRequest) -> GatewayResult<RequestHandle> {
        let kind = request.template.kind.label();
        let result = self.post_payload(request).await;

        let outcome = match &result {
            Ok(handle) => {
                tracing::info!(request_id = %handle.id, kind = kind, "Signing request submitted");
                "submitted"
            }
            Err(e) => {
                tracing::warn!(kind = kind, error = %e, "Signing request submission failed");
                match e {
                    GatewayError::Unreachable(_) => "unreachable",
                    GatewayError::Rejected { .. } => "rejected",
                    GatewayError::Malformed(_) => "malformed",
                }
            }
        };
        metrics::record_signing_request(kind, outcome);

        result
    }
}

#[async_trait]
impl ValidationBackend for HttpSignerService {
    async fn check_sign_in(&self, request_id: Uuid) -> Result<SignerVerdict, BackendError> {
        self.verdict(CHECK_SIGN_IN_PATH, request_id).await
    }

    async fn check_payment(&self, request_id: Uuid) -> Result<SignerVerdict, BackendError> {
        self.verdict(CHECK_PAYMENT_PATH, request_id).await
    }

    async fn validate_transaction(&self, request_id: Uuid) -> Result<SignerVerdict, BackendError> {
        self.verdict(VALIDATE_TX_PATH, request_id).await
    }

    async fn fixed_amounts(&self) -> Result<FixedAmounts, BackendError> {
        self.get_json(self.url(FIXED_AMOUNTS_PATH)).await
    }
}
