//! Signing request types, signer wire formats and error definitions.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use crate::account::address::is_valid_classic_address;
use crate::ledger::Memo;

/// Default lifetime of a signing request.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(120);

/// Transaction-type specific part of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    /// Pseudo transaction proving control of an account.
    SignIn,
    Payment {
        destination: String,
        amount_drops: u64,
        /// `(MemoType, MemoData)` in plain text; hex-encoded on the wire.
        memos: Vec<(String, String)>,
    },
    AccountSet {
        set_flag: u32,
    },
    SetRegularKey {
        regular_key: String,
    },
    SignerListSet {
        signer_quorum: u32,
    },
}

impl TransactionKind {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::SignIn => "sign_in",
            TransactionKind::Payment { .. } => "payment",
            TransactionKind::AccountSet { .. } => "account_set",
            TransactionKind::SetRegularKey { .. } => "set_regular_key",
            TransactionKind::SignerListSet { .. } => "signer_list_set",
        }
    }
}

/// Unsigned transaction the signer is asked to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionTemplate {
    /// Account expected to sign; `None` lets the user pick (sign-in).
    pub account: Option<String>,
    pub kind: TransactionKind,
}

impl TransactionTemplate {
    pub fn sign_in() -> Self {
        Self {
            account: None,
            kind: TransactionKind::SignIn,
        }
    }

    pub fn for_account(account: &str, kind: TransactionKind) -> Self {
        Self {
            account: Some(account.to_string()),
            kind,
        }
    }

    /// Render as the signer's `txjson`.
    pub fn to_txjson(&self) -> Value {
        let mut tx = Map::new();
        if let Some(account) = &self.account {
            tx.insert("Account".into(), json!(account));
        }

        match &self.kind {
            TransactionKind::SignIn => {
                tx.insert("TransactionType".into(), json!("SignIn"));
            }
            TransactionKind::Payment {
                destination,
                amount_drops,
                memos,
            } => {
                tx.insert("TransactionType".into(), json!("Payment"));
                tx.insert("Destination".into(), json!(destination));
                tx.insert("Amount".into(), json!(amount_drops.to_string()));
                if !memos.is_empty() {
                    let encoded: Vec<Value> = memos.iter().map(|(t, d)| Memo::encode(t, d)).collect();
                    tx.insert("Memos".into(), Value::Array(encoded));
                }
            }
            TransactionKind::AccountSet { set_flag } => {
                tx.insert("TransactionType".into(), json!("AccountSet"));
                tx.insert("SetFlag".into(), json!(set_flag));
            }
            TransactionKind::SetRegularKey { regular_key } => {
                tx.insert("TransactionType".into(), json!("SetRegularKey"));
                tx.insert("RegularKey".into(), json!(regular_key));
            }
            TransactionKind::SignerListSet { signer_quorum } => {
                tx.insert("TransactionType".into(), json!("SignerListSet"));
                tx.insert("SignerQuorum".into(), json!(signer_quorum));
            }
        }

        Value::Object(tx)
    }
}

/// A request for an external signature. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningRequest {
    pub template: TransactionTemplate,
    /// Human instruction shown by the signer.
    pub instruction: String,
    /// Extra metadata forwarded to the signer untouched.
    pub blob: Option<Value>,
    pub expiry: Duration,
}

impl SigningRequest {
    pub fn new(template: TransactionTemplate, instruction: impl Into<String>) -> Self {
        Self {
            template,
            instruction: instruction.into(),
            blob: None,
            expiry: DEFAULT_EXPIRY,
        }
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_blob(mut self, blob: Value) -> Self {
        self.blob = Some(blob);
        self
    }

    /// Lifetime the signer actually grants: the expiry rounded up to whole minutes.
    pub fn effective_expiry(&self) -> Duration {
        Duration::from_secs(expiry_minutes(self.expiry) * 60)
    }

    /// Build the submission envelope.
    ///
    /// A syntactically valid template account becomes the only permitted signer.
    pub fn to_envelope(&self) -> SubmitEnvelope {
        let is_sign_in = self.template.kind == TransactionKind::SignIn;
        let pinned_account = self
            .template
            .account
            .as_deref()
            .filter(|a| is_valid_classic_address(a))
            .map(str::to_string);

        SubmitEnvelope {
            options: SubmitOptions {
                push_disabled: true,
                signin_to_validate: is_sign_in.then_some(true),
                xrpl_account: self.template.account.clone(),
                web: is_sign_in.then_some(false),
            },
            payload: PayloadBody {
                txjson: self.template.to_txjson(),
                options: PayloadOptions {
                    expire: expiry_minutes(self.expiry),
                    signers: pinned_account.map(|a| vec![a]),
                },
                custom_meta: CustomMeta {
                    instruction: self.instruction.clone(),
                    blob: self.blob.clone(),
                },
            },
        }
    }
}

/// The signer counts expiry in whole minutes; round up, minimum one.
fn expiry_minutes(expiry: Duration) -> u64 {
    expiry.as_secs().div_ceil(60).max(1)
}

/// Body of a signing request submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitEnvelope {
    pub options: SubmitOptions,
    pub payload: PayloadBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOptions {
    pub push_disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signin_to_validate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xrpl_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadBody {
    pub txjson: Value,
    pub options: PayloadOptions,
    pub custom_meta: CustomMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadOptions {
    /// Minutes until the signer expires the request.
    pub expire: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signers: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomMeta {
    pub instruction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<Value>,
}

/// Signer response to a submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub uuid: Uuid,
    pub refs: SubmitRefs,
    #[serde(default)]
    pub next: Option<SubmitNext>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRefs {
    /// Per-request notification channel URL.
    pub websocket_status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitNext {
    /// URL a user can open to sign.
    pub always: String,
}

/// Handle to a submitted signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHandle {
    /// Signer-assigned id.
    pub id: Uuid,
    /// Notification channel for this request.
    pub status_url: String,
    pub sign_url: Option<String>,
    /// Local mirror of the signer-side expiry.
    pub expires_at: Instant,
    pub kind: &'static str,
}

/// Terminal outcome of a signing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum SigningResolution {
    /// `account` is unknown until the outward validation call fills it.
    Signed {
        request_id: Uuid,
        account: Option<String>,
    },
    Declined {
        request_id: Uuid,
    },
    Expired {
        request_id: Uuid,
    },
}

impl SigningResolution {
    pub fn request_id(&self) -> Uuid {
        match self {
            SigningResolution::Signed { request_id, .. }
            | SigningResolution::Declined { request_id }
            | SigningResolution::Expired { request_id } => *request_id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SigningResolution::Signed { .. } => "signed",
            SigningResolution::Declined { .. } => "declined",
            SigningResolution::Expired { .. } => "expired",
        }
    }
}

/// Event carried by one notification frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerEvent {
    Signed,
    Declined,
    Expired,
    /// Countdown until the signer expires the request.
    ExpiresIn(u64),
    /// Keep-alives, "opened" notices and anything unrecognised.
    Other,
}

/// Parsed notification frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerMessage {
    /// Absent on frames that are implicitly about the channel's own request.
    pub request_id: Option<Uuid>,
    pub event: SignerEvent,
}

impl SignerMessage {
    /// Parse a frame. Unparseable frames become `Other`.
    pub fn parse(text: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return Self {
                request_id: None,
                event: SignerEvent::Other,
            };
        };

        let id_field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
        };

        if value.get("method").and_then(Value::as_str) == Some("payloadResolved") {
            let event = match value.get("reason").and_then(Value::as_str) {
                Some("SIGNED") => SignerEvent::Signed,
                Some("DECLINED") => SignerEvent::Declined,
                _ => SignerEvent::Other,
            };
            return Self {
                request_id: id_field("uuid"),
                event,
            };
        }

        let request_id = id_field("payload_uuidv4");
        let event = if value.get("expired").and_then(Value::as_bool) == Some(true) {
            SignerEvent::Expired
        } else if let Some(signed) = value.get("signed").and_then(Value::as_bool) {
            if signed {
                SignerEvent::Signed
            } else {
                SignerEvent::Declined
            }
        } else if let Some(seconds) = value.get("expires_in_seconds").and_then(Value::as_i64) {
            SignerEvent::ExpiresIn(seconds.max(0) as u64)
        } else {
            SignerEvent::Other
        };

        Self { request_id, event }
    }

    /// Whether this frame concerns `id`. Frames without an id belong to the channel's request.
    pub fn concerns(&self, id: Uuid) -> bool {
        self.request_id.is_none_or(|rid| rid == id)
    }

    /// Terminal resolution for `id`, if this frame carries one.
    pub fn resolution(&self, id: Uuid) -> Option<SigningResolution> {
        if !self.concerns(id) {
            return None;
        }
        match self.event {
            SignerEvent::Signed => Some(SigningResolution::Signed {
                request_id: id,
                account: None,
            }),
            SignerEvent::Declined => Some(SigningResolution::Declined { request_id: id }),
            SignerEvent::Expired => Some(SigningResolution::Expired { request_id: id }),
            SignerEvent::ExpiresIn(_) | SignerEvent::Other => None,
        }
    }
}

/// Result of an outward validation call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SignerVerdict {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub testnet: bool,
    /// Hash of the submitted transaction, when the signer reports it.
    #[serde(default)]
    pub txid: Option<String>,
}

/// Fixed amounts published by the signer backend, keyed by purpose.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct FixedAmounts(pub Map<String, Value>);

impl FixedAmounts {
    /// The wildcard amount in drops, when it is a native amount.
    pub fn native_drops(&self) -> Option<u64> {
        match self.0.get("*")? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    /// Whether the wildcard amount names an issued currency.
    pub fn is_issued_currency(&self) -> bool {
        self.0
            .get("*")
            .and_then(|v| v.get("issuer"))
            .is_some()
    }
}

/// Errors submitting to the signer service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Transport failure or timeout contacting the signer.
    #[error("Signer service unreachable: {0}")]
    Unreachable(String),

    /// The signer answered with a non-success HTTP status.
    #[error("Signer service rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The signer answered but without a usable uuid or status channel.
    #[error("Malformed signer response: {0}")]
    Malformed(String),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors from the outward validation calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Signer backend unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed signer backend response: {0}")]
    Malformed(String),
}

/// Errors of a notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Failed to open notification channel: {0}")]
    Connect(String),

    #[error("Notification channel failed: {0}")]
    Transport(String),
}

/// Ways a wait can end without a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Signing request {request_id} expired without a resolution")]
    Timeout { request_id: Uuid },

    #[error("Wait for signing request {request_id} was cancelled")]
    Cancelled { request_id: Uuid },

    #[error("Wait for signing request {request_id} was superseded by a newer request")]
    Superseded { request_id: Uuid },

    #[error("Notification channel for {request_id} failed: {source}")]
    Channel {
        request_id: Uuid,
        #[source]
        source: ChannelError,
    },
}

/// Result type for waits.
pub type ResolutionResult<T> = Result<T, ResolutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER: &str = "rELeasERs3m4inA1UinRLTpXemqyStqzwh";

    #[test]
    fn test_envelope_pins_valid_account() {
        let request = SigningRequest::new(
            TransactionTemplate::for_account(ISSUER, TransactionKind::AccountSet { set_flag: 4 }),
            "Disable Master Key",
        );
        let envelope = serde_json::to_value(request.to_envelope()).unwrap();

        assert_eq!(envelope["options"]["pushDisabled"], true);
        assert_eq!(envelope["options"]["xrplAccount"], ISSUER);
        assert!(envelope["options"].get("signinToValidate").is_none());
        assert_eq!(envelope["payload"]["options"]["expire"], 2);
        assert_eq!(envelope["payload"]["options"]["signers"], json!([ISSUER]));
        assert_eq!(envelope["payload"]["txjson"]["SetFlag"], 4);
        assert_eq!(envelope["payload"]["custom_meta"]["instruction"], "Disable Master Key");
    }

    #[test]
    fn test_envelope_does_not_pin_invalid_account() {
        let request = SigningRequest::new(
            TransactionTemplate::for_account("not-an-address", TransactionKind::SignerListSet { signer_quorum: 0 }),
            "Delete Signer List.",
        );
        let envelope = request.to_envelope();
        assert_eq!(envelope.payload.options.signers, None);
    }

    #[test]
    fn test_sign_in_envelope() {
        let envelope = SigningRequest::new(TransactionTemplate::sign_in(), "choose").to_envelope();
        assert_eq!(envelope.options.signin_to_validate, Some(true));
        assert_eq!(envelope.options.web, Some(false));
        assert_eq!(envelope.payload.txjson, json!({"TransactionType": "SignIn"}));
        assert_eq!(envelope.payload.options.signers, None);
    }

    #[test]
    fn test_expiry_rounds_up_to_minutes() {
        assert_eq!(expiry_minutes(Duration::from_secs(1)), 1);
        assert_eq!(expiry_minutes(Duration::from_secs(120)), 2);
        assert_eq!(expiry_minutes(Duration::from_secs(121)), 3);
        assert_eq!(expiry_minutes(Duration::ZERO), 1);
    }

    #[test]
    fn test_effective_expiry_matches_envelope() {
        let request = SigningRequest::new(TransactionTemplate::sign_in(), "sign in").with_expiry(Duration::from_secs(90));

        assert_eq!(request.effective_expiry(), Duration::from_secs(120));
        let envelope = serde_json::to_value(request.to_envelope()).unwrap();
        assert_eq!(envelope["payload"]["options"]["expire"], 2);
    }

    #[test]
    fn test_payment_txjson() {
        let template = TransactionTemplate::for_account(
            ISSUER,
            TransactionKind::Payment {
                destination: "rDEST".to_string(),
                amount_drops: 15_000_000,
                memos: vec![("Blackhole-Info".to_string(), "{}".to_string())],
            },
        );
        let tx = template.to_txjson();
        assert_eq!(tx["Amount"], "15000000");
        assert_eq!(tx["Memos"][0]["Memo"]["MemoType"], hex::encode_upper("Blackhole-Info"));
    }

    #[test]
    fn test_parse_signed_and_declined() {
        let id = Uuid::new_v4();
        let signed = SignerMessage::parse(&format!(r#"{{"payload_uuidv4":"{}","signed":true}}"#, id));
        assert_eq!(signed.request_id, Some(id));
        assert_eq!(
            signed.resolution(id),
            Some(SigningResolution::Signed { request_id: id, account: None })
        );

        let declined = SignerMessage::parse(&format!(r#"{{"payload_uuidv4":"{}","signed":false}}"#, id));
        assert_eq!(declined.resolution(id), Some(SigningResolution::Declined { request_id: id }));
    }

    #[test]
    fn test_parse_declarative_event() {
        let id = Uuid::new_v4();
        let msg = SignerMessage::parse(&format!(r#"{{"method":"payloadResolved","reason":"SIGNED","uuid":"{}"}}"#, id));
        assert_eq!(msg.event, SignerEvent::Signed);
        assert_eq!(msg.request_id, Some(id));
    }

    #[test]
    fn test_parse_countdown_and_noise() {
        assert_eq!(SignerMessage::parse(r#"{"expires_in_seconds":90}"#).event, SignerEvent::ExpiresIn(90));
        assert_eq!(SignerMessage::parse(r#"{"expired":true}"#).event, SignerEvent::Expired);
        assert_eq!(SignerMessage::parse(r#"{"message":"Welcome"}"#).event, SignerEvent::Other);
        assert_eq!(SignerMessage::parse("not json").event, SignerEvent::Other);
    }

    #[test]
    fn test_other_request_is_not_ours() {
        let ours = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let msg = SignerMessage::parse(&format!(r#"{{"payload_uuidv4":"{}","signed":true}}"#, theirs));
        assert!(!msg.concerns(ours));
        assert_eq!(msg.resolution(ours), None);
    }

    #[test]
    fn test_fixed_amounts() {
        let native: FixedAmounts = serde_json::from_value(json!({"*": "15000000"})).unwrap();
        assert_eq!(native.native_drops(), Some(15_000_000));
        assert!(!native.is_issued_currency());

        let issued: FixedAmounts =
            serde_json::from_value(json!({"*": {"issuer": "rX", "currency": "USD", "value": "5"}})).unwrap();
        assert_eq!(issued.native_drops(), None);
        assert!(issued.is_issued_currency());

        assert_eq!(FixedAmounts::default().native_drops(), None);
    }
}
