use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::anchor::errors::{AnchorError, AnchorResult};
use crate::transactions::status::{TransactionHandle, TransactionStatus};

/// Transaction record as returned by the anchor's transaction endpoints.
///
/// Only `id` and `status` are required. Everything else is informational and
/// stays available on [`TransactionHandle::raw`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorTransactionRecord {
    pub id: String,
    pub status: TransactionStatus,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub amount_in: Option<String>,
    #[serde(default)]
    pub amount_out: Option<String>,
    #[serde(default)]
    pub amount_fee: Option<String>,
    #[serde(default)]
    pub stellar_transaction_id: Option<String>,
    #[serde(default)]
    pub external_transaction_id: Option<String>,
    #[serde(default)]
    pub more_info_url: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// `{"transaction": {...}}` wrapper used by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorTransactionEnvelope {
    pub transaction: AnchorTransactionRecord,
}

impl AnchorTransactionRecord {
    pub fn into_handle(self, raw: JsonValue) -> TransactionHandle {
        let handle = TransactionHandle::new(self.id, self.status).with_raw(raw);
        match self.message {
            Some(message) if !message.trim().is_empty() => handle.with_message(message),
            _ => handle,
        }
    }
}

/// Parse a response body into a handle.
///
/// Accepts both the enveloped form and a bare record, since submit endpoints
/// commonly answer with the latter.
pub fn parse_transaction_body(body: &str) -> AnchorResult<TransactionHandle> {
    let json: JsonValue = serde_json::from_str(body)?;
    let record_json = match json.get("transaction") {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => json,
    };

    if record_json.get("id").and_then(JsonValue::as_str).is_none() {
        return Err(AnchorError::serialization_error(
            "transaction record is missing an id",
        ));
    }

    let record: AnchorTransactionRecord = serde_json::from_value(record_json.clone())?;
    Ok(record.into_handle(record_json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_enveloped_record() {
        let body = r#"{"transaction":{"id":"tx1","status":"pending_anchor","amount_in":"10.0"}}"#;
        let handle = parse_transaction_body(body).unwrap();
        assert_eq!(handle.id, "tx1");
        assert_eq!(handle.status, TransactionStatus::PendingAnchor);
        assert_eq!(handle.raw["amount_in"], "10.0");
    }

    #[test]
    fn parses_bare_record_with_message() {
        let body = r#"{"id":"tx2","status":"error","message":"KYC rejected"}"#;
        let handle = parse_transaction_body(body).unwrap();
        assert_eq!(handle.status, TransactionStatus::Error);
        assert_eq!(handle.failure_reason(), "KYC rejected");
    }

    #[test]
    fn rejects_record_without_id() {
        let err = parse_transaction_body(r#"{"transaction":{"status":"completed"}}"#).unwrap_err();
        assert!(matches!(err, AnchorError::SerializationError { .. }));

        let err = parse_transaction_body("not json").unwrap_err();
        assert!(matches!(err, AnchorError::SerializationError { .. }));
    }

    #[test]
    fn unknown_status_is_kept_verbatim() {
        let handle =
            parse_transaction_body(r#"{"id":"tx3","status":"pending_review"}"#).unwrap();
        assert_eq!(handle.status.as_str(), "pending_review");
        assert!(!handle.status.is_terminal());
    }
}
