use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Coarse classification of a remote status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Pending,
    Success,
    Failure,
}

/// Remote transaction status as reported by the anchor.
///
/// The anchor vocabulary is open-ended, so anything unrecognised is kept
/// verbatim in `Other` and classified by prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionStatus {
    Incomplete,
    PendingUserTransferStart,
    PendingUserTransferComplete,
    PendingExternal,
    PendingAnchor,
    PendingStellar,
    PendingTrust,
    PendingUser,
    Pending,
    Completed,
    Refunded,
    Expired,
    Error,
    NoMarket,
    TooSmall,
    TooLarge,
    Failed,
    Other(String),
}

impl TransactionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Incomplete => "incomplete",
            TransactionStatus::PendingUserTransferStart => "pending_user_transfer_start",
            TransactionStatus::PendingUserTransferComplete => "pending_user_transfer_complete",
            TransactionStatus::PendingExternal => "pending_external",
            TransactionStatus::PendingAnchor => "pending_anchor",
            TransactionStatus::PendingStellar => "pending_stellar",
            TransactionStatus::PendingTrust => "pending_trust",
            TransactionStatus::PendingUser => "pending_user",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::Expired => "expired",
            TransactionStatus::Error => "error",
            TransactionStatus::NoMarket => "no_market",
            TransactionStatus::TooSmall => "too_small",
            TransactionStatus::TooLarge => "too_large",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Other(raw) => raw.as_str(),
        }
    }

    /// Parse a status string. Never fails; unknown values land verbatim in `Other`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "incomplete" => TransactionStatus::Incomplete,
            "pending_user_transfer_start" => TransactionStatus::PendingUserTransferStart,
            "pending_user_transfer_complete" => TransactionStatus::PendingUserTransferComplete,
            "pending_external" => TransactionStatus::PendingExternal,
            "pending_anchor" => TransactionStatus::PendingAnchor,
            "pending_stellar" => TransactionStatus::PendingStellar,
            "pending_trust" => TransactionStatus::PendingTrust,
            "pending_user" => TransactionStatus::PendingUser,
            "pending" | "processing" | "submitted" => TransactionStatus::Pending,
            "completed" | "success" | "paid" => TransactionStatus::Completed,
            "refunded" => TransactionStatus::Refunded,
            "expired" => TransactionStatus::Expired,
            "error" => TransactionStatus::Error,
            "no_market" => TransactionStatus::NoMarket,
            "too_small" => TransactionStatus::TooSmall,
            "too_large" => TransactionStatus::TooLarge,
            "failed" => TransactionStatus::Failed,
            _ => TransactionStatus::Other(s.to_string()),
        }
    }

    pub fn kind(&self) -> StatusKind {
        match self {
            TransactionStatus::Incomplete
            | TransactionStatus::PendingUserTransferStart
            | TransactionStatus::PendingUserTransferComplete
            | TransactionStatus::PendingExternal
            | TransactionStatus::PendingAnchor
            | TransactionStatus::PendingStellar
            | TransactionStatus::PendingTrust
            | TransactionStatus::PendingUser
            | TransactionStatus::Pending => StatusKind::Pending,
            TransactionStatus::Completed => StatusKind::Success,
            TransactionStatus::Other(raw) if is_pending_like(raw) => StatusKind::Pending,
            _ => StatusKind::Failure,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind() != StatusKind::Pending
    }

    pub fn is_success(&self) -> bool {
        self.kind() == StatusKind::Success
    }
}

fn is_pending_like(raw: &str) -> bool {
    raw.trim()
        .get(..7)
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case("pending"))
}

impl From<String> for TransactionStatus {
    fn from(s: String) -> Self {
        TransactionStatus::parse(&s)
    }
}

impl From<TransactionStatus> for String {
    fn from(status: TransactionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction as known to the remote system.
///
/// `id` is the join key used by the poller and the watcher to re-fetch status.
/// `raw` is the remote payload, carried along but never interpreted beyond
/// `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionHandle {
    pub id: String,
    pub status: TransactionStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub raw: JsonValue,
    pub observed_at: DateTime<Utc>,
}

impl TransactionHandle {
    pub fn new(id: impl Into<String>, status: TransactionStatus) -> Self {
        Self {
            id: id.into(),
            status,
            message: None,
            raw: JsonValue::Null,
            observed_at: Utc::now(),
        }
    }

    pub fn with_raw(mut self, raw: JsonValue) -> Self {
        self.raw = raw;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Best available human-readable reason for a failed transaction.
    pub fn failure_reason(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("transaction ended with status {}", self.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_statuses() {
        assert_eq!(
            TransactionStatus::parse("pending_anchor"),
            TransactionStatus::PendingAnchor
        );
        assert_eq!(TransactionStatus::parse("COMPLETED"), TransactionStatus::Completed);
        assert_eq!(TransactionStatus::parse("success"), TransactionStatus::Completed);
        assert_eq!(TransactionStatus::parse("paid"), TransactionStatus::Completed);
        assert_eq!(TransactionStatus::parse("failed"), TransactionStatus::Failed);
    }

    #[test]
    fn unknown_statuses_are_preserved() {
        let status = TransactionStatus::parse("pending_customer_info_update");
        assert_eq!(
            status,
            TransactionStatus::Other("pending_customer_info_update".to_string())
        );
        assert_eq!(status.as_str(), "pending_customer_info_update");
        assert_eq!(status.kind(), StatusKind::Pending);

        let status = TransactionStatus::parse("on_hold");
        assert_eq!(status.kind(), StatusKind::Failure);
    }

    #[test]
    fn unknown_statuses_keep_their_exact_spelling() {
        let status = TransactionStatus::parse("Pending_Compliance_Review");
        assert_eq!(status.as_str(), "Pending_Compliance_Review");
        assert_eq!(status.to_string(), "Pending_Compliance_Review");
        assert_eq!(status.kind(), StatusKind::Pending);

        let json = serde_json::to_string(&TransactionStatus::parse("On_Hold")).unwrap();
        assert_eq!(json, "\"On_Hold\"");
        assert!(TransactionStatus::parse("On_Hold").is_terminal());
    }

    #[test]
    fn classification() {
        assert_eq!(TransactionStatus::Incomplete.kind(), StatusKind::Pending);
        assert_eq!(TransactionStatus::PendingStellar.kind(), StatusKind::Pending);
        assert_eq!(TransactionStatus::Completed.kind(), StatusKind::Success);
        assert_eq!(TransactionStatus::Refunded.kind(), StatusKind::Failure);
        assert_eq!(TransactionStatus::Expired.kind(), StatusKind::Failure);
        assert_eq!(TransactionStatus::TooLarge.kind(), StatusKind::Failure);

        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Error.is_terminal());
        assert!(TransactionStatus::Completed.is_success());
    }

    #[test]
    fn serde_uses_wire_strings() {
        let json = serde_json::to_string(&TransactionStatus::PendingUserTransferStart).unwrap();
        assert_eq!(json, "\"pending_user_transfer_start\"");

        let status: TransactionStatus = serde_json::from_str("\"no_market\"").unwrap();
        assert_eq!(status, TransactionStatus::NoMarket);
    }

    #[test]
    fn failure_reason_prefers_remote_message() {
        let handle = TransactionHandle::new("tx1", TransactionStatus::Error)
            .with_message("anchor rejected KYC");
        assert_eq!(handle.failure_reason(), "anchor rejected KYC");

        let handle = TransactionHandle::new("tx2", TransactionStatus::Expired);
        assert_eq!(handle.failure_reason(), "transaction ended with status expired");
    }
}
