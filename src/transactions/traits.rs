use async_trait::async_trait;

use crate::anchor::errors::AnchorResult;
use crate::transactions::draft::{SubmitRequest, TransactionDraft};
use crate::transactions::status::TransactionHandle;

/// Remote submit call.
///
/// Implementations must forward `request.idempotency_key` so that repeated
/// calls with the same key and payload resolve to the same remote transaction.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn submit(&self, request: &SubmitRequest) -> AnchorResult<TransactionHandle>;
}

/// Remote status lookup by transaction id.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch_status(&self, transaction_id: &str) -> AnchorResult<TransactionHandle>;
}

/// Outcome of the pre-submission gate (PIN, biometrics, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny { reason: String },
}

/// Gate consulted before a draft enters the pipeline.
#[async_trait]
pub trait SubmissionGate: Send + Sync {
    async fn authorize(&self, draft: &TransactionDraft) -> GateDecision;
}

/// Gate that lets every draft through.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl SubmissionGate for AllowAll {
    async fn authorize(&self, _draft: &TransactionDraft) -> GateDecision {
        GateDecision::Allow
    }
}
