//! Submission Pipeline
//!
//! Turns a finalized draft into a terminal outcome exactly once from the
//! caller's point of view: gate → submit with the draft's idempotency key →
//! wait for a terminal status → normalize.
//!
//! The pipeline never regenerates a key. Deduplicating retries of the same key
//! is the remote system's job; the pipeline only guarantees it sends one key
//! per intent.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::anchor::client::AnchorClient;
use crate::error::{LifecycleError, LifecycleResult};
use crate::logging::mask_wallet_address;
use crate::transactions::draft::{DraftFields, IdempotencyKeySource, RandomKeySource, TransactionDraft};
use crate::transactions::status::{StatusKind, TransactionHandle, TransactionStatus};
use crate::transactions::traits::{
    AllowAll, GateDecision, StatusFetcher, SubmissionGate, TransactionSubmitter,
};
use crate::workers::terminal_poller::{wait_for_terminal, PollOptions};

// ============================================================================
// Result Types
// ============================================================================

/// Normalized success result of [`SubmissionPipeline::execute`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub transaction_id: String,
    pub status: TransactionStatus,
    pub idempotency_key: String,
    pub handle: TransactionHandle,
}

/// Discriminated view of an `execute()` result, for UI code that switches on
/// the outcome rather than matching on errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Success,
    PollTimeout,
    RemoteFailure,
    SubmissionError,
    Rejected,
}

impl SubmissionOutcome {
    pub fn of(result: &LifecycleResult<SubmissionReceipt>) -> Self {
        match result {
            Ok(_) => SubmissionOutcome::Success,
            Err(LifecycleError::PollTimeout { .. }) => SubmissionOutcome::PollTimeout,
            Err(LifecycleError::RemoteFailure { .. }) => SubmissionOutcome::RemoteFailure,
            Err(LifecycleError::Submission { .. }) => SubmissionOutcome::SubmissionError,
            Err(LifecycleError::DraftValidation(_))
            | Err(LifecycleError::DraftNotSet)
            | Err(LifecycleError::SubmissionBlocked { .. }) => SubmissionOutcome::Rejected,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Stateless submit → poll-until-terminal orchestration.
///
/// Collaborators are injected; one pipeline may back many stores.
#[derive(Clone)]
pub struct SubmissionPipeline {
    submitter: Arc<dyn TransactionSubmitter>,
    fetcher: Arc<dyn StatusFetcher>,
    gate: Arc<dyn SubmissionGate>,
    poll_options: PollOptions,
}

impl SubmissionPipeline {
    pub fn new(
        submitter: Arc<dyn TransactionSubmitter>,
        fetcher: Arc<dyn StatusFetcher>,
        poll_options: PollOptions,
    ) -> Self {
        Self {
            submitter,
            fetcher,
            gate: Arc::new(AllowAll),
            poll_options,
        }
    }

    /// Pipeline that submits to and polls the same anchor.
    pub fn for_anchor(client: AnchorClient, poll_options: PollOptions) -> Self {
        let client = Arc::new(client);
        Self::new(client.clone(), client, poll_options)
    }

    pub fn with_gate(mut self, gate: Arc<dyn SubmissionGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn poll_options(&self) -> &PollOptions {
        &self.poll_options
    }

    /// Execute `draft` to a terminal outcome.
    ///
    /// Calling this twice with the same draft sends the same idempotency key
    /// both times.
    pub async fn execute(&self, draft: &TransactionDraft) -> LifecycleResult<SubmissionReceipt> {
        if let GateDecision::Deny { reason } = self.gate.authorize(draft).await {
            warn!(
                kind = %draft.kind(),
                reason = %reason,
                "submission blocked by pre-submission gate"
            );
            return Err(LifecycleError::SubmissionBlocked { reason });
        }

        let request = draft.to_submit_request();
        info!(
            kind = %request.kind,
            destination = %mask_wallet_address(&request.destination),
            asset = %request.asset,
            amount = %request.amount,
            idempotency_key = %request.idempotency_key,
            "submitting transaction"
        );

        let submitted = self.submitter.submit(&request).await.map_err(|e| {
            error!(
                idempotency_key = %request.idempotency_key,
                error = %e,
                "transaction submission failed"
            );
            LifecycleError::Submission { source: e }
        })?;

        info!(
            transaction_id = %submitted.id,
            status = %submitted.status,
            "transaction accepted by remote"
        );

        // The submit response may already be terminal; skip polling then.
        let terminal = if submitted.status.is_terminal() {
            submitted
        } else {
            wait_for_terminal(&submitted.id, self.fetcher.as_ref(), &self.poll_options).await?
        };

        normalize(terminal, &request.idempotency_key)
    }
}

fn normalize(handle: TransactionHandle, idempotency_key: &str) -> LifecycleResult<SubmissionReceipt> {
    match handle.status.kind() {
        StatusKind::Success => {
            info!(
                transaction_id = %handle.id,
                status = %handle.status,
                "transaction completed"
            );
            Ok(SubmissionReceipt {
                transaction_id: handle.id.clone(),
                status: handle.status.clone(),
                idempotency_key: idempotency_key.to_string(),
                handle,
            })
        }
        StatusKind::Failure => {
            let reason = handle.failure_reason();
            error!(
                transaction_id = %handle.id,
                status = %handle.status,
                reason = %reason,
                "transaction failed remotely"
            );
            Err(LifecycleError::RemoteFailure {
                transaction_id: handle.id,
                status: handle.status,
                reason,
            })
        }
        // Only reachable with a custom terminal predicate; treat as unresolved.
        StatusKind::Pending => Err(LifecycleError::PollTimeout {
            transaction_id: handle.id,
            attempts: 0,
            last_error: None,
        }),
    }
}

// ============================================================================
// Store
// ============================================================================

/// Owns the in-memory draft of one transfer/payment/swap flow.
///
/// The store assumes one submission in flight at a time; `submit` takes
/// `&mut self`, so the borrow checker enforces it for a single owner.
pub struct TransactionStore {
    pipeline: SubmissionPipeline,
    keys: Arc<dyn IdempotencyKeySource>,
    draft: Option<TransactionDraft>,
}

impl TransactionStore {
    pub fn new(pipeline: SubmissionPipeline) -> Self {
        Self::with_key_source(pipeline, Arc::new(RandomKeySource))
    }

    pub fn with_key_source(pipeline: SubmissionPipeline, keys: Arc<dyn IdempotencyKeySource>) -> Self {
        Self {
            pipeline,
            keys,
            draft: None,
        }
    }

    /// Validate `fields` and store a freshly keyed draft, replacing any
    /// previous one.
    pub fn create_draft(&mut self, fields: DraftFields) -> LifecycleResult<&TransactionDraft> {
        let draft = TransactionDraft::create(fields, self.keys.as_ref())?;
        Ok(self.draft.insert(draft))
    }

    pub fn draft(&self) -> Option<&TransactionDraft> {
        self.draft.as_ref()
    }

    pub fn clear(&mut self) {
        self.draft = None;
    }

    /// Execute the stored draft.
    ///
    /// The draft is cleared on every outcome except a submission error, which
    /// keeps it so the user's retry reuses the same idempotency key.
    pub async fn submit(&mut self) -> LifecycleResult<SubmissionReceipt> {
        let draft = self.draft.as_ref().ok_or(LifecycleError::DraftNotSet)?;
        let result = self.pipeline.execute(draft).await;

        match &result {
            Err(LifecycleError::Submission { .. }) => {
                warn!("keeping draft after submission error for retry");
            }
            _ => self.clear(),
        }
        result
    }
}

// ============================================================================
// Tests
// ============================================================================
