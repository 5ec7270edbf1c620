//! Error taxonomy for the transaction lifecycle.
//!
//! `DraftValidationError` never reaches the network. `LifecycleError` is the
//! discriminated failure of a submission; its variants keep "outcome unknown"
//! (`PollTimeout`) apart from "definitely failed" (`RemoteFailure`) so the UI
//! can send the user to their history instead of claiming the money is lost.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::anchor::errors::AnchorError;
use crate::transactions::status::TransactionStatus;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Stable error codes for programmatic handling by the UI layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "INVALID_DRAFT")]
    InvalidDraft,
    #[serde(rename = "DRAFT_NOT_SET")]
    DraftNotSet,
    #[serde(rename = "SUBMISSION_BLOCKED")]
    SubmissionBlocked,
    #[serde(rename = "SUBMISSION_FAILED")]
    SubmissionFailed,
    #[serde(rename = "OUTCOME_UNKNOWN")]
    OutcomeUnknown,
    #[serde(rename = "TRANSACTION_FAILED")]
    TransactionFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidDraft => "INVALID_DRAFT",
            ErrorCode::DraftNotSet => "DRAFT_NOT_SET",
            ErrorCode::SubmissionBlocked => "SUBMISSION_BLOCKED",
            ErrorCode::SubmissionFailed => "SUBMISSION_FAILED",
            ErrorCode::OutcomeUnknown => "OUTCOME_UNKNOWN",
            ErrorCode::TransactionFailed => "TRANSACTION_FAILED",
        }
    }
}

/// A malformed transfer intent, rejected before an idempotency key is spent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DraftValidationError {
    #[error("destination must not be empty")]
    EmptyDestination,

    #[error("invalid destination address: {address}")]
    InvalidDestination { address: String },

    #[error("asset must be set")]
    MissingAsset,

    #[error("amount must be positive, got {amount}")]
    NonPositiveAmount { amount: String },

    #[error("amount is not a valid decimal: {amount}")]
    InvalidAmount { amount: String },

    #[error("swap requires a destination asset different from {asset}")]
    InvalidSwapAsset { asset: String },
}

#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    #[error("invalid draft: {0}")]
    DraftValidation(#[from] DraftValidationError),

    #[error("no transaction draft is set")]
    DraftNotSet,

    #[error("submission blocked: {reason}")]
    SubmissionBlocked { reason: String },

    #[error("submission failed: {source}")]
    Submission {
        #[source]
        source: AnchorError,
    },

    #[error("transaction {transaction_id} did not reach a terminal state after {attempts} attempt(s)")]
    PollTimeout {
        transaction_id: String,
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("transaction {transaction_id} failed with status {status}: {reason}")]
    RemoteFailure {
        transaction_id: String,
        status: TransactionStatus,
        reason: String,
    },
}

impl LifecycleError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            LifecycleError::DraftValidation(_) => ErrorCode::InvalidDraft,
            LifecycleError::DraftNotSet => ErrorCode::DraftNotSet,
            LifecycleError::SubmissionBlocked { .. } => ErrorCode::SubmissionBlocked,
            LifecycleError::Submission { .. } => ErrorCode::SubmissionFailed,
            LifecycleError::PollTimeout { .. } => ErrorCode::OutcomeUnknown,
            LifecycleError::RemoteFailure { .. } => ErrorCode::TransactionFailed,
        }
    }

    /// The transaction may still resolve server-side.
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, LifecycleError::PollTimeout { .. })
    }

    /// The remote system reported a terminal failure.
    pub fn is_definite_failure(&self) -> bool {
        matches!(self, LifecycleError::RemoteFailure { .. })
    }

    /// Whether pressing "submit" again is a sensible next step. Safe for
    /// submission errors because the retry reuses the same idempotency key.
    pub fn is_retryable(&self) -> bool {
        match self {
            LifecycleError::Submission { .. } => true,
            _ => false,
        }
    }

    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            LifecycleError::PollTimeout { transaction_id, .. }
            | LifecycleError::RemoteFailure { transaction_id, .. } => Some(transaction_id),
            _ => None,
        }
    }

    /// User-facing copy for the error screen.
    pub fn user_message(&self) -> String {
        match self {
            LifecycleError::DraftValidation(err) => format!("Please check your details: {}", err),
            LifecycleError::DraftNotSet => {
                "There is no transaction to submit. Please start again.".to_string()
            }
            LifecycleError::SubmissionBlocked { .. } => {
                "This transaction was not authorized.".to_string()
            }
            LifecycleError::Submission { .. } => {
                "We could not send your transaction. You can safely try again.".to_string()
            }
            LifecycleError::PollTimeout { .. } => {
                "Your transaction is still processing. Check your transaction history for the final result."
                    .to_string()
            }
            LifecycleError::RemoteFailure { reason, .. } => {
                format!("Your transaction failed: {}", reason)
            }
        }
    }
}
