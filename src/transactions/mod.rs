//! Transaction domain types and the collaborator seams the lifecycle core
//! depends on.

pub mod draft;
pub mod status;
pub mod traits;

pub use draft::{
    parse_amount, DraftFields, IdempotencyKeySource, RandomKeySource, SubmitRequest,
    TransactionDraft, TransactionKind,
};
pub use status::{StatusKind, TransactionHandle, TransactionStatus};
pub use traits::{AllowAll, GateDecision, StatusFetcher, SubmissionGate, TransactionSubmitter};
