//! Transaction lifecycle core for the Aframp wallet.
//!
//! - [`transactions`]: drafts, idempotency keys, status vocabulary and the
//!   collaborator traits.
//! - [`services`]: the submit → poll → normalize pipeline and the draft store.
//! - [`workers`]: the terminal-state poller and the multi-transaction watcher.
//! - [`anchor`]: the HTTP client that implements the collaborator traits.

pub mod anchor;
pub mod config;
pub mod error;
pub mod logging;
pub mod services;
pub mod transactions;
pub mod workers;

pub use anchor::{AnchorClient, AnchorError, AnchorResult};
pub use config::{ConfigError, LifecycleConfig};
pub use error::{DraftValidationError, ErrorCode, LifecycleError, LifecycleResult};
pub use services::{SubmissionOutcome, SubmissionPipeline, SubmissionReceipt, TransactionStore};
pub use transactions::{
    DraftFields, IdempotencyKeySource, RandomKeySource, StatusFetcher, TransactionDraft,
    TransactionHandle, TransactionKind, TransactionStatus, TransactionSubmitter,
};
pub use workers::{
    wait_for_terminal, Callbacks, PollOptions, TransactionObserver, TransactionWatcher,
    WatchError, WatchHandle, WatchRequest,
};
