//! Services module for transaction submission

pub mod submission_pipeline;

pub use submission_pipeline::{
    SubmissionOutcome, SubmissionPipeline, SubmissionReceipt, TransactionStore,
};
