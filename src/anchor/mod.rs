//! Anchor / wallet backend integration: HTTP client, wire types and errors.

pub mod client;
pub mod errors;
pub mod types;


pub use client::AnchorClient;
pub use errors::{AnchorError, AnchorResult};
pub use types::{AnchorTransactionEnvelope, AnchorTransactionRecord};
