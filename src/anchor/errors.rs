use thiserror::Error;

pub type AnchorResult<T> = Result<T, AnchorError>;

/// Failure modes of a call to the anchor / wallet backend.
///
/// A fetch never reports an ambiguous-but-valid status through this type;
/// ambiguity is expressed as a pending sub-status on the transaction itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnchorError {
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Timeout error: operation timed out after {seconds} seconds")]
    TimeoutError { seconds: u64 },

    #[error("Rate limit exceeded. Please try again later")]
    RateLimitError,

    #[error("Anchor returned HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("Transaction not found: {id}")]
    TransactionNotFound { id: String },

    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl AnchorError {
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    pub fn timeout_error(seconds: u64) -> Self {
        Self::TimeoutError { seconds }
    }

    pub fn http_error(status: u16, body: impl Into<String>) -> Self {
        Self::HttpError {
            status,
            body: body.into(),
        }
    }

    pub fn transaction_not_found(id: impl Into<String>) -> Self {
        Self::TransactionNotFound { id: id.into() }
    }

    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Whether a retry of the same call may succeed.
    ///
    /// A freshly submitted transaction is frequently not yet indexed by the
    /// anchor, so `TransactionNotFound` counts as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            AnchorError::NetworkError { .. }
            | AnchorError::TimeoutError { .. }
            | AnchorError::RateLimitError
            | AnchorError::TransactionNotFound { .. } => true,
            AnchorError::HttpError { status, .. } => *status >= 500,
            AnchorError::SerializationError { .. } | AnchorError::ConfigError { .. } => false,
        }
    }
}

impl From<serde_json::Error> for AnchorError {
    fn from(err: serde_json::Error) -> Self {
        AnchorError::serialization_error(format!("JSON error: {}", err))
    }
}
