//! Transaction drafts: the user's finalized intent plus its idempotency key.
//!
//! A draft is immutable. Changing destination, asset or amount means building
//! a new draft, which gets a new key; the key exists so the remote system can
//! collapse retries of the *same* intent, never to merge distinct intents.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use stellar_strkey::ed25519::PublicKey as StrkeyPublicKey;
use uuid::Uuid;

use crate::error::DraftValidationError;

/// Kind of money movement a draft describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Transfer,
    Payment,
    Swap,
    AnchorDeposit,
    AnchorWithdraw,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Payment => "payment",
            TransactionKind::Swap => "swap",
            TransactionKind::AnchorDeposit => "anchor_deposit",
            TransactionKind::AnchorWithdraw => "anchor_withdraw",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source of unique, unguessable idempotency keys.
pub trait IdempotencyKeySource: Send + Sync {
    fn generate(&self) -> String;
}

/// Time + randomness derived keys: `{millis:x}-{uuid v4}`.
///
/// The UUID comes from the OS CSPRNG; the timestamp prefix keeps keys roughly
/// sortable in remote logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomKeySource;

impl IdempotencyKeySource for RandomKeySource {
    fn generate(&self) -> String {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        format!("{:x}-{}", millis, Uuid::new_v4().simple())
    }
}

/// User-authored fields of a draft, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftFields {
    pub kind: TransactionKind,
    pub destination: String,
    pub asset: String,
    pub amount: BigDecimal,
    /// Only meaningful for swaps.
    pub destination_asset: Option<String>,
    pub memo: Option<String>,
}

impl DraftFields {
    pub fn new(
        kind: TransactionKind,
        destination: impl Into<String>,
        asset: impl Into<String>,
        amount: BigDecimal,
    ) -> Self {
        Self {
            kind,
            destination: destination.into(),
            asset: asset.into(),
            amount,
            destination_asset: None,
            memo: None,
        }
    }

    pub fn transfer(destination: impl Into<String>, asset: impl Into<String>, amount: BigDecimal) -> Self {
        Self::new(TransactionKind::Transfer, destination, asset, amount)
    }

    pub fn with_destination_asset(mut self, asset: impl Into<String>) -> Self {
        self.destination_asset = Some(asset.into());
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn validate(&self) -> Result<(), DraftValidationError> {
        let destination = self.destination.trim();
        if destination.is_empty() {
            return Err(DraftValidationError::EmptyDestination);
        }
        if looks_like_stellar_account(destination)
            && StrkeyPublicKey::from_string(destination).is_err()
        {
            return Err(DraftValidationError::InvalidDestination {
                address: destination.to_string(),
            });
        }

        if self.asset.trim().is_empty() {
            return Err(DraftValidationError::MissingAsset);
        }

        if self.amount <= BigDecimal::from(0) {
            return Err(DraftValidationError::NonPositiveAmount {
                amount: self.amount.to_string(),
            });
        }

        if self.kind == TransactionKind::Swap {
            match self.destination_asset.as_deref().map(str::trim) {
                Some(target) if !target.is_empty() && target != self.asset.trim() => {}
                _ => {
                    return Err(DraftValidationError::InvalidSwapAsset {
                        asset: self.asset.clone(),
                    })
                }
            }
        }

        Ok(())
    }
}

fn looks_like_stellar_account(destination: &str) -> bool {
    destination.len() == 56 && destination.starts_with('G')
}

/// Parse a user-entered amount string.
pub fn parse_amount(input: &str) -> Result<BigDecimal, DraftValidationError> {
    BigDecimal::from_str(input.trim()).map_err(|_| DraftValidationError::InvalidAmount {
        amount: input.to_string(),
    })
}

/// A validated, keyed transaction intent.
///
/// Fields are private: once the key is attached nothing can change the
/// intent it stands for. Cloning keeps the key, which is what a retry needs.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    fields: DraftFields,
    idempotency_key: String,
}

impl TransactionDraft {
    /// Validates `fields` and then draws exactly one key from `keys`.
    pub fn create(
        fields: DraftFields,
        keys: &dyn IdempotencyKeySource,
    ) -> Result<Self, DraftValidationError> {
        fields.validate()?;
        let idempotency_key = keys.generate();
        Ok(Self {
            fields,
            idempotency_key,
        })
    }

    pub fn kind(&self) -> TransactionKind {
        self.fields.kind
    }

    pub fn destination(&self) -> &str {
        self.fields.destination.trim()
    }

    pub fn asset(&self) -> &str {
        self.fields.asset.trim()
    }

    pub fn amount(&self) -> &BigDecimal {
        &self.fields.amount
    }

    pub fn destination_asset(&self) -> Option<&str> {
        self.fields.destination_asset.as_deref().map(str::trim)
    }

    pub fn memo(&self) -> Option<&str> {
        self.fields.memo.as_deref()
    }

    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    pub fn fields(&self) -> &DraftFields {
        &self.fields
    }

    pub fn to_submit_request(&self) -> SubmitRequest {
        SubmitRequest {
            kind: self.fields.kind,
            destination: self.destination().to_string(),
            asset: self.asset().to_string(),
            amount: self.fields.amount.normalized().to_string(),
            destination_asset: self.destination_asset().map(str::to_string),
            memo: self.fields.memo.clone(),
            idempotency_key: self.idempotency_key.clone(),
        }
    }
}

/// Payload sent to the remote submit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub kind: TransactionKind,
    pub destination: String,
    pub asset: String,
    /// Decimal string, never a float.
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_asset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub idempotency_key: String,
}
