use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::anchor::errors::{AnchorError, AnchorResult};
use crate::anchor::types::parse_transaction_body;
use crate::config::AnchorConfig;
use crate::logging::mask_wallet_address;
use crate::transactions::draft::SubmitRequest;
use crate::transactions::status::TransactionHandle;
use crate::transactions::traits::{StatusFetcher, TransactionSubmitter};

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
const MAX_ERROR_BODY_CHARS: usize = 512;

/// HTTP client for the anchor / wallet backend transaction endpoints.
///
/// - `POST {base}/transactions` submits, carrying the draft's idempotency key
///   both in the body and in the `Idempotency-Key` header.
/// - `GET {base}/transaction?id=...` fetches current status.
#[derive(Debug, Clone)]
pub struct AnchorClient {
    http_client: Client,
    config: AnchorConfig,
}

impl AnchorClient {
    pub fn new(config: AnchorConfig) -> AnchorResult<Self> {
        config
            .validate()
            .map_err(|e| AnchorError::config_error(e.to_string()))?;

        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(20)
            .user_agent("Aframp-Wallet-Core/1.0")
            .build()
            .map_err(|e| AnchorError::config_error(format!("Failed to create HTTP client: {}", e)))?;

        info!(base_url = %config.base_url, "anchor client initialized");

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    pub async fn submit_transaction(&self, request: &SubmitRequest) -> AnchorResult<TransactionHandle> {
        let url = format!("{}/transactions", self.base_url());

        debug!(
            kind = %request.kind,
            destination = %mask_wallet_address(&request.destination),
            asset = %request.asset,
            "submitting transaction to anchor"
        );

        let builder = self
            .http_client
            .post(&url)
            .header(IDEMPOTENCY_KEY_HEADER, request.idempotency_key.as_str())
            .json(request);
        let body = self.send(builder, None).await?;

        let handle = parse_transaction_body(&body)?;
        debug!(
            transaction_id = %handle.id,
            status = %handle.status,
            "anchor accepted transaction"
        );
        Ok(handle)
    }

    pub async fn get_transaction(&self, transaction_id: &str) -> AnchorResult<TransactionHandle> {
        let url = format!(
            "{}/transaction?id={}",
            self.base_url(),
            encode_query_component(transaction_id)
        );

        let body = self
            .send(self.http_client.get(&url), Some(transaction_id))
            .await?;
        parse_transaction_body(&body)
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Send with the configured timeout and map transport and status errors.
    /// `not_found_id` turns a 404 into `TransactionNotFound`.
    async fn send(&self, builder: RequestBuilder, not_found_id: Option<&str>) -> AnchorResult<String> {
        let builder = match &self.config.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = timeout(self.config.request_timeout, builder.send())
            .await
            .map_err(|_| AnchorError::timeout_error(self.config.request_timeout.as_secs()))?
            .map_err(|e| {
                if e.is_timeout() {
                    AnchorError::timeout_error(self.config.request_timeout.as_secs())
                } else {
                    AnchorError::network_error(format!("Anchor request error: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnchorError::network_error(format!("Anchor response read error: {}", e)))?;

        if status.is_success() {
            return Ok(body);
        }

        warn!(status = status.as_u16(), "anchor returned an error status");
        Err(match (status, not_found_id) {
            (StatusCode::NOT_FOUND, Some(id)) => AnchorError::transaction_not_found(id),
            (StatusCode::TOO_MANY_REQUESTS, _) => AnchorError::RateLimitError,
            _ => AnchorError::http_error(status.as_u16(), truncate(&body, MAX_ERROR_BODY_CHARS)),
        })
    }
}

#[async_trait]
impl TransactionSubmitter for AnchorClient {
    async fn submit(&self, request: &SubmitRequest) -> AnchorResult<TransactionHandle> {
        self.submit_transaction(request).await
    }
}

#[async_trait]
impl StatusFetcher for AnchorClient {
    async fn fetch_status(&self, transaction_id: &str) -> AnchorResult<TransactionHandle> {
        self.get_transaction(transaction_id).await
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

fn encode_query_component(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if b.is_ascii_alphanumeric() || b"-_.~".contains(&b) {
            output.push(char::from(b));
        } else {
            output.push_str(&format!("%{:02X}", b));
        }
    }
    output
}
