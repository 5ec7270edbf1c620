//! Blocking (from the caller's viewpoint) wait for a submitted transaction to
//! reach a terminal status.
//!
//! The calling task suspends at every fetch and every inter-poll sleep; nothing
//! else is blocked. The attempt ceiling surfaces as
//! [`LifecycleError::PollTimeout`], which callers must treat as "outcome
//! unknown" rather than as a failure.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::transactions::status::TransactionHandle;
use crate::transactions::traits::StatusFetcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Delay between two polls that returned a pending status.
    pub interval: Duration,
    /// Total number of `fetch_status` calls before giving up.
    pub max_attempts: u32,
    /// Consecutive failed fetches tolerated before escalating to a timeout.
    pub max_consecutive_failures: u32,
    /// Upper bound for the backoff applied after a failed fetch.
    pub max_backoff: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_attempts: 30,
            max_consecutive_failures: 3,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl PollOptions {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_max_consecutive_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_failures = failures;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }
}

/// Delay before the next poll after `consecutive_failures` failed fetches.
///
/// | failures | delay            |
/// |----------|------------------|
/// | 0        | interval         |
/// | 1        | 2 × interval     |
/// | 2        | 4 × interval     |
/// | n        | min(2ⁿ × interval, max_backoff) |
pub fn backoff_delay(interval: Duration, consecutive_failures: u32, max_backoff: Duration) -> Duration {
    let factor = 1u32.checked_shl(consecutive_failures.min(16)).unwrap_or(u32::MAX);
    interval
        .checked_mul(factor)
        .unwrap_or(max_backoff)
        .min(max_backoff.max(interval))
}

/// Poll until the transaction's status is terminal.
pub async fn wait_for_terminal(
    transaction_id: &str,
    fetcher: &dyn StatusFetcher,
    options: &PollOptions,
) -> LifecycleResult<TransactionHandle> {
    wait_for_terminal_with(transaction_id, fetcher, options, |handle| {
        handle.status.is_terminal()
    })
    .await
}

/// Like [`wait_for_terminal`] with a caller-supplied terminal predicate.
pub async fn wait_for_terminal_with<P>(
    transaction_id: &str,
    fetcher: &dyn StatusFetcher,
    options: &PollOptions,
    is_terminal: P,
) -> LifecycleResult<TransactionHandle>
where
    P: Fn(&TransactionHandle) -> bool + Send,
{
    let max_attempts = options.max_attempts.max(1);
    let mut consecutive_failures: u32 = 0;
    let mut last_error: Option<String> = None;

    for attempt in 1..=max_attempts {
        let delay = match fetcher.fetch_status(transaction_id).await {
            Ok(handle) => {
                consecutive_failures = 0;
                if is_terminal(&handle) {
                    info!(
                        transaction_id = %transaction_id,
                        status = %handle.status,
                        attempts = attempt,
                        "transaction reached terminal status"
                    );
                    return Ok(handle);
                }
                debug!(
                    transaction_id = %transaction_id,
                    status = %handle.status,
                    attempt,
                    "transaction still pending"
                );
                options.interval
            }
            Err(e) => {
                consecutive_failures += 1;
                last_error = Some(e.to_string());
                warn!(
                    transaction_id = %transaction_id,
                    attempt,
                    consecutive_failures,
                    error = %e,
                    "status fetch failed"
                );
                if !e.is_transient() || consecutive_failures > options.max_consecutive_failures {
                    warn!(
                        transaction_id = %transaction_id,
                        attempts = attempt,
                        "giving up on status polling after repeated fetch failures"
                    );
                    return Err(LifecycleError::PollTimeout {
                        transaction_id: transaction_id.to_string(),
                        attempts: attempt,
                        last_error,
                    });
                }
                backoff_delay(options.interval, consecutive_failures, options.max_backoff)
            }
        };

        if attempt < max_attempts {
            tokio::time::sleep(delay).await;
        }
    }

    warn!(
        transaction_id = %transaction_id,
        attempts = max_attempts,
        "transaction did not reach a terminal status within the poll bound"
    );
    Err(LifecycleError::PollTimeout {
        transaction_id: transaction_id.to_string(),
        attempts: max_attempts,
        last_error,
    })
}
