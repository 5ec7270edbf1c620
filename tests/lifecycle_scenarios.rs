//! End-to-end lifecycle scenarios against an in-memory anchor.
//!
//! Run with: cargo test --test lifecycle_scenarios

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aframp_wallet_core::anchor::errors::{AnchorError, AnchorResult};
use aframp_wallet_core::transactions::draft::SubmitRequest;
use aframp_wallet_core::{
    Callbacks, DraftFields, IdempotencyKeySource, LifecycleError, PollOptions, StatusFetcher,
    SubmissionOutcome, SubmissionPipeline, TransactionDraft, TransactionHandle, TransactionStatus,
    TransactionStore, TransactionSubmitter, TransactionWatcher, WatchRequest,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use tokio::time::sleep;

/// Anchor double: assigns ids per idempotency key and replays scripted
/// statuses per id, then repeats the last one.
#[derive(Default)]
struct FakeAnchor {
    submit_ids: Mutex<VecDeque<String>>,
    submit_failures: Mutex<VecDeque<AnchorError>>,
    ids_by_key: Mutex<HashMap<String, String>>,
    keys_seen: Mutex<Vec<String>>,
    statuses: Mutex<HashMap<String, VecDeque<AnchorResult<TransactionStatus>>>>,
    fetches: AtomicU32,
}

impl FakeAnchor {
    fn next_id(self, id: &str) -> Self {
        self.submit_ids.lock().unwrap().push_back(id.to_string());
        self
    }

    fn fail_next_submit(self, error: AnchorError) -> Self {
        self.submit_failures.lock().unwrap().push_back(error);
        self
    }

    fn script(self, id: &str, statuses: Vec<AnchorResult<TransactionStatus>>) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(id.to_string(), statuses.into());
        self
    }

    fn keys_seen(&self) -> Vec<String> {
        self.keys_seen.lock().unwrap().clone()
    }

    fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionSubmitter for FakeAnchor {
    async fn submit(&self, request: &SubmitRequest) -> AnchorResult<TransactionHandle> {
        self.keys_seen
            .lock()
            .unwrap()
            .push(request.idempotency_key.clone());

        if let Some(error) = self.submit_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let mut ids = self.ids_by_key.lock().unwrap();
        let id = match ids.get(&request.idempotency_key) {
            Some(existing) => existing.clone(),
            None => {
                let id = self
                    .submit_ids
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| format!("tx-{}", ids.len() + 1));
                ids.insert(request.idempotency_key.clone(), id.clone());
                id
            }
        };
        Ok(TransactionHandle::new(id, TransactionStatus::Pending))
    }
}

#[async_trait]
impl StatusFetcher for FakeAnchor {
    async fn fetch_status(&self, transaction_id: &str) -> AnchorResult<TransactionHandle> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let queue = statuses
            .get_mut(transaction_id)
            .ok_or_else(|| AnchorError::transaction_not_found(transaction_id))?;
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        next.unwrap_or(Ok(TransactionStatus::Pending))
            .map(|status| TransactionHandle::new(transaction_id, status))
    }
}

struct SequentialKeys(AtomicU32);

impl IdempotencyKeySource for SequentialKeys {
    fn generate(&self) -> String {
        format!("key-{}", self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

fn draft_fields() -> DraftFields {
    DraftFields::transfer("D".repeat(56), "XLM", BigDecimal::from(10))
}

fn pipeline(anchor: &Arc<FakeAnchor>, max_attempts: u32) -> SubmissionPipeline {
    SubmissionPipeline::new(
        anchor.clone(),
        anchor.clone(),
        PollOptions::new(Duration::from_millis(500), max_attempts),
    )
}

#[tokio::test(start_paused = true)]
async fn happy_path_resolves_with_receipt() {
    let anchor = Arc::new(FakeAnchor::default().next_id("tx1").script(
        "tx1",
        vec![Ok(TransactionStatus::Pending), Ok(TransactionStatus::Completed)],
    ));
    let draft = TransactionDraft::create(draft_fields(), &SequentialKeys(AtomicU32::new(0)))
        .expect("valid draft");

    let receipt = pipeline(&anchor, 10).execute(&draft).await.expect("success");

    assert_eq!(receipt.transaction_id, "tx1");
    assert!(receipt.status.is_success());
    assert_eq!(receipt.idempotency_key, "key-1");
    assert_eq!(anchor.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn definite_failure_is_a_remote_failure() {
    let anchor = Arc::new(
        FakeAnchor::default()
            .next_id("tx2")
            .script("tx2", vec![Ok(TransactionStatus::Failed)]),
    );
    let draft = TransactionDraft::create(draft_fields(), &SequentialKeys(AtomicU32::new(0)))
        .expect("valid draft");

    let result = pipeline(&anchor, 10).execute(&draft).await;

    assert_eq!(SubmissionOutcome::of(&result), SubmissionOutcome::RemoteFailure);
    let err = result.unwrap_err();
    assert!(err.is_definite_failure());
    assert_eq!(err.transaction_id(), Some("tx2"));
}

#[tokio::test(start_paused = true)]
async fn ambiguous_timeout_is_not_a_failure() {
    let anchor = Arc::new(
        FakeAnchor::default()
            .next_id("tx3")
            .script("tx3", vec![Ok(TransactionStatus::Pending)]),
    );
    let draft = TransactionDraft::create(draft_fields(), &SequentialKeys(AtomicU32::new(0)))
        .expect("valid draft");

    let result = pipeline(&anchor, 6).execute(&draft).await;

    assert_eq!(SubmissionOutcome::of(&result), SubmissionOutcome::PollTimeout);
    match result.unwrap_err() {
        err @ LifecycleError::PollTimeout { .. } => {
            assert!(err.is_outcome_unknown());
            assert!(!err.is_definite_failure());
        }
        other => panic!("expected PollTimeout, got {other:?}"),
    }
    assert_eq!(anchor.fetches(), 6);
}

#[tokio::test(start_paused = true)]
async fn retry_after_submission_error_reuses_the_key() {
    let anchor = Arc::new(
        FakeAnchor::default()
            .fail_next_submit(AnchorError::network_error("connection reset"))
            .next_id("tx4")
            .script("tx4", vec![Ok(TransactionStatus::Completed)]),
    );
    let mut store = TransactionStore::with_key_source(
        pipeline(&anchor, 10),
        Arc::new(SequentialKeys(AtomicU32::new(0))),
    );
    store.create_draft(draft_fields()).expect("valid draft");

    let first = store.submit().await;
    assert!(matches!(first, Err(LifecycleError::Submission { .. })));
    assert!(first.unwrap_err().is_retryable());
    assert!(store.draft().is_some(), "draft kept for retry");

    let second = store.submit().await.expect("retry succeeds");
    assert_eq!(second.transaction_id, "tx4");
    assert_eq!(anchor.keys_seen(), vec!["key-1".to_string(), "key-1".to_string()]);
    assert!(store.draft().is_none());
}

#[tokio::test(start_paused = true)]
async fn same_draft_executed_twice_sends_one_key() {
    let anchor = Arc::new(
        FakeAnchor::default()
            .next_id("tx5")
            .script("tx5", vec![Ok(TransactionStatus::Completed)]),
    );
    let draft = TransactionDraft::create(draft_fields(), &SequentialKeys(AtomicU32::new(0)))
        .expect("valid draft");
    let pipeline = pipeline(&anchor, 10);

    let first = pipeline.execute(&draft).await.expect("first");
    let second = pipeline.execute(&draft).await.expect("second");

    assert_eq!(first.transaction_id, second.transaction_id);
    assert_eq!(anchor.keys_seen(), vec!["key-1".to_string(), "key-1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn invalid_draft_never_reaches_the_network() {
    let anchor = Arc::new(FakeAnchor::default());
    let mut store = TransactionStore::new(pipeline(&anchor, 10));

    let err = store
        .create_draft(DraftFields::transfer("  ", "XLM", BigDecimal::from(10)))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::DraftValidation(_)));

    let err = store.submit().await.unwrap_err();
    assert!(matches!(err, LifecycleError::DraftNotSet));
    assert!(anchor.keys_seen().is_empty());
}

#[derive(Default)]
struct Tally {
    changes: Mutex<Vec<(String, TransactionStatus)>>,
    successes: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

fn observe(tally: &Arc<Tally>) -> Arc<Callbacks> {
    let on_change = Arc::clone(tally);
    let on_success = Arc::clone(tally);
    let on_error = Arc::clone(tally);
    Arc::new(
        Callbacks::new()
            .on_change(move |handle| {
                on_change
                    .changes
                    .lock()
                    .unwrap()
                    .push((handle.id.clone(), handle.status.clone()));
            })
            .on_success(move |handle| on_success.successes.lock().unwrap().push(handle.id.clone()))
            .on_error(move |error| {
                on_error
                    .errors
                    .lock()
                    .unwrap()
                    .push(error.transaction_id().to_string())
            }),
    )
}

#[tokio::test(start_paused = true)]
async fn independent_multi_watch() {
    let anchor = Arc::new(
        FakeAnchor::default()
            .script(
                "a",
                vec![
                    Ok(TransactionStatus::Pending),
                    Err(AnchorError::network_error("connection reset")),
                ],
            )
            .script(
                "b",
                vec![
                    Ok(TransactionStatus::Pending),
                    Ok(TransactionStatus::PendingStellar),
                    Ok(TransactionStatus::Completed),
                ],
            ),
    );
    let tally_a = Arc::new(Tally::default());
    let tally_b = Arc::new(Tally::default());
    let watcher = TransactionWatcher::new(Duration::from_millis(100));

    watcher.watch(WatchRequest::new("a", anchor.clone(), observe(&tally_a)));
    watcher.watch(WatchRequest::new("b", anchor.clone(), observe(&tally_b)));
    sleep(Duration::from_secs(1)).await;

    assert_eq!(*tally_a.errors.lock().unwrap(), vec!["a".to_string()]);
    assert!(tally_a.successes.lock().unwrap().is_empty());
    assert!(!watcher.has_pending_timer("a"));

    assert_eq!(*tally_b.successes.lock().unwrap(), vec!["b".to_string()]);
    assert!(tally_b.errors.lock().unwrap().is_empty());
    assert_eq!(tally_b.changes.lock().unwrap().len(), 3);

    // a: 2 fetches, b: 3 fetches, nothing after both settled
    assert_eq!(anchor.fetches(), 5);
}

#[tokio::test(start_paused = true)]
async fn repeated_status_triggers_one_change() {
    let anchor = Arc::new(FakeAnchor::default().script(
        "tx6",
        vec![
            Ok(TransactionStatus::PendingAnchor),
            Ok(TransactionStatus::PendingAnchor),
            Ok(TransactionStatus::PendingAnchor),
        ],
    ));
    let tally = Arc::new(Tally::default());
    let watcher = TransactionWatcher::new(Duration::from_millis(100));

    let handle = watcher.watch(WatchRequest::new("tx6", anchor.clone(), observe(&tally)));
    sleep(Duration::from_millis(350)).await;
    handle.stop();

    assert_eq!(anchor.fetches(), 4);
    assert_eq!(
        *tally.changes.lock().unwrap(),
        vec![("tx6".to_string(), TransactionStatus::PendingAnchor)]
    );
}

#[tokio::test(start_paused = true)]
async fn scope_teardown_stops_all_watches() {
    let anchor = Arc::new(
        FakeAnchor::default()
            .script("x", vec![Ok(TransactionStatus::Pending)])
            .script("y", vec![Ok(TransactionStatus::PendingUser)]),
    );
    let tally = Arc::new(Tally::default());

    {
        let watcher = TransactionWatcher::new(Duration::from_millis(100));
        watcher.watch(WatchRequest::new("x", anchor.clone(), observe(&tally)));
        watcher.watch(WatchRequest::new("y", anchor.clone(), observe(&tally)));
        sleep(Duration::from_millis(250)).await;
        assert_eq!(watcher.pending_timer_count(), 2);
    }

    let fetches = anchor.fetches();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(anchor.fetches(), fetches);
}
