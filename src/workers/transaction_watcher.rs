//! Multi-transaction watcher.
//!
//! Observes many in-flight transactions independently. Each watched id runs
//! its own lifeline: fetch → compare with last known state → notify →
//! re-arm (pending) or stop (terminal). Only status *changes* are reported
//! through `on_change`.
//!
//! All bookkeeping lives in three registries owned by one watcher instance:
//!
//! - `transactions_registry`: id → last known handle, for change detection.
//! - `active_watch_registry`: id → still watched. `stop()` removes the entry,
//!   so a fetch that settles afterwards is dropped without a callback, and
//!   callbacks not yet delivered are skipped.
//! - `timer_registry`: id → the one scheduled re-poll, if any. Scheduling
//!   always replaces (and cancels) the previous entry, so at most one timer
//!   exists per id.
//!
//! Cancellation is cooperative. An in-flight fetch cannot be aborted; its
//! result is discarded when it settles. Callbacks run after the registry lock
//! is released, so they may call back into the watcher.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::anchor::errors::{AnchorError, AnchorResult};
use crate::transactions::status::{StatusKind, TransactionHandle};
use crate::transactions::traits::StatusFetcher;

// ---------------------------------------------------------------------------
// Observer types
// ---------------------------------------------------------------------------

/// What an `on_error` callback receives.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WatchError {
    /// The status fetch itself failed. The id is not re-armed; call
    /// `refresh()` to retry.
    #[error("status fetch for {transaction_id} failed: {source}")]
    Fetch {
        transaction_id: String,
        #[source]
        source: AnchorError,
    },

    /// The transaction reached a terminal status other than success.
    #[error("transaction {} ended with status {}", .handle.id, .handle.status)]
    TerminalFailure { handle: TransactionHandle },
}

impl WatchError {
    pub fn transaction_id(&self) -> &str {
        match self {
            WatchError::Fetch { transaction_id, .. } => transaction_id,
            WatchError::TerminalFailure { handle } => &handle.id,
        }
    }
}

/// Callbacks for one watched transaction. All methods default to no-ops.
pub trait TransactionObserver: Send + Sync {
    fn on_change(&self, _handle: &TransactionHandle) {}

    fn on_success(&self, _handle: &TransactionHandle) {}

    fn on_error(&self, _error: &WatchError) {}
}

type HandleCallback = Box<dyn Fn(&TransactionHandle) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&WatchError) + Send + Sync>;

/// Closure-based [`TransactionObserver`].
#[derive(Default)]
pub struct Callbacks {
    on_change: Option<HandleCallback>,
    on_success: Option<HandleCallback>,
    on_error: Option<ErrorCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_change(mut self, f: impl Fn(&TransactionHandle) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Box::new(f));
        self
    }

    pub fn on_success(mut self, f: impl Fn(&TransactionHandle) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&WatchError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl TransactionObserver for Callbacks {
    fn on_change(&self, handle: &TransactionHandle) {
        if let Some(f) = &self.on_change {
            f(handle)
        }
    }

    fn on_success(&self, handle: &TransactionHandle) {
        if let Some(f) = &self.on_success {
            f(handle)
        }
    }

    fn on_error(&self, error: &WatchError) {
        if let Some(f) = &self.on_error {
            f(error)
        }
    }
}

/// Parameters of a single `watch()` call.
pub struct WatchRequest {
    pub transaction_id: String,
    pub fetcher: Arc<dyn StatusFetcher>,
    pub observer: Arc<dyn TransactionObserver>,
    /// Falls back to the watcher's default interval.
    pub interval: Option<Duration>,
}

impl WatchRequest {
    pub fn new(
        transaction_id: impl Into<String>,
        fetcher: Arc<dyn StatusFetcher>,
        observer: Arc<dyn TransactionObserver>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            fetcher,
            observer,
            interval: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// A scheduled re-poll. Cancelling aborts the sleeping task.
struct TimerHandle {
    abort: AbortHandle,
    token: u64,
}

impl TimerHandle {
    fn cancel(self) {
        self.abort.abort();
    }
}

/// Per-id collaborators plus the generation of the only fetch whose result
/// will be honoured. `registration` identifies the `watch()` call that
/// created the slot and never changes while the slot lives.
struct WatchSlot {
    fetcher: Arc<dyn StatusFetcher>,
    observer: Arc<dyn TransactionObserver>,
    interval: Duration,
    generation: u64,
    registration: u64,
}

#[derive(Default)]
struct Registries {
    transactions_registry: HashMap<String, TransactionHandle>,
    active_watch_registry: HashMap<String, bool>,
    timer_registry: HashMap<String, Option<TimerHandle>>,
    slots: HashMap<String, WatchSlot>,
    next_token: u64,
}

impl Registries {
    fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    fn is_active(&self, transaction_id: &str) -> bool {
        self.active_watch_registry
            .get(transaction_id)
            .copied()
            .unwrap_or(false)
    }

    /// Whether `transaction_id` is still watched under the same `watch()` call.
    fn is_registered(&self, transaction_id: &str, registration: u64) -> bool {
        self.is_active(transaction_id)
            && self
                .slots
                .get(transaction_id)
                .map_or(false, |slot| slot.registration == registration)
    }

    /// Cancel the pending timer for `transaction_id`, leaving `None` behind.
    fn cancel_timer(&mut self, transaction_id: &str) -> bool {
        match self
            .timer_registry
            .get_mut(transaction_id)
            .and_then(Option::take)
        {
            Some(timer) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop every registry entry of a stopped id except its last known state.
    fn forget(&mut self, transaction_id: &str) -> bool {
        self.cancel_timer(transaction_id);
        self.timer_registry.remove(transaction_id);
        self.slots.remove(transaction_id);
        self.active_watch_registry
            .remove(transaction_id)
            .unwrap_or(false)
    }

    /// Start a new fetch generation, superseding any in-flight fetch.
    fn begin_fetch(&mut self, transaction_id: &str) -> Option<u64> {
        let generation = self.next_token();
        let slot = self.slots.get_mut(transaction_id)?;
        slot.generation = generation;
        Some(generation)
    }
}

/// Callbacks decided under the lock, delivered after it is released.
struct Notification {
    transaction_id: String,
    registration: u64,
    observer: Arc<dyn TransactionObserver>,
    changed: Option<TransactionHandle>,
    succeeded: Option<TransactionHandle>,
    error: Option<WatchError>,
}

impl Notification {
    /// Each callback re-checks the registration first: a `stop()` issued
    /// after `resolve`, including one from an earlier callback, silences the
    /// rest.
    fn deliver(self, shared: &WatcherShared) {
        let still_watched = || {
            let registered = shared
                .registries()
                .is_registered(&self.transaction_id, self.registration);
            if !registered {
                debug!(
                    transaction_id = %self.transaction_id,
                    "dropping callback for transaction no longer watched"
                );
            }
            registered
        };

        if let Some(handle) = &self.changed {
            if !still_watched() {
                return;
            }
            self.observer.on_change(handle);
        }
        if let Some(handle) = &self.succeeded {
            if !still_watched() {
                return;
            }
            self.observer.on_success(handle);
        }
        if let Some(error) = &self.error {
            if !still_watched() {
                return;
            }
            self.observer.on_error(error);
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct WatcherShared {
    registries: Mutex<Registries>,
    default_interval: Duration,
}

impl WatcherShared {
    fn registries(&self) -> MutexGuard<'_, Registries> {
        // Callbacks never run under this lock, so a poisoned guard still
        // protects consistent maps.
        self.registries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_fetch(self: &Arc<Self>, transaction_id: String, generation: u64) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            shared.run_fetch(transaction_id, generation).await;
        });
    }

    async fn run_fetch(self: Arc<Self>, transaction_id: String, generation: u64) {
        let fetcher = {
            let regs = self.registries();
            if !regs.is_active(&transaction_id) {
                return;
            }
            match regs.slots.get(&transaction_id) {
                Some(slot) => Arc::clone(&slot.fetcher),
                None => return,
            }
        };

        debug!(transaction_id = %transaction_id, generation, "fetching transaction status");
        let result = fetcher.fetch_status(&transaction_id).await;

        if let Some(notification) = self.resolve(&transaction_id, generation, result) {
            notification.deliver(&self);
        }
    }

    fn resolve(
        self: &Arc<Self>,
        transaction_id: &str,
        generation: u64,
        result: AnchorResult<TransactionHandle>,
    ) -> Option<Notification> {
        let mut regs = self.registries();

        if !regs.is_active(transaction_id) {
            debug!(
                transaction_id = %transaction_id,
                "discarding status for transaction no longer watched"
            );
            return None;
        }

        let (observer, interval, registration) = match regs.slots.get(transaction_id) {
            Some(slot) if slot.generation == generation => {
                (Arc::clone(&slot.observer), slot.interval, slot.registration)
            }
            _ => {
                debug!(
                    transaction_id = %transaction_id,
                    generation,
                    "discarding superseded status fetch"
                );
                return None;
            }
        };

        let mut notification = Notification {
            transaction_id: transaction_id.to_string(),
            registration,
            observer,
            changed: None,
            succeeded: None,
            error: None,
        };

        let handle = match result {
            Ok(handle) => handle,
            Err(source) => {
                warn!(
                    transaction_id = %transaction_id,
                    error = %source,
                    "status fetch failed; not re-arming"
                );
                notification.error = Some(WatchError::Fetch {
                    transaction_id: transaction_id.to_string(),
                    source,
                });
                return Some(notification);
            }
        };

        let changed = regs
            .transactions_registry
            .get(transaction_id)
            .map_or(true, |previous| previous.status != handle.status);
        regs.transactions_registry
            .insert(transaction_id.to_string(), handle.clone());
        if changed {
            debug!(
                transaction_id = %transaction_id,
                status = %handle.status,
                "transaction status changed"
            );
            notification.changed = Some(handle.clone());
        }

        match handle.status.kind() {
            StatusKind::Pending => {
                self.schedule_timer(&mut regs, transaction_id, interval);
            }
            StatusKind::Success => {
                regs.cancel_timer(transaction_id);
                info!(
                    transaction_id = %transaction_id,
                    status = %handle.status,
                    "watched transaction completed"
                );
                notification.succeeded = Some(handle);
            }
            StatusKind::Failure => {
                regs.cancel_timer(transaction_id);
                warn!(
                    transaction_id = %transaction_id,
                    status = %handle.status,
                    "watched transaction failed"
                );
                notification.error = Some(WatchError::TerminalFailure { handle });
            }
        }

        Some(notification)
    }

    fn schedule_timer(self: &Arc<Self>, regs: &mut Registries, transaction_id: &str, interval: Duration) {
        regs.cancel_timer(transaction_id);

        let token = regs.next_token();
        let shared = Arc::clone(self);
        let id = transaction_id.to_string();
        // The task cannot observe the registry before this function returns:
        // `fire_timer` needs the lock the caller is holding.
        let task = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            shared.fire_timer(id, token).await;
        });

        regs.timer_registry.insert(
            transaction_id.to_string(),
            Some(TimerHandle {
                abort: task.abort_handle(),
                token,
            }),
        );
    }

    async fn fire_timer(self: Arc<Self>, transaction_id: String, token: u64) {
        let generation = {
            let mut regs = self.registries();
            let current = matches!(
                regs.timer_registry.get(&transaction_id),
                Some(Some(timer)) if timer.token == token
            );
            if !current {
                return;
            }
            // Forget our own handle first so that nothing can abort this
            // task while its fetch is in flight.
            if let Some(entry) = regs.timer_registry.get_mut(&transaction_id) {
                *entry = None;
            }
            if !regs.is_active(&transaction_id) {
                return;
            }
            match regs.begin_fetch(&transaction_id) {
                Some(generation) => generation,
                None => return,
            }
        };

        self.run_fetch(transaction_id, generation).await;
    }

    fn refresh(self: &Arc<Self>, transaction_id: &str) -> bool {
        let generation = {
            let mut regs = self.registries();
            if !regs.is_active(transaction_id) {
                debug!(transaction_id = %transaction_id, "refresh ignored; not watching");
                return false;
            }
            regs.cancel_timer(transaction_id);
            match regs.begin_fetch(transaction_id) {
                Some(generation) => generation,
                None => return false,
            }
        };

        debug!(transaction_id = %transaction_id, "manual refresh");
        self.spawn_fetch(transaction_id.to_string(), generation);
        true
    }

    fn stop(&self, transaction_id: &str) {
        let was_active = self.registries().forget(transaction_id);

        if was_active {
            debug!(transaction_id = %transaction_id, "stopped watching transaction");
        }
    }

    fn stop_all(&self) {
        let mut regs = self.registries();
        let count = regs
            .active_watch_registry
            .values()
            .filter(|active| **active)
            .count();

        for timer in regs.timer_registry.drain().filter_map(|(_, timer)| timer) {
            timer.cancel();
        }
        regs.active_watch_registry.clear();
        regs.slots.clear();

        if count > 0 {
            info!(count, "stopped all transaction watches");
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Registry-based watcher for many in-flight transactions.
///
/// Hold exactly one per UI scope. Dropping it stops every watch, which is
/// the scope's teardown. Must be used from within a Tokio runtime.
pub struct TransactionWatcher {
    shared: Arc<WatcherShared>,
}

/// Controls for a single watched transaction.
#[derive(Clone)]
pub struct WatchHandle {
    shared: Arc<WatcherShared>,
    transaction_id: String,
}

impl TransactionWatcher {
    pub fn new(default_interval: Duration) -> Self {
        Self {
            shared: Arc::new(WatcherShared {
                registries: Mutex::new(Registries::default()),
                default_interval,
            }),
        }
    }

    /// Start watching a transaction. The first fetch is issued immediately.
    ///
    /// Watching an id that is already watched replaces its collaborators and
    /// supersedes any in-flight fetch and pending timer.
    pub fn watch(&self, request: WatchRequest) -> WatchHandle {
        let WatchRequest {
            transaction_id,
            fetcher,
            observer,
            interval,
        } = request;
        let interval = interval.unwrap_or(self.shared.default_interval);

        let generation = {
            let mut regs = self.shared.registries();
            regs.cancel_timer(&transaction_id);
            regs.timer_registry.insert(transaction_id.clone(), None);
            // Mark active before the first fetch so an early stop() is seen.
            regs.active_watch_registry.insert(transaction_id.clone(), true);
            let generation = regs.next_token();
            regs.slots.insert(
                transaction_id.clone(),
                WatchSlot {
                    fetcher,
                    observer,
                    interval,
                    generation,
                    registration: generation,
                },
            );
            generation
        };

        info!(
            transaction_id = %transaction_id,
            interval_ms = interval.as_millis() as u64,
            "watching transaction"
        );
        self.shared.spawn_fetch(transaction_id.clone(), generation);

        WatchHandle {
            shared: Arc::clone(&self.shared),
            transaction_id,
        }
    }

    /// Seed last-known state from a fresh list (e.g. a history endpoint) so
    /// the next watch compares against it instead of treating its first
    /// fetch as a first observation.
    pub fn update_transactions_registry<I>(&self, handles: I)
    where
        I: IntoIterator<Item = TransactionHandle>,
    {
        let mut regs = self.shared.registries();
        let mut seeded = 0usize;
        for handle in handles {
            regs.transactions_registry.insert(handle.id.clone(), handle);
            seeded += 1;
        }
        debug!(count = seeded, "seeded transactions registry");
    }

    pub fn refresh(&self, transaction_id: &str) -> bool {
        self.shared.refresh(transaction_id)
    }

    pub fn stop(&self, transaction_id: &str) {
        self.shared.stop(transaction_id)
    }

    pub fn stop_all(&self) {
        self.shared.stop_all()
    }

    pub fn is_watching(&self, transaction_id: &str) -> bool {
        self.shared.registries().is_active(transaction_id)
    }

    pub fn watched_ids(&self) -> Vec<String> {
        let regs = self.shared.registries();
        let mut ids: Vec<String> = regs
            .active_watch_registry
            .iter()
            .filter(|(_, active)| **active)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn has_pending_timer(&self, transaction_id: &str) -> bool {
        matches!(
            self.shared.registries().timer_registry.get(transaction_id),
            Some(Some(_))
        )
    }

    /// Number of scheduled re-polls across all ids.
    pub fn pending_timer_count(&self) -> usize {
        self.shared
            .registries()
            .timer_registry
            .values()
            .filter(|timer| timer.is_some())
            .count()
    }

    pub fn last_known(&self, transaction_id: &str) -> Option<TransactionHandle> {
        self.shared
            .registries()
            .transactions_registry
            .get(transaction_id)
            .cloned()
    }
}

impl Drop for TransactionWatcher {
    fn drop(&mut self) {
        self.shared.stop_all();
    }
}

impl WatchHandle {
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Cancel the pending timer and fetch now. Returns `false` if the id is
    /// no longer watched.
    pub fn refresh(&self) -> bool {
        self.shared.refresh(&self.transaction_id)
    }

    /// Stop watching. Idempotent.
    pub fn stop(&self) {
        self.shared.stop(&self.transaction_id)
    }
}
