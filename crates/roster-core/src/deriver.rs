//! Recompute-on-change view derivation.
//!
//! Trigger rules:
//! - a collection change recomputes immediately,
//! - a search term change recomputes once the term has been quiet for the
//!   debounce window; a newer term cancels the pending recomputation.
//!
//! Views are published through a `watch` channel.

use crate::debounce::DebounceTimer;
use crate::metrics::{DeriveMetrics, DeriveStats};
use crate::store::{Collection, SnapshotObserver};
use crate::view::{derive, GroupKeyPolicy, View};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace};

struct DeriverState {
    collection: Collection,
    term: String,
    /// Bumped on every input change; a timer that fires for an older
    /// generation is stale.
    generation: u64,
}

struct DeriverInner {
    state: Mutex<DeriverState>,
    view_tx: watch::Sender<Arc<View>>,
    policy: GroupKeyPolicy,
    metrics: DeriveMetrics,
}

impl DeriverInner {
    fn recompute_locked(&self, state: &DeriverState) {
        let view = derive(&state.collection, &state.term, self.policy);
        trace!(
            term = %view.term(),
            matched = view.matched_count(),
            groups = view.groups().len(),
            "View recomputed"
        );
        self.view_tx.send_replace(Arc::new(view));
        self.metrics.record_recomputation();
    }

    fn recompute_if_current(&self, generation: u64) {
        let state = self.state.lock();
        if state.generation != generation {
            self.metrics.record_discarded();
            return;
        }
        self.recompute_locked(&state);
    }
}

/// Derives the grouped view from the latest collection and search term.
///
/// Must be used within a tokio runtime.
pub struct ViewDeriver {
    inner: Arc<DeriverInner>,
    timer: DebounceTimer,
    delay: Duration,
}

impl ViewDeriver {
    pub fn new(delay: Duration, policy: GroupKeyPolicy) -> Self {
        let initial = derive(&[], "", policy);
        let (view_tx, _) = watch::channel(Arc::new(initial));

        Self {
            inner: Arc::new(DeriverInner {
                state: Mutex::new(DeriverState {
                    collection: Collection::default(),
                    term: String::new(),
                    generation: 0,
                }),
                view_tx,
                policy,
                metrics: DeriveMetrics::new(),
            }),
            timer: DebounceTimer::new(),
            delay,
        }
    }

    /// Change the search term; the view follows after the debounce window.
    pub fn set_search_term(&self, term: impl Into<String>) {
        let mut state = self.inner.state.lock();
        state.term = term.into();
        state.generation += 1;

        let generation = state.generation;
        let inner = self.inner.clone();
        let cancelled = self
            .timer
            .schedule(self.delay, move || inner.recompute_if_current(generation));
        if cancelled {
            self.inner.metrics.record_cancelled();
        }

        debug!(term = %state.term, generation, "Search term changed");
    }

    /// Reset the search term (debounced like any other term change).
    pub fn clear_search(&self) {
        self.set_search_term(String::new());
    }

    /// New collection snapshot; recomputes immediately with the latest term.
    pub fn collection_changed(&self, collection: &Collection) {
        let mut state = self.inner.state.lock();
        state.collection = collection.clone();
        state.generation += 1;

        if self.timer.cancel_pending() {
            self.inner.metrics.record_cancelled();
        }
        self.inner.recompute_locked(&state);
    }

    /// Run a pending term recomputation now. Returns false if none was
    /// pending.
    pub fn flush(&self) -> bool {
        let mut state = self.inner.state.lock();
        if !self.timer.cancel_pending() {
            return false;
        }
        state.generation += 1;
        self.inner.recompute_locked(&state);
        true
    }

    /// Cancel any pending recomputation without publishing.
    pub fn cancel_pending(&self) -> bool {
        let mut state = self.inner.state.lock();
        let cancelled = self.timer.cancel_pending();
        if cancelled {
            state.generation += 1;
            self.inner.metrics.record_cancelled();
        }
        cancelled
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }

    /// Latest term, which the published view may not reflect yet.
    pub fn search_term(&self) -> String {
        self.inner.state.lock().term.clone()
    }

    /// Latest published view.
    pub fn current(&self) -> Arc<View> {
        self.inner.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<View>> {
        self.inner.view_tx.subscribe()
    }

    pub fn stats(&self) -> DeriveStats {
        self.inner.metrics.snapshot()
    }
}

impl SnapshotObserver for ViewDeriver {
    fn snapshot_changed(&self, collection: &Collection) {
        self.collection_changed(collection);
    }
}
