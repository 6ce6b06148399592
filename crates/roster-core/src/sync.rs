//! Remote sync: CRUD intents against the record service, committed to the
//! local store only after the service confirms them.
//!
//! Design:
//! - no optimistic mutation: a failed call leaves local state unchanged,
//! - one in-flight operation per target; a second submission is rejected,
//! - `load` holds the commit gate from fetch to apply, so CRUD results that
//!   arrive meanwhile are applied after the loaded collection.

use crate::error::{Result, RosterError};
use crate::metrics::{SyncMetrics, SyncStats};
use crate::store::{Collection, RecordStore};
use parking_lot::Mutex;
use roster_remote::{Draft, Record, RecordId, RemoteError, RemoteStore};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What an in-flight operation is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpTarget {
    /// The (single) add form
    Create,
    /// An existing record
    Record(RecordId),
}

impl fmt::Display for OpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpTarget::Create => f.write_str("new student"),
            OpTarget::Record(id) => write!(f, "student {}", id),
        }
    }
}

/// Lifecycle of the latest operation on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpState {
    Idle,
    Pending,
    Committed,
    Failed,
}

/// Sync operations, with their user-facing texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    Load,
    Create,
    Update,
    Delete,
}

impl SyncOp {
    /// Message used when the service gave no usable one.
    pub fn default_error_message(self) -> &'static str {
        match self {
            SyncOp::Load => "Failed to load students. Please try again later.",
            SyncOp::Create => "Error adding student",
            SyncOp::Update => "Error updating student",
            SyncOp::Delete => "Error deleting student",
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            SyncOp::Load => "Students loaded",
            SyncOp::Create => "Student added successfully!",
            SyncOp::Update => "Student updated successfully!",
            SyncOp::Delete => "Student deleted successfully!",
        }
    }
}

/// State of the collection's initial load.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    /// Load failed; the collection is empty and must not be shown as an
    /// empty roster
    Failed(String),
}

#[derive(Default)]
struct LoadState {
    status: LoadStatus,
    /// Number of loads applied so far
    epoch: u64,
}

/// Per-target operation states.
///
/// Settled entries are kept only while their record exists.
#[derive(Default)]
struct InFlight {
    states: Mutex<HashMap<OpTarget, OpState>>,
}

impl InFlight {
    fn try_begin(&self, target: &OpTarget) -> bool {
        let mut states = self.states.lock();
        if states.get(target) == Some(&OpState::Pending) {
            return false;
        }
        states.insert(target.clone(), OpState::Pending);
        true
    }

    fn state(&self, target: &OpTarget) -> OpState {
        self.states
            .lock()
            .get(target)
            .copied()
            .unwrap_or(OpState::Idle)
    }

    fn set(&self, target: &OpTarget, state: OpState) {
        self.states.lock().insert(target.clone(), state);
    }

    fn forget(&self, target: &OpTarget) {
        self.states.lock().remove(target);
    }

    /// Drop settled entries for records absent from `collection`.
    fn prune(&self, collection: &Collection) {
        self.states.lock().retain(|target, state| match target {
            OpTarget::Create => true,
            OpTarget::Record(id) => *state == OpState::Pending || collection.contains(id),
        });
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.states.lock().len()
    }
}

/// Marks a target pending until finished. Dropping it unfinished (the
/// operation's future was cancelled) returns the target to `Idle`.
struct PendingGuard {
    shared: Arc<SyncShared>,
    target: OpTarget,
    finished: bool,
}

impl PendingGuard {
    fn finish(mut self, state: OpState) {
        self.shared.inflight.set(&self.target, state);
        self.finished = true;
    }

    /// Settle without keeping an entry (the record is gone).
    fn forget(mut self) {
        self.shared.inflight.forget(&self.target);
        self.finished = true;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.inflight.set(&self.target, OpState::Idle);
        }
    }
}

/// Where an operation started relative to loads.
#[derive(Clone, Copy)]
struct LoadMark {
    loading: bool,
    epoch: u64,
}

/// State shared between callers and commit tasks.
struct SyncShared {
    store: Arc<RecordStore>,
    inflight: InFlight,
    load: Mutex<LoadState>,
    commit_gate: tokio::sync::Mutex<()>,
    metrics: SyncMetrics,
}

impl SyncShared {
    /// Whether a load was in flight or applied since the operation started.
    fn raced_load(&self, mark: LoadMark) -> bool {
        mark.loading || self.load.lock().epoch != mark.epoch
    }

    fn commit_created(&self, record: Record, mark: LoadMark) -> Result<Record> {
        match self.store.add(record.clone()) {
            Ok(_) => {}
            Err(RosterError::DuplicateId(id)) if self.raced_load(mark) => {
                debug!(id = %id, "Created record arrived with the load; replacing");
                self.store.replace(&id, record.clone())?;
            }
            Err(e) => return Err(defect(SyncOp::Create, e)),
        }

        info!(id = %record.id, "Student created");
        Ok(record)
    }

    fn commit_updated(&self, id: &RecordId, record: Record, mark: LoadMark) -> Result<Record> {
        match self.store.replace(id, record.clone()) {
            Ok(_) => {}
            Err(RosterError::NotFound(_)) if self.raced_load(mark) => {
                debug!(id = %id, "Updated record missing after load; adding");
                self.store.add(record.clone())?;
            }
            Err(e) => return Err(defect(SyncOp::Update, e)),
        }

        info!(id = %id, "Student updated");
        Ok(record)
    }

    fn commit_deleted(&self, id: &RecordId, mark: LoadMark) -> Result<()> {
        match self.store.remove(id) {
            Ok(_) => {}
            Err(RosterError::NotFound(_)) if self.raced_load(mark) => {
                debug!(id = %id, "Deleted record already absent after load");
            }
            Err(e) => return Err(defect(SyncOp::Delete, e)),
        }

        info!(id = %id, "Student deleted");
        Ok(())
    }

    fn settle<T>(&self, guard: PendingGuard, op: SyncOp, outcome: Result<T>) -> Result<T> {
        match &outcome {
            Ok(_) => {
                self.metrics.record_committed();
                if op == SyncOp::Delete {
                    guard.forget();
                } else {
                    guard.finish(OpState::Committed);
                }
            }
            Err(e) => {
                self.metrics.record_failed();
                warn!(op = ?op, target = %guard.target, error = %e, "Operation failed");
                guard.finish(OpState::Failed);
            }
        }
        outcome
    }
}

/// Translates store-level intents into remote calls and commits confirmed
/// results into the [`RecordStore`].
pub struct RemoteSync {
    remote: Arc<dyn RemoteStore>,
    shared: Arc<SyncShared>,
}

impl RemoteSync {
    pub fn new(remote: Arc<dyn RemoteStore>, store: Arc<RecordStore>) -> Self {
        Self {
            remote,
            shared: Arc::new(SyncShared {
                store,
                inflight: InFlight::default(),
                load: Mutex::new(LoadState::default()),
                commit_gate: tokio::sync::Mutex::new(()),
                metrics: SyncMetrics::new(),
            }),
        }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.shared.store
    }

    pub fn status(&self) -> LoadStatus {
        self.shared.load.lock().status.clone()
    }

    pub fn op_state(&self, target: &OpTarget) -> OpState {
        self.shared.inflight.state(target)
    }

    pub fn stats(&self) -> SyncStats {
        self.shared.metrics.snapshot()
    }

    /// Fetch every record and replace the local collection wholesale.
    ///
    /// On failure the collection is left empty and the status is `Failed`.
    pub async fn load(&self) -> Result<Collection> {
        let shared = &self.shared;
        shared.load.lock().status = LoadStatus::Loading;
        let _gate = shared.commit_gate.lock().await;
        info!("Loading students");

        let applied = self
            .timed(SyncOp::Load, self.remote.list())
            .await
            .and_then(|records| {
                shared.store.replace_all(records).map_err(|e| {
                    error!(error = %e, "Service returned an inconsistent collection");
                    RosterError::Transport(SyncOp::Load.default_error_message().to_string())
                })
            });

        let mut load = shared.load.lock();
        load.epoch += 1;
        match applied {
            Ok(collection) => {
                load.status = LoadStatus::Ready;
                shared.inflight.prune(&collection);
                shared.metrics.record_committed();
                info!(total = collection.len(), "Students loaded");
                Ok(collection)
            }
            Err(e) => {
                shared.store.clear();
                load.status = LoadStatus::Failed(e.to_string());
                shared.metrics.record_failed();
                warn!(error = %e, "Failed to load students");
                Err(e)
            }
        }
    }

    /// Submit a new record; on success it is appended locally.
    pub async fn create(&self, draft: &Draft) -> Result<Record> {
        let mark = self.load_mark()?;
        let guard = self.begin(OpTarget::Create)?;

        let confirmed = match validate_draft(draft) {
            Ok(()) => self.timed(SyncOp::Create, self.remote.create(draft)).await,
            Err(e) => Err(e),
        };
        match confirmed {
            Ok(record) => {
                self.commit(guard, SyncOp::Create, move |shared| {
                    shared.commit_created(record, mark)
                })
                .await
            }
            Err(e) => self.shared.settle(guard, SyncOp::Create, Err(e)),
        }
    }

    /// Submit a full replacement for `id`; on success the confirmed record
    /// replaces the local one.
    pub async fn update_remote(&self, id: &RecordId, draft: &Draft) -> Result<Record> {
        let mark = self.load_mark()?;
        let guard = self.begin(OpTarget::Record(id.clone()))?;

        let confirmed = match validate_draft(draft) {
            Ok(()) => self.timed(SyncOp::Update, self.remote.update(id, draft)).await,
            Err(e) => Err(e),
        };
        match confirmed {
            Ok(record) => {
                let id = id.clone();
                self.commit(guard, SyncOp::Update, move |shared| {
                    shared.commit_updated(&id, record, mark)
                })
                .await
            }
            Err(e) => self.shared.settle(guard, SyncOp::Update, Err(e)),
        }
    }

    /// Delete `id` remotely; on success it is removed locally.
    pub async fn delete_remote(&self, id: &RecordId) -> Result<()> {
        let mark = self.load_mark()?;
        let guard = self.begin(OpTarget::Record(id.clone()))?;

        match self.timed(SyncOp::Delete, self.remote.delete(id)).await {
            Ok(()) => {
                let id = id.clone();
                self.commit(guard, SyncOp::Delete, move |shared| {
                    shared.commit_deleted(&id, mark)
                })
                .await
            }
            Err(e) => self.shared.settle(guard, SyncOp::Delete, Err(e)),
        }
    }

    /// Run a remote call, recording its latency and converting its error.
    async fn timed<T, F>(&self, op: SyncOp, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, RemoteError>>,
    {
        let started = Instant::now();
        let result = call.await;
        self.shared.metrics.record_remote_call(started.elapsed());
        result.map_err(|e| remote_failure(op, e))
    }

    /// Apply a confirmed result under the commit gate.
    ///
    /// The commit runs on its own task: it completes even if the caller's
    /// future is dropped, and the target stays pending until it does.
    async fn commit<T, F>(&self, guard: PendingGuard, op: SyncOp, apply: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SyncShared) -> Result<T> + Send + 'static,
    {
        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            let outcome = {
                let _gate = shared.commit_gate.lock().await;
                apply(&shared)
            };
            shared.settle(guard, op, outcome)
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(op = ?op, error = %e, "Commit task failed");
                Err(RosterError::Transport(op.default_error_message().to_string()))
            }
        }
    }

    fn load_mark(&self) -> Result<LoadMark> {
        let load = self.shared.load.lock();
        if load.status == LoadStatus::Idle {
            return Err(RosterError::NotLoaded);
        }
        Ok(LoadMark {
            loading: load.status == LoadStatus::Loading,
            epoch: load.epoch,
        })
    }

    fn begin(&self, target: OpTarget) -> Result<PendingGuard> {
        if !self.shared.inflight.try_begin(&target) {
            self.shared.metrics.record_rejected();
            debug!(target = %target, "Rejected submission while pending");
            return Err(RosterError::Busy(target));
        }
        Ok(PendingGuard {
            shared: self.shared.clone(),
            target,
            finished: false,
        })
    }
}

fn validate_draft(draft: &Draft) -> Result<()> {
    let missing = draft.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(RosterError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// Convert a service failure, substituting the operation's default message.
fn remote_failure(op: SyncOp, err: RemoteError) -> RosterError {
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| op.default_error_message().to_string());

    match err {
        RemoteError::Validation { .. } => RosterError::Validation(message),
        RemoteError::NotFound { id, .. } => RosterError::NotFound(id),
        RemoteError::Transport { .. } | RemoteError::Io(_) | RemoteError::Json(_) => {
            RosterError::Transport(message)
        }
    }
}

/// The service confirmed an operation the local store cannot apply.
fn defect(op: SyncOp, err: RosterError) -> RosterError {
    error!(op = ?op, error = %err, "Store rejected a confirmed operation (defect)");
    err
}
