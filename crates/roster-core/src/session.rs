//! UI-facing session: named modal state, intents and notifications.

use crate::config::RosterConfig;
use crate::deriver::ViewDeriver;
use crate::error::{Result, RosterError};
use crate::metrics::{DeriveStats, SyncStats};
use crate::store::{Collection, RecordStore};
use crate::sync::{LoadStatus, RemoteSync, SyncOp};
use crate::view::View;
use parking_lot::Mutex;
use roster_remote::{Draft, Record, RecordId, RemoteStore};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

/// Which dialog is open. Exactly one at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Modal {
    #[default]
    Closed,
    Adding,
    Editing(Record),
    Viewing(Record),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Pass/fail notification for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// One client session over a remote record service.
///
/// Must be used within a tokio runtime.
pub struct Session {
    store: Arc<RecordStore>,
    sync: RemoteSync,
    deriver: Arc<ViewDeriver>,
    modal: Mutex<Modal>,
    notices: broadcast::Sender<Notice>,
}

impl Session {
    pub fn new(remote: Arc<dyn RemoteStore>, config: &RosterConfig) -> Self {
        let store = Arc::new(RecordStore::new());
        let deriver = Arc::new(ViewDeriver::new(config.debounce(), config.group_keys));
        store.observe(deriver.clone());

        let (notices, _) = broadcast::channel(config.notice_capacity.max(1));

        Self {
            sync: RemoteSync::new(remote, store.clone()),
            store,
            deriver,
            modal: Mutex::new(Modal::Closed),
            notices,
        }
    }

    /// Load the collection. A failure leaves the session in a visible
    /// `Failed` state and emits an error notice.
    pub async fn start(&self) -> Result<()> {
        match self.sync.load().await {
            Ok(collection) => {
                info!(total = collection.len(), "Session started");
                Ok(())
            }
            Err(e) => {
                self.notify(Notice::error("Error loading students"));
                Err(e)
            }
        }
    }

    pub fn status(&self) -> LoadStatus {
        self.sync.status()
    }

    /// Change the search term (debounced).
    pub fn search(&self, term: impl Into<String>) {
        self.deriver.set_search_term(term);
    }

    /// Apply a pending search term immediately.
    pub fn flush_search(&self) -> bool {
        self.deriver.flush()
    }

    pub fn search_term(&self) -> String {
        self.deriver.search_term()
    }

    pub fn view(&self) -> Arc<View> {
        self.deriver.current()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<Arc<View>> {
        self.deriver.subscribe()
    }

    pub fn records(&self) -> Collection {
        self.store.all()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn modal(&self) -> Modal {
        self.modal.lock().clone()
    }

    pub fn open_add(&self) {
        self.set_modal(Modal::Adding);
    }

    /// Open the edit form for `id`, returning the prefilled draft.
    pub fn open_edit(&self, id: &RecordId) -> Result<Draft> {
        let record = self.lookup(id)?;
        let draft = Draft::from_record(&record);
        self.set_modal(Modal::Editing(record));
        Ok(draft)
    }

    /// Open the details view for `id`.
    pub fn open_details(&self, id: &RecordId) -> Result<Record> {
        let record = self.lookup(id)?;
        self.set_modal(Modal::Viewing(record.clone()));
        Ok(record)
    }

    pub fn close(&self) {
        self.set_modal(Modal::Closed);
    }

    /// Submit the open form: create while adding, update while editing.
    ///
    /// The form closes only on success.
    pub async fn submit(&self, draft: &Draft) -> Result<Record> {
        let modal = self.modal();
        let (op, outcome) = match &modal {
            Modal::Adding => (SyncOp::Create, self.sync.create(draft).await),
            Modal::Editing(record) => (
                SyncOp::Update,
                self.sync.update_remote(&record.id, draft).await,
            ),
            Modal::Closed | Modal::Viewing(_) => {
                return Err(RosterError::Validation(
                    "No student form is open".to_string(),
                ))
            }
        };

        match outcome {
            Ok(record) => {
                self.close_if(&modal);
                self.notify(Notice::success(op.success_message()));
                Ok(record)
            }
            Err(e) => {
                self.notify(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Delete `id`, closing any dialog showing it on success.
    pub async fn delete(&self, id: &RecordId) -> Result<()> {
        match self.sync.delete_remote(id).await {
            Ok(()) => {
                {
                    let mut modal = self.modal.lock();
                    if matches!(&*modal, Modal::Editing(r) | Modal::Viewing(r) if &r.id == id) {
                        *modal = Modal::Closed;
                    }
                }
                self.notify(Notice::success(SyncOp::Delete.success_message()));
                Ok(())
            }
            Err(e) => {
                self.notify(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// End the session: cancel pending derivation, drop local state.
    pub fn teardown(&self) {
        self.deriver.cancel_pending();
        self.store.clear();
        self.set_modal(Modal::Closed);
        debug!("Session torn down");
    }

    pub fn sync_stats(&self) -> SyncStats {
        self.sync.stats()
    }

    pub fn derive_stats(&self) -> DeriveStats {
        self.deriver.stats()
    }

    fn lookup(&self, id: &RecordId) -> Result<Record> {
        self.store
            .get(id)
            .ok_or_else(|| RosterError::NotFound(id.clone()))
    }

    fn set_modal(&self, next: Modal) {
        *self.modal.lock() = next;
    }

    /// Close the dialog unless the user already moved on from `submitted`.
    fn close_if(&self, submitted: &Modal) {
        let mut modal = self.modal.lock();
        if &*modal == submitted {
            *modal = Modal::Closed;
        }
    }

    fn notify(&self, notice: Notice) {
        debug!(level = ?notice.level, message = %notice.message, "Notice");
        // No subscribers is fine
        let _ = self.notices.send(notice);
    }
}
