//! Canonical in-memory record collection.
//!
//! A [`Collection`] is an immutable snapshot. [`RecordStore`] swaps in a new
//! snapshot per mutation, so readers never observe a partial update.

use crate::error::{Result, RosterError};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use roster_remote::{Draft, Record, RecordId};
use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

/// Ordered, immutable sequence of records with unique ids.
///
/// Insertion order is the canonical order. Cloning is cheap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collection {
    records: Arc<Vec<Record>>,
}

impl Collection {
    /// Build a collection, rejecting duplicate ids and records without a
    /// name or email.
    pub fn new(records: Vec<Record>) -> Result<Self> {
        {
            let mut seen = HashSet::with_capacity(records.len());
            for record in &records {
                if !seen.insert(&record.id) {
                    return Err(RosterError::DuplicateId(record.id.clone()));
                }
                validate_committed(record)?;
            }
        }
        Ok(Self {
            records: Arc::new(records),
        })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.get(id).is_some()
    }

    fn position(&self, id: &RecordId) -> Result<usize> {
        self.records
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| RosterError::NotFound(id.clone()))
    }

    /// New collection with `record` appended.
    pub fn with_added(&self, record: Record) -> Result<Self> {
        if self.contains(&record.id) {
            return Err(RosterError::DuplicateId(record.id));
        }
        validate_committed(&record)?;

        let mut records = Vec::with_capacity(self.records.len() + 1);
        records.extend(self.records.iter().cloned());
        records.push(record);
        Ok(Self {
            records: Arc::new(records),
        })
    }

    /// New collection with `patch` merged onto the record matching `id`.
    pub fn with_updated(&self, id: &RecordId, patch: &RecordPatch) -> Result<Self> {
        let index = self.position(id)?;
        let merged = patch.apply(&self.records[index]);
        validate_committed(&merged)?;

        let mut records = self.records.as_ref().clone();
        records[index] = merged;
        Ok(Self {
            records: Arc::new(records),
        })
    }

    /// New collection with the record matching `id` replaced wholesale, in
    /// place. The replacement must carry the same id.
    pub fn with_replaced(&self, id: &RecordId, record: Record) -> Result<Self> {
        let index = self.position(id)?;
        if &record.id != id {
            return Err(RosterError::Validation(format!(
                "Replacement for student {} carries id {}",
                id, record.id
            )));
        }
        validate_committed(&record)?;

        let mut records = self.records.as_ref().clone();
        records[index] = record;
        Ok(Self {
            records: Arc::new(records),
        })
    }

    /// New collection without the record matching `id`.
    pub fn without(&self, id: &RecordId) -> Result<Self> {
        let index = self.position(id)?;
        let mut records = self.records.as_ref().clone();
        records.remove(index);
        Ok(Self {
            records: Arc::new(records),
        })
    }
}

impl Deref for Collection {
    type Target = [Record];

    fn deref(&self) -> &[Record] {
        &self.records
    }
}

/// Committed records always carry a name and an email.
fn validate_committed(record: &Record) -> Result<()> {
    if record.name.trim().is_empty() {
        return Err(RosterError::Validation("Name is required".to_string()));
    }
    if record.email.trim().is_empty() {
        return Err(RosterError::Validation("Email is required".to_string()));
    }
    Ok(())
}

/// Partial record update. Present fields replace the current values; the id
/// is never changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub course: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl RecordPatch {
    pub fn apply(&self, current: &Record) -> Record {
        let mut updated = current.clone();
        if let Some(name) = &self.name {
            updated.name = name.clone();
        }
        if let Some(email) = &self.email {
            updated.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            updated.phone = Some(phone.clone());
        }
        if let Some(course) = &self.course {
            updated.course = Some(course.clone());
        }
        if let Some(created_at) = self.created_at {
            updated.created_at = Some(created_at);
        }
        updated
    }
}

impl From<&Draft> for RecordPatch {
    fn from(draft: &Draft) -> Self {
        Self {
            name: Some(draft.name.clone()),
            email: Some(draft.email.clone()),
            phone: Some(draft.phone.clone()),
            course: Some(draft.course.clone()),
            created_at: None,
        }
    }
}

/// Receives every new snapshot, synchronously and in mutation order.
///
/// Observers run while the store's write lock is held and must not call
/// back into the store.
pub trait SnapshotObserver: Send + Sync {
    fn snapshot_changed(&self, collection: &Collection);
}

/// Owner of the current collection snapshot.
#[derive(Default)]
pub struct RecordStore {
    snapshot: RwLock<Collection>,
    observers: RwLock<Vec<Arc<dyn SnapshotObserver>>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for subsequent snapshots.
    pub fn observe(&self, observer: Arc<dyn SnapshotObserver>) {
        self.observers.write().push(observer);
    }

    /// Current snapshot.
    pub fn all(&self) -> Collection {
        self.snapshot.read().clone()
    }

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.snapshot.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.read().is_empty()
    }

    /// Append a record; fails with `DuplicateId` if its id is present.
    pub fn add(&self, record: Record) -> Result<Collection> {
        let id = record.id.clone();
        let next = self.commit(|current| current.with_added(record))?;
        debug!(id = %id, total = next.len(), "Record added");
        Ok(next)
    }

    /// Merge `patch` onto the record matching `id`.
    pub fn update(&self, id: &RecordId, patch: &RecordPatch) -> Result<Collection> {
        let next = self.commit(|current| current.with_updated(id, patch))?;
        debug!(id = %id, "Record updated");
        Ok(next)
    }

    /// Replace the record matching `id` with `record`, keeping its position.
    pub fn replace(&self, id: &RecordId, record: Record) -> Result<Collection> {
        let next = self.commit(|current| current.with_replaced(id, record))?;
        debug!(id = %id, "Record replaced");
        Ok(next)
    }

    /// Remove the record matching `id`.
    pub fn remove(&self, id: &RecordId) -> Result<Collection> {
        let next = self.commit(|current| current.without(id))?;
        debug!(id = %id, total = next.len(), "Record removed");
        Ok(next)
    }

    /// Replace the whole collection.
    pub fn replace_all(&self, records: Vec<Record>) -> Result<Collection> {
        let next = self.commit(|_| Collection::new(records))?;
        debug!(total = next.len(), "Collection replaced");
        Ok(next)
    }

    /// Drop every record.
    pub fn clear(&self) -> Collection {
        self.commit(|_| Ok(Collection::default()))
            .unwrap_or_default()
    }

    fn commit<F>(&self, mutate: F) -> Result<Collection>
    where
        F: FnOnce(&Collection) -> Result<Collection>,
    {
        let mut snapshot = self.snapshot.write();
        let next = mutate(&snapshot)?;
        *snapshot = next.clone();

        for observer in self.observers.read().iter() {
            observer.snapshot_changed(&next);
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn record(id: i64, name: &str, course: Option<&str>) -> Record {
        Record {
            id: RecordId::Number(id),
            name: name.to_string(),
            email: format!("{}@x.com", name.to_lowercase()),
            phone: Some("555".to_string()),
            course: course.map(str::to_string),
            created_at: None,
        }
    }

    #[derive(Default)]
    struct Recorder {
        sizes: Mutex<Vec<usize>>,
    }

    impl SnapshotObserver for Recorder {
        fn snapshot_changed(&self, collection: &Collection) {
            self.sizes.lock().push(collection.len());
        }
    }

    #[test]
    fn test_add_appends_in_order() {
        let store = RecordStore::new();
        store.add(record(1, "Ann", Some("CS"))).unwrap();
        let snapshot = store.add(record(2, "Bo", None)).unwrap();

        let names: Vec<_> = snapshot.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Bo"]);
        assert_eq!(store.all(), snapshot);
    }

    #[test]
    fn test_add_duplicate_leaves_collection_unchanged() {
        let store = RecordStore::new();
        store.add(record(1, "Ann", Some("CS"))).unwrap();
        let before = store.all();

        let err = store.add(record(1, "Other", None)).unwrap_err();
        assert_eq!(err, RosterError::DuplicateId(RecordId::Number(1)));
        assert_eq!(store.all(), before);
    }

    #[test]
    fn test_add_rejects_blank_name() {
        let store = RecordStore::new();
        let mut blank = record(1, "Ann", None);
        blank.name = "  ".to_string();
        assert!(matches!(
            store.add(blank),
            Err(RosterError::Validation(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_then_remove_round_trip() {
        let store = RecordStore::new();
        store.add(record(1, "Ann", Some("CS"))).unwrap();
        store.add(record(2, "Bo", None)).unwrap();
        let before = store.all();

        store.add(record(3, "Cy", Some("Math"))).unwrap();
        let after = store.remove(&RecordId::Number(3)).unwrap();
        assert_eq!(after, before);
    }

    #[test]
    fn test_update_merges_patch_and_keeps_position() {
        let store = RecordStore::new();
        store.add(record(1, "Ann", Some("CS"))).unwrap();
        store.add(record(2, "Bo", None)).unwrap();

        let patch = RecordPatch {
            course: Some("Math".to_string()),
            ..Default::default()
        };
        let snapshot = store.update(&RecordId::Number(1), &patch).unwrap();
        assert_eq!(snapshot[0].name, "Ann");
        assert_eq!(snapshot[0].course(), Some("Math"));
        assert_eq!(snapshot[0].phone(), Some("555"));
    }

    #[test]
    fn test_update_rejects_blank_email() {
        let store = RecordStore::new();
        store.add(record(1, "Ann", Some("CS"))).unwrap();
        let before = store.all();

        let patch = RecordPatch {
            email: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            store.update(&RecordId::Number(1), &patch),
            Err(RosterError::Validation(_))
        ));
        assert_eq!(store.all(), before);
    }

    #[test]
    fn test_update_and_remove_missing_id() {
        let store = RecordStore::new();
        let id = RecordId::Number(9);
        assert_eq!(
            store.update(&id, &RecordPatch::default()).unwrap_err(),
            RosterError::NotFound(id.clone())
        );
        assert_eq!(store.remove(&id).unwrap_err(), RosterError::NotFound(id));
    }

    #[test]
    fn test_snapshots_are_not_mutated_in_place() {
        let store = RecordStore::new();
        store.add(record(1, "Ann", Some("CS"))).unwrap();
        let held = store.all();

        store.remove(&RecordId::Number(1)).unwrap();
        assert_eq!(held.len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_replace_all_rejects_duplicates() {
        let store = RecordStore::new();
        store.add(record(5, "Eve", None)).unwrap();

        let err = store
            .replace_all(vec![record(1, "Ann", None), record(1, "Bo", None)])
            .unwrap_err();
        assert_eq!(err, RosterError::DuplicateId(RecordId::Number(1)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_observers_see_every_snapshot_in_order() {
        let store = RecordStore::new();
        let recorder = Arc::new(Recorder::default());
        store.observe(recorder.clone());

        store.add(record(1, "Ann", None)).unwrap();
        store.add(record(2, "Bo", None)).unwrap();
        let _ = store.add(record(2, "Dup", None));
        store.remove(&RecordId::Number(1)).unwrap();
        store.clear();

        assert_eq!(*recorder.sizes.lock(), vec![1, 2, 1, 0]);
    }

    #[test]
    fn test_replace_takes_every_field_and_keeps_position() {
        let store = RecordStore::new();
        store.add(record(1, "Ann", Some("CS"))).unwrap();
        store.add(record(2, "Bo", None)).unwrap();

        let mut confirmed = record(1, "Ann B", None);
        confirmed.phone = None;
        confirmed.created_at = Some(Utc::now());
        let snapshot = store.replace(&RecordId::Number(1), confirmed.clone()).unwrap();

        assert_eq!(snapshot[0], confirmed);
        assert_eq!(snapshot[0].course, None);
        assert_eq!(snapshot[0].phone, None);
        assert_eq!(snapshot[1].name, "Bo");
    }

    #[test]
    fn test_replace_rejects_changed_id() {
        let store = RecordStore::new();
        store.add(record(1, "Ann", Some("CS"))).unwrap();
        let before = store.all();

        assert!(matches!(
            store.replace(&RecordId::Number(1), record(7, "Ann", Some("CS"))),
            Err(RosterError::Validation(_))
        ));
        assert_eq!(
            store.replace(&RecordId::Number(3), record(3, "Cy", None)),
            Err(RosterError::NotFound(RecordId::Number(3)))
        );
        assert_eq!(store.all(), before);
    }

    #[test]
    fn test_replace_all_rejects_blank_email() {
        let store = RecordStore::new();
        store.add(record(5, "Eve", None)).unwrap();
        let before = store.all();

        let mut blank = record(1, "Ann", None);
        blank.email = " ".to_string();
        assert_eq!(
            store.replace_all(vec![blank, record(2, "Bo", None)]),
            Err(RosterError::Validation("Email is required".to_string()))
        );
        assert_eq!(store.all(), before);
    }
}
