//! Integration tests for the Roster session flow.

use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

use roster_core::{
    LoadStatus, Modal, NoticeLevel, OpState, OpTarget, RecordStore, RemoteSync, RosterConfig,
    RosterError, Session, UNASSIGNED,
};
use roster_remote::{
    Draft, EndpointKind, Fault, JsonFileRemote, MemoryRemote, Record, RecordId, RemoteStore,
};

fn student(id: i64, name: &str, phone: &str, course: &str) -> Record {
    Record {
        id: RecordId::Number(id),
        name: name.to_string(),
        email: format!("{}@x.com", name.to_lowercase()),
        phone: Some(phone.to_string()),
        course: Some(course.to_string()),
        created_at: None,
    }
}

fn seeded(records: Vec<Record>) -> Arc<MemoryRemote> {
    let remote = Arc::new(MemoryRemote::new());
    remote.seed(records);
    remote
}

/// Loading a single record yields one course group
#[tokio::test]
async fn test_load_groups_by_course() {
    let remote = seeded(vec![student(1, "Ann", "555", "CS")]);
    let session = Session::new(remote, &RosterConfig::default());

    session.start().await.unwrap();

    let view = session.view();
    assert_eq!(view.keys(), vec!["CS"]);
    assert_eq!(view.group("CS").unwrap().records[0].name, "Ann");
    assert_eq!(session.status(), LoadStatus::Ready);
}

/// Records without a course land in the Unassigned group, after named groups
#[tokio::test]
async fn test_missing_course_is_unassigned() {
    let remote = seeded(vec![
        student(1, "Ann", "555", "CS"),
        student(2, "Bo", "777", ""),
    ]);
    let session = Session::new(remote, &RosterConfig::default());
    session.start().await.unwrap();

    let view = session.view();
    assert_eq!(view.keys(), vec!["CS", UNASSIGNED]);
    assert_eq!(view.group(UNASSIGNED).unwrap().records[0].name, "Bo");
    assert_eq!(view.total(), 2);
}

/// A phone substring matches regardless of name or course
#[tokio::test(start_paused = true)]
async fn test_search_matches_phone() {
    let remote = seeded(vec![
        student(1, "Ann", "555-0101", "CS"),
        student(2, "Bo", "777-0102", "Math"),
    ]);
    let session = Session::new(remote, &RosterConfig::default());
    session.start().await.unwrap();

    session.search("555");
    tokio::time::sleep(Duration::from_millis(350)).await;

    let view = session.view();
    assert_eq!(view.matched_count(), 1);
    assert_eq!(view.keys(), vec!["CS"]);
    assert_eq!(view.total(), 2);
}

/// A failed delete leaves the collection unchanged and notifies the caller
#[tokio::test]
async fn test_failed_delete_keeps_collection() {
    let remote = seeded(vec![student(1, "Ann", "555", "CS")]);
    let session = Session::new(remote.clone(), &RosterConfig::default());
    session.start().await.unwrap();
    let before = session.records();
    let mut notices = session.subscribe_notices();

    remote.fail_next(EndpointKind::Delete, Fault::Unavailable(None));
    let err = session.delete(&RecordId::Number(1)).await.unwrap_err();

    assert_eq!(err, RosterError::Transport("Error deleting student".to_string()));
    assert_eq!(session.records(), before);
    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, "Error deleting student");
}

/// Three quick term changes recompute once, with the last term
#[tokio::test(start_paused = true)]
async fn test_rapid_search_recomputes_once() {
    let remote = seeded(vec![
        student(1, "Ann", "555", "CS"),
        student(2, "Bo", "777", "Math"),
    ]);
    let session = Session::new(remote, &RosterConfig::default());
    session.start().await.unwrap();
    let base = session.derive_stats().recomputations;

    session.search("a");
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.search("m");
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.search("math");

    tokio::time::sleep(Duration::from_millis(299)).await;
    assert_eq!(session.derive_stats().recomputations, base);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(session.derive_stats().recomputations, base + 1);
    assert_eq!(session.view().term(), "math");
    assert_eq!(session.view().keys(), vec!["Math"]);
}

/// A committed mutation is visible without waiting for the debounce window
#[tokio::test(start_paused = true)]
async fn test_mutation_recomputes_immediately() {
    let remote = seeded(vec![student(1, "Ann", "555", "CS")]);
    let session = Session::new(remote, &RosterConfig::default());
    session.start().await.unwrap();
    let mut views = session.subscribe_view();
    views.borrow_and_update();

    session.open_add();
    session
        .submit(&Draft::new("Bo", "bo@x.com", "777", "Math"))
        .await
        .unwrap();

    assert!(views.has_changed().unwrap());
    assert_eq!(views.borrow_and_update().keys(), vec!["CS", "Math"]);
}

/// A second update for the same id is rejected while the first is pending
#[tokio::test(start_paused = true)]
async fn test_same_id_update_is_serialized() {
    let remote = Arc::new(MemoryRemote::new().with_latency(Duration::from_millis(100)));
    remote.seed(vec![student(1, "Ann", "555", "CS")]);
    let store = Arc::new(RecordStore::new());
    let sync = Arc::new(RemoteSync::new(remote.clone(), store.clone()));
    sync.load().await.unwrap();

    let id = RecordId::Number(1);
    let first = {
        let sync = sync.clone();
        let id = id.clone();
        tokio::spawn(async move {
            sync.update_remote(&id, &Draft::new("Ann", "a@x.com", "555", "Math"))
                .await
        })
    };
    tokio::task::yield_now().await;
    assert_eq!(sync.op_state(&OpTarget::Record(id.clone())), OpState::Pending);

    let second = sync
        .update_remote(&id, &Draft::new("Ann", "a@x.com", "555", "Art"))
        .await;
    assert_eq!(second, Err(RosterError::Busy(OpTarget::Record(id.clone()))));

    first.await.unwrap().unwrap();
    assert_eq!(remote.calls(EndpointKind::Update), 1);
    assert_eq!(store.get(&id).unwrap().course.as_deref(), Some("Math"));
    assert_eq!(sync.op_state(&OpTarget::Record(id)), OpState::Committed);
}

/// A failed load is a visible error state, not an empty successful view
#[tokio::test]
async fn test_failed_load_is_visible() {
    let remote = seeded(vec![student(1, "Ann", "555", "CS")]);
    remote.fail_next(EndpointKind::List, Fault::Unavailable(None));
    let session = Session::new(remote, &RosterConfig::default());

    assert!(session.start().await.is_err());
    assert!(matches!(session.status(), LoadStatus::Failed(_)));
    assert!(session.view().is_empty());
}

/// Mutations before the session has started loading are rejected
#[tokio::test]
async fn test_submit_before_start_is_rejected() {
    let remote = Arc::new(MemoryRemote::new());
    let session = Session::new(remote.clone(), &RosterConfig::default());

    session.open_add();
    let err = session
        .submit(&Draft::new("Bo", "bo@x.com", "777", "Math"))
        .await
        .unwrap_err();
    assert_eq!(err, RosterError::NotLoaded);
    assert_eq!(remote.calls(EndpointKind::Create), 0);
}

/// Modal transitions follow the intents
#[tokio::test]
async fn test_modal_transitions() {
    let remote = seeded(vec![student(1, "Ann", "555", "CS")]);
    let session = Session::new(remote, &RosterConfig::default());
    session.start().await.unwrap();
    let id = RecordId::Number(1);

    assert_eq!(session.modal(), Modal::Closed);
    session.open_add();
    assert_eq!(session.modal(), Modal::Adding);

    session.open_details(&id).unwrap();
    assert!(matches!(session.modal(), Modal::Viewing(ref r) if r.id == id));

    session.open_edit(&id).unwrap();
    assert!(matches!(session.modal(), Modal::Editing(ref r) if r.id == id));

    session.close();
    assert_eq!(session.modal(), Modal::Closed);
}

/// An incomplete draft is rejected locally and keeps the form open
#[tokio::test]
async fn test_incomplete_draft_keeps_form_open() {
    let remote = Arc::new(MemoryRemote::new());
    let session = Session::new(remote.clone(), &RosterConfig::default());
    session.start().await.unwrap();

    session.open_add();
    let err = session
        .submit(&Draft::new("Bo", "", "777", ""))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RosterError::Validation("Missing required fields: email, course".to_string())
    );
    assert_eq!(session.modal(), Modal::Adding);
    assert_eq!(remote.calls(EndpointKind::Create), 0);
}

/// Sessions over the file-backed service persist across restarts
#[tokio::test]
async fn test_file_backed_session_persists() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("students.json");

    {
        let remote: Arc<dyn RemoteStore> = Arc::new(JsonFileRemote::new(&path));
        let session = Session::new(remote, &RosterConfig::default());
        session.start().await.unwrap();
        session.open_add();
        session
            .submit(&Draft::new("Ann", "a@x.com", "555", "CS"))
            .await
            .unwrap();
        session.teardown();
    }

    let remote: Arc<dyn RemoteStore> = Arc::new(JsonFileRemote::new(&path));
    let session = Session::new(remote, &RosterConfig::default());
    session.start().await.unwrap();
    assert_eq!(session.view().keys(), vec!["CS"]);
    assert!(session.records()[0].created_at.is_some());
}

/// Teardown cancels a pending search and drops local state
#[tokio::test(start_paused = true)]
async fn test_teardown_cancels_pending_search() {
    let remote = seeded(vec![student(1, "Ann", "555", "CS")]);
    let session = Session::new(remote, &RosterConfig::default());
    session.start().await.unwrap();

    session.search("zzz");
    session.teardown();
    let settled = session.derive_stats().recomputations;
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(session.derive_stats().recomputations, settled);
    assert!(session.records().is_empty());
    assert_eq!(session.view().term(), "zzz");
}
