//! Queue drain failure handling and dependency ordering.

use std::sync::Arc;
use std::time::Duration;

use quillpad_core::notes::NewNote;
use quillpad_core::sync::{SyncCycleTrigger, SyncStatus};
use quillpad_core::tags::NewTag;
use quillpad_remote::{InMemoryRemoteStore, RemoteStore, RemoteStoreError};
use quillpad_sync_engine::{Session, SyncEngineOptions};

fn test_options() -> SyncEngineOptions {
    SyncEngineOptions {
        echo_grace: Duration::from_millis(40),
        retry_ceiling: 5,
    }
}

fn open_session(remote: &Arc<InMemoryRemoteStore>) -> (tempfile::TempDir, Session) {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = Session::login_with_options(
        dir.path(),
        "tester",
        Arc::clone(remote) as Arc<dyn RemoteStore>,
        test_options(),
    )
    .expect("login");
    (dir, session)
}

fn new_note(title: &str) -> NewNote {
    NewNote {
        title: title.to_string(),
        content: "body".to_string(),
        pinned: false,
    }
}

#[tokio::test]
async fn entry_is_dropped_after_retry_ceiling_never_a_sixth_attempt() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let (_dir, session) = open_session(&remote);
    let engine = session.engine();
    let _ = engine.set_online(true).await;

    session.notes().create_note(new_note("Doomed")).await.expect("create");
    remote.fail_next_calls(5, 500);

    for attempt in 1..=4 {
        let summary = engine.sync(SyncCycleTrigger::Manual).await;
        assert_eq!(summary.failed, 0, "attempt {attempt} must keep the entry");
        assert_eq!(session.queue().pending_count().expect("count"), 1);
    }

    let summary = engine.sync(SyncCycleTrigger::Manual).await;
    assert_eq!(summary.failed, 1, "fifth failure drops the entry");
    assert!(!summary.errors.is_empty());
    assert_eq!(session.queue().pending_count().expect("count"), 0);

    // A sixth cycle has nothing left to retry.
    let summary = engine.sync(SyncCycleTrigger::Manual).await;
    assert_eq!(summary.pushed, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(remote.insert_note_calls(), 0);
}

#[tokio::test]
async fn nonretryable_failure_drops_entry_immediately() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let (_dir, session) = open_session(&remote);
    let engine = session.engine();
    let _ = engine.set_online(true).await;

    let note = session.notes().create_note(new_note("Rejected")).await.expect("create");
    remote.fail_next_with(RemoteStoreError::api(422, "validation failed"));

    let summary = engine.sync(SyncCycleTrigger::Manual).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(session.queue().pending_count().expect("count"), 0);

    // The local row stays pending: a visible discrepancy, not silent loss.
    let local = session
        .notes()
        .get_note(&note.id)
        .expect("get")
        .expect("exists");
    assert_eq!(local.sync_status, SyncStatus::Pending);
}

#[tokio::test]
async fn creates_drain_before_links() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let (_dir, session) = open_session(&remote);
    let engine = session.engine();

    // All offline: the link is enqueued after its endpoints but in the
    // same batch. The in-memory remote enforces FK order, so the cycle
    // only succeeds when creates drain first.
    let tag = session
        .tags()
        .create_tag(NewTag {
            name: "project".to_string(),
            color: Default::default(),
        })
        .await
        .expect("create tag");
    let note = session.notes().create_note(new_note("Linked")).await.expect("create note");
    session
        .links()
        .add_tag_to_note(note.id.clone(), tag.id.clone())
        .await
        .expect("link");

    let summary = engine.set_online(true).await.expect("cycle");
    assert_eq!(summary.pushed, 3);
    assert_eq!(summary.failed, 0);
    assert!(remote.has_link(&note.id, &tag.id));

    let link = session
        .links()
        .get_link(&note.id, &tag.id)
        .expect("get")
        .expect("exists");
    assert_eq!(link.sync_status, SyncStatus::Synced);
    assert_eq!(session.queue().pending_count().expect("count"), 0);
}

#[tokio::test]
async fn one_bad_entry_does_not_abort_the_rest() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let (_dir, session) = open_session(&remote);
    let engine = session.engine();
    let _ = engine.set_online(true).await;

    session.notes().create_note(new_note("One")).await.expect("create");
    session.notes().create_note(new_note("Two")).await.expect("create");

    // First entry's existence check rejects permanently; the second entry
    // must still go through in the same cycle.
    remote.fail_next_with(RemoteStoreError::api(400, "bad request"));

    let summary = engine.sync(SyncCycleTrigger::Manual).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.pushed, 1);
    assert_eq!(remote.note_count(), 1);
    assert_eq!(session.queue().pending_count().expect("count"), 0);
}
