//! Echo suppression around the realtime feed and the push grace window.

use std::sync::Arc;
use std::time::Duration;

use quillpad_core::notes::NewNote;
use quillpad_core::sync::{RemoteNote, SyncStatus};
use quillpad_remote::{InMemoryRemoteStore, RemoteStore};
use quillpad_sync_engine::{RealtimeChange, RealtimeEvent, Session, SyncEngineOptions};

fn open_session_with_grace(
    remote: &Arc<InMemoryRemoteStore>,
    echo_grace: Duration,
) -> (tempfile::TempDir, Session) {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = Session::login_with_options(
        dir.path(),
        "tester",
        Arc::clone(remote) as Arc<dyn RemoteStore>,
        SyncEngineOptions {
            echo_grace,
            retry_ceiling: 5,
        },
    )
    .expect("login");
    (dir, session)
}

fn remote_note(id: &str, content: &str) -> RemoteNote {
    let stamp = "2026-06-01T00:00:00+00:00";
    RemoteNote {
        id: id.to_string(),
        title: "From feed".to_string(),
        content: content.to_string(),
        pinned: false,
        deleted_at: None,
        created_at: stamp.to_string(),
        updated_at: stamp.to_string(),
    }
}

#[tokio::test]
async fn marked_token_suppresses_realtime_event() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let (_dir, session) = open_session_with_grace(&remote, Duration::from_millis(40));
    let engine = session.engine();
    let echo = engine.echo_suppressor();

    echo.mark_pending("tok-1");
    assert!(echo.is_pending("tok-1"));

    let event = RealtimeEvent {
        token: Some("tok-1".to_string()),
        change: RealtimeChange::NoteUpserted {
            note: remote_note("n-echo", "our own write"),
        },
    };
    let applied = engine.handle_realtime(event.clone()).await.expect("handle");
    assert!(!applied, "a pending token is this device's own echo");
    assert!(session.notes().get_note("n-echo").expect("get").is_none());

    // After the window closes the same event applies normally.
    echo.clear_pending("tok-1");
    assert!(!echo.is_pending("tok-1"));
    let applied = engine.handle_realtime(event).await.expect("handle");
    assert!(applied);
    let local = session
        .notes()
        .get_note("n-echo")
        .expect("get")
        .expect("exists");
    assert_eq!(local.sync_status, SyncStatus::Synced);
    assert_eq!(local.content, "our own write");
}

#[tokio::test]
async fn push_tokens_stay_pending_through_the_grace_window() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let (_dir, session) = open_session_with_grace(&remote, Duration::from_millis(250));
    let engine = session.engine();

    session
        .notes()
        .create_note(NewNote {
            title: "Graceful".to_string(),
            content: "x".to_string(),
            pinned: false,
        })
        .await
        .expect("create");
    let op_id = session.queue().list_pending().expect("queue").entries[0]
        .op_id
        .clone();

    engine.set_online(true).await.expect("cycle");

    let echo = engine.echo_suppressor();
    assert!(
        echo.is_pending(&op_id),
        "token must survive the write itself"
    );

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(!echo.is_pending(&op_id), "token must release after grace");
}

#[tokio::test]
async fn realtime_delete_skips_note_with_local_intent() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let (_dir, session) = open_session_with_grace(&remote, Duration::from_millis(40));
    let engine = session.engine();

    let note = session
        .notes()
        .create_note(NewNote {
            title: "Pending".to_string(),
            content: "unsent".to_string(),
            pinned: false,
        })
        .await
        .expect("create");

    let applied = engine
        .handle_realtime(RealtimeEvent {
            token: None,
            change: RealtimeChange::NoteDeleted {
                note_id: note.id.clone(),
            },
        })
        .await
        .expect("handle");

    assert!(!applied, "pending local intent must not be deleted");
    assert!(session.notes().get_note(&note.id).expect("get").is_some());
}

#[tokio::test]
async fn realtime_note_delete_applies_to_synced_rows() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let (_dir, session) = open_session_with_grace(&remote, Duration::from_millis(40));
    let engine = session.engine();

    let note = session
        .notes()
        .create_note(NewNote {
            title: "Synced".to_string(),
            content: "x".to_string(),
            pinned: false,
        })
        .await
        .expect("create");
    engine.set_online(true).await.expect("cycle");

    let applied = engine
        .handle_realtime(RealtimeEvent {
            token: None,
            change: RealtimeChange::NoteDeleted {
                note_id: note.id.clone(),
            },
        })
        .await
        .expect("handle");

    assert!(applied);
    assert!(session.notes().get_note(&note.id).expect("get").is_none());
}
