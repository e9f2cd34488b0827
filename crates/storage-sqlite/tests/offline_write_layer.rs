//! Behavior tests for the offline write layer: every mutation must land in
//! the local store and the sync queue atomically.

use diesel::prelude::*;
use tempfile::TempDir;

use quillpad_core::notes::{NewNote, NoteUpdate};
use quillpad_core::sync::{QueueOp, QueuePayload, SyncStatus};
use quillpad_core::tags::NewTag;
use quillpad_core::{DatabaseError, Error};
use quillpad_storage_sqlite::notes::NoteDB;
use quillpad_storage_sqlite::queue::NewSyncQueueEntryDB;
use quillpad_storage_sqlite::{
    enqueue_operation, schema, LinkRepository, LocalStore, NoteRepository, SyncQueueRepository,
    TagRepository,
};

struct Fixture {
    _dir: TempDir,
    store: LocalStore,
    notes: NoteRepository,
    tags: TagRepository,
    links: LinkRepository,
    queue: SyncQueueRepository,
}

fn open_store() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalStore::open(dir.path(), "tester").expect("open store");
    let notes = NoteRepository::new(store.pool(), store.writer());
    let tags = TagRepository::new(store.pool(), store.writer());
    let links = LinkRepository::new(store.pool(), store.writer());
    let queue = SyncQueueRepository::new(store.pool(), store.writer());
    Fixture {
        _dir: dir,
        store,
        notes,
        tags,
        links,
        queue,
    }
}

fn new_note(title: &str, content: &str) -> NewNote {
    NewNote {
        title: title.to_string(),
        content: content.to_string(),
        pinned: false,
    }
}

#[tokio::test]
async fn create_note_is_local_and_queued() {
    let fx = open_store();
    let note = fx
        .notes
        .create_note(new_note("First", "hello"))
        .await
        .expect("create");

    assert_eq!(note.sync_status, SyncStatus::Pending);
    assert!(note.last_synced_at.is_none());

    let stored = fx.notes.get_note(&note.id).expect("get").expect("exists");
    assert_eq!(stored.content, "hello");

    let snapshot = fx.queue.list_pending().expect("queue");
    assert_eq!(snapshot.entries.len(), 1);
    let entry = &snapshot.entries[0];
    assert_eq!(entry.op, QueueOp::Create);
    assert_eq!(entry.entity_id, note.id);
    match &entry.payload {
        QueuePayload::NoteCreate(payload) => assert_eq!(payload.content, "hello"),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[tokio::test]
async fn consecutive_updates_compact_to_one_entry() {
    let fx = open_store();
    let note = fx
        .notes
        .create_note(new_note("Draft", "v0"))
        .await
        .expect("create");

    for revision in 1..=4 {
        fx.notes
            .update_note(
                note.id.clone(),
                NoteUpdate {
                    title: None,
                    content: Some(format!("v{revision}")),
                },
            )
            .await
            .expect("update");
    }

    let snapshot = fx.queue.list_pending().expect("queue");
    let updates: Vec<_> = snapshot
        .entries
        .iter()
        .filter(|entry| entry.op == QueueOp::Update)
        .collect();
    assert_eq!(updates.len(), 1, "updates must compact to one entry");
    match &updates[0].payload {
        QueuePayload::NoteUpdate(payload) => assert_eq!(payload.content, "v4"),
        other => panic!("unexpected payload {other:?}"),
    }

    // The original create is never compacted away.
    assert_eq!(snapshot.entries.len(), 2);
    assert_eq!(snapshot.entries[0].op, QueueOp::Create);
}

#[tokio::test]
async fn interrupted_write_rolls_back_entity_and_queue() {
    let fx = open_store();
    let writer = fx.store.writer();

    let result: quillpad_core::Result<()> = writer
        .exec(|conn| {
            let now = chrono::Utc::now().to_rfc3339();
            let row = NoteDB {
                id: "n-interrupted".to_string(),
                title: "t".to_string(),
                content: "c".to_string(),
                pinned: 0,
                deleted_at: None,
                created_at: now.clone(),
                sync_status: "pending".to_string(),
                last_synced_at: None,
                server_updated_at: None,
                local_updated_at: now,
            };
            diesel::insert_into(schema::notes::table)
                .values(&row)
                .execute(conn)
                .map_err(|e| Error::Database(DatabaseError::Query(e.to_string())))?;
            enqueue_operation(conn, &QueuePayload::NoteCreate(row.to_payload()))?;
            Err(Error::Validation(
                "injected failure between write and commit".to_string(),
            ))
        })
        .await;
    assert!(result.is_err());

    // Neither half of the interrupted job may be visible.
    assert!(fx.notes.get_note("n-interrupted").expect("get").is_none());
    assert_eq!(fx.queue.pending_count().expect("count"), 0);
}

#[tokio::test]
async fn update_missing_note_returns_not_found() {
    let fx = open_store();
    let err = fx
        .notes
        .update_note(
            "missing".to_string(),
            NoteUpdate {
                title: Some("x".to_string()),
                content: None,
            },
        )
        .await
        .expect_err("must fail");
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(fx.queue.pending_count().expect("count"), 0);
}

#[tokio::test]
async fn conflicted_note_rejects_ordinary_edits() {
    let fx = open_store();
    let note = fx
        .notes
        .create_note(new_note("Contested", "local"))
        .await
        .expect("create");

    fx.notes
        .mark_note_conflict(9_999, note.id.clone())
        .await
        .expect("mark conflict");

    let err = fx
        .notes
        .update_note(
            note.id.clone(),
            NoteUpdate {
                title: None,
                content: Some("more edits".to_string()),
            },
        )
        .await
        .expect_err("conflicted note must reject edits");
    assert!(matches!(err, Error::UnresolvedConflict(_)));

    let stored = fx.notes.get_note(&note.id).expect("get").expect("exists");
    assert_eq!(stored.sync_status, SyncStatus::Conflict);
    assert_eq!(stored.content, "local");
}

#[tokio::test]
async fn soft_delete_and_restore_round_trip() {
    let fx = open_store();
    let note = fx
        .notes
        .create_note(new_note("Ephemeral", "x"))
        .await
        .expect("create");

    let deleted = fx
        .notes
        .soft_delete_note(note.id.clone())
        .await
        .expect("soft delete");
    assert!(deleted.deleted_at.is_some());
    assert!(fx.notes.list_active_notes().expect("active").is_empty());
    assert_eq!(fx.notes.list_deleted_notes().expect("deleted").len(), 1);

    let restored = fx
        .notes
        .restore_note(note.id.clone())
        .await
        .expect("restore");
    assert!(restored.deleted_at.is_none());

    let ops: Vec<QueueOp> = fx
        .queue
        .list_pending()
        .expect("queue")
        .entries
        .iter()
        .map(|entry| entry.op)
        .collect();
    assert_eq!(
        ops,
        vec![QueueOp::Create, QueueOp::SoftDelete, QueueOp::Restore]
    );
}

#[tokio::test]
async fn permanent_delete_cascades_links() {
    let fx = open_store();
    let note = fx
        .notes
        .create_note(new_note("Tagged", "x"))
        .await
        .expect("create note");
    let tag = fx
        .tags
        .create_tag(NewTag {
            name: "work".to_string(),
            color: Default::default(),
        })
        .await
        .expect("create tag");
    fx.links
        .add_tag_to_note(note.id.clone(), tag.id.clone())
        .await
        .expect("link");

    fx.notes.delete_note(note.id.clone()).await.expect("delete");

    assert!(fx.notes.get_note(&note.id).expect("get").is_none());
    assert!(fx
        .links
        .get_link(&note.id, &tag.id)
        .expect("get link")
        .is_none());
    // The tag itself survives.
    assert!(fx.tags.get_tag(&tag.id).expect("get tag").is_some());
}

#[tokio::test]
async fn tag_delete_cascades_links_and_queues_delete() {
    let fx = open_store();
    let note = fx
        .notes
        .create_note(new_note("Tagged", "x"))
        .await
        .expect("create note");
    let tag = fx
        .tags
        .create_tag(NewTag {
            name: "home".to_string(),
            color: Default::default(),
        })
        .await
        .expect("create tag");
    fx.links
        .add_tag_to_note(note.id.clone(), tag.id.clone())
        .await
        .expect("link");

    fx.tags.delete_tag(tag.id.clone()).await.expect("delete");

    assert!(fx.tags.get_tag(&tag.id).expect("get").is_none());
    assert!(fx
        .links
        .get_link(&note.id, &tag.id)
        .expect("get link")
        .is_none());
    let ops: Vec<QueueOp> = fx
        .queue
        .list_pending()
        .expect("queue")
        .entries
        .iter()
        .map(|entry| entry.op)
        .collect();
    assert!(ops.contains(&QueueOp::Delete));
}

#[tokio::test]
async fn import_creates_one_queue_entry_per_record() {
    let fx = open_store();
    let batch: Vec<NewNote> = (0..5)
        .map(|i| new_note(&format!("Imported {i}"), &format!("body {i}")))
        .collect();

    let imported = fx.notes.import_notes(batch).await.expect("import");
    assert_eq!(imported.len(), 5);

    let snapshot = fx.queue.list_pending().expect("queue");
    assert_eq!(snapshot.entries.len(), 5);
    assert!(snapshot
        .entries
        .iter()
        .all(|entry| entry.op == QueueOp::Create));
}

#[tokio::test]
async fn malformed_queue_payload_is_reported_not_fatal() {
    let fx = open_store();
    fx.notes
        .create_note(new_note("Fine", "ok"))
        .await
        .expect("create");

    fx.store
        .writer()
        .exec(|conn| {
            let row = NewSyncQueueEntryDB {
                op_id: "corrupt-op".to_string(),
                entity: "note".to_string(),
                entity_id: "n-x".to_string(),
                op: "update".to_string(),
                payload: "{not valid json".to_string(),
                enqueued_at: chrono::Utc::now().to_rfc3339(),
                retry_count: 0,
            };
            diesel::insert_into(schema::sync_queue::table)
                .values(&row)
                .execute(conn)
                .map_err(|e| Error::Database(DatabaseError::Query(e.to_string())))?;
            Ok(())
        })
        .await
        .expect("seed corrupt row");

    let snapshot = fx.queue.list_pending().expect("queue");
    assert_eq!(snapshot.entries.len(), 1, "good entry still listed");
    assert_eq!(snapshot.corrupt.len(), 1);
}
