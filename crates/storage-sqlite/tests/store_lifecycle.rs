//! Per-user store lifecycle: isolation between users and destruction on
//! logout.

use quillpad_core::notes::NewNote;
use quillpad_storage_sqlite::{LocalStore, NoteRepository};

fn new_note(title: &str) -> NewNote {
    NewNote {
        title: title.to_string(),
        content: "body".to_string(),
        pinned: false,
    }
}

#[tokio::test]
async fn stores_are_scoped_per_user() {
    let dir = tempfile::tempdir().expect("tempdir");

    let store_a = LocalStore::open(dir.path(), "alice").expect("open a");
    let notes_a = NoteRepository::new(store_a.pool(), store_a.writer());
    notes_a.create_note(new_note("private")).await.expect("create");

    let store_b = LocalStore::open(dir.path(), "bob").expect("open b");
    let notes_b = NoteRepository::new(store_b.pool(), store_b.writer());

    assert_ne!(store_a.db_path(), store_b.db_path());
    assert_eq!(notes_a.list_active_notes().expect("a notes").len(), 1);
    assert!(notes_b.list_active_notes().expect("b notes").is_empty());
}

#[tokio::test]
async fn destroy_removes_database_files() {
    let dir = tempfile::tempdir().expect("tempdir");

    let store = LocalStore::open(dir.path(), "alice").expect("open");
    let notes = NoteRepository::new(store.pool(), store.writer());
    notes.create_note(new_note("secret")).await.expect("create");

    let db_path = store.db_path().to_path_buf();
    assert!(db_path.exists());

    drop(notes);
    store.destroy().expect("destroy");

    assert!(!db_path.exists(), "database file must be deleted");
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with("quillpad-alice")
        })
        .collect();
    assert!(leftovers.is_empty(), "no WAL/SHM residue may remain");
}

#[tokio::test]
async fn reopening_preserves_data_across_restarts() {
    let dir = tempfile::tempdir().expect("tempdir");

    {
        let store = LocalStore::open(dir.path(), "alice").expect("open");
        let notes = NoteRepository::new(store.pool(), store.writer());
        notes.create_note(new_note("durable")).await.expect("create");
    }

    let store = LocalStore::open(dir.path(), "alice").expect("reopen");
    let notes = NoteRepository::new(store.pool(), store.writer());
    let listed = notes.list_active_notes().expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "durable");
}
