//! In-memory remote store used by tests.
//!
//! Behaves like the row API: server-assigned `updated_at` from a
//! monotonic server clock, owner-scoped semantics collapsed to a single
//! owner. Test hooks allow seeding rows "from another device", injecting
//! failures, and counting calls.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use quillpad_core::sync::{NoteChanges, NotePayload, RemoteNote, RemoteTag, TagChanges, TagPayload};

use crate::error::{RemoteStoreError, Result};
use crate::store::RemoteStore;

#[derive(Default)]
pub struct InMemoryRemoteStore {
    notes: Mutex<BTreeMap<String, RemoteNote>>,
    tags: Mutex<BTreeMap<String, RemoteTag>>,
    links: Mutex<BTreeSet<(String, String)>>,
    clock: AtomicI64,
    latency: Mutex<Option<Duration>>,
    injected_failures: Mutex<VecDeque<RemoteStoreError>>,
    insert_note_calls: AtomicUsize,
    update_note_calls: AtomicUsize,
    list_tags_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the server clock and return the new timestamp. Wall time,
    /// bumped by a millisecond when two writes land in the same instant, so
    /// timestamps stay strictly increasing and comparable to client clocks.
    fn next_timestamp(&self) -> String {
        let now_ms = Utc::now().timestamp_millis();
        let previous = self
            .clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(if now_ms <= last { last + 1 } else { now_ms })
            })
            .unwrap_or(now_ms);
        let assigned = if now_ms <= previous {
            previous + 1
        } else {
            now_ms
        };
        DateTime::<Utc>::from_timestamp_millis(assigned)
            .expect("server clock in range")
            .to_rfc3339()
    }

    async fn on_call(&self) -> Result<()> {
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = lock(&self.injected_failures).pop_front() {
            return Err(err);
        }
        Ok(())
    }

    // ── Test hooks ───────────────────────────────────────────────────────

    /// Delay every call by `latency`, so tests can overlap operations.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = Some(latency);
    }

    /// Queue an error; the next call consumes and returns it.
    pub fn fail_next_with(&self, err: RemoteStoreError) {
        lock(&self.injected_failures).push_back(err);
    }

    /// Queue `count` consecutive failures with the given status.
    pub fn fail_next_calls(&self, count: usize, status: u16) {
        let mut failures = lock(&self.injected_failures);
        for _ in 0..count {
            failures.push_back(RemoteStoreError::api(status, "injected failure"));
        }
    }

    /// Write a note as another device would: server timestamp advances.
    pub fn write_note_from_other_device(&self, id: &str, title: &str, content: &str) -> RemoteNote {
        let updated_at = self.next_timestamp();
        let mut notes = lock(&self.notes);
        if let Some(note) = notes.get_mut(id) {
            note.title = title.to_string();
            note.content = content.to_string();
            note.updated_at = updated_at;
            return note.clone();
        }
        let note = RemoteNote {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            pinned: false,
            deleted_at: None,
            created_at: updated_at.clone(),
            updated_at,
        };
        notes.insert(id.to_string(), note.clone());
        note
    }

    /// Write a tag as another device would.
    pub fn write_tag_from_other_device(&self, tag: &TagPayload) -> RemoteTag {
        let updated_at = self.next_timestamp();
        let stored = RemoteTag {
            id: tag.id.clone(),
            name: tag.name.clone(),
            color: tag.color,
            created_at: tag.created_at.clone(),
            updated_at,
        };
        lock(&self.tags).insert(stored.id.clone(), stored.clone());
        stored
    }

    /// Remove a tag as another device would.
    pub fn delete_tag_from_other_device(&self, tag_id: &str) {
        lock(&self.tags).remove(tag_id);
        lock(&self.links).retain(|(_, tag)| tag != tag_id);
    }

    pub fn note(&self, note_id: &str) -> Option<RemoteNote> {
        lock(&self.notes).get(note_id).cloned()
    }

    pub fn tag(&self, tag_id: &str) -> Option<RemoteTag> {
        lock(&self.tags).get(tag_id).cloned()
    }

    pub fn has_link(&self, note_id: &str, tag_id: &str) -> bool {
        lock(&self.links).contains(&(note_id.to_string(), tag_id.to_string()))
    }

    pub fn note_count(&self) -> usize {
        lock(&self.notes).len()
    }

    pub fn insert_note_calls(&self) -> usize {
        self.insert_note_calls.load(Ordering::SeqCst)
    }

    pub fn update_note_calls(&self) -> usize {
        self.update_note_calls.load(Ordering::SeqCst)
    }

    pub fn list_tags_calls(&self) -> usize {
        self.list_tags_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn notes_updated_after(&self, watermark: &str) -> Result<Vec<RemoteNote>> {
        self.on_call().await?;
        let notes = lock(&self.notes);
        Ok(notes
            .values()
            .filter(|note| quillpad_core::sync::remote_is_newer(&note.updated_at, watermark))
            .cloned()
            .collect())
    }

    async fn get_note(&self, note_id: &str) -> Result<Option<RemoteNote>> {
        self.on_call().await?;
        Ok(lock(&self.notes).get(note_id).cloned())
    }

    async fn insert_note(&self, note: &NotePayload) -> Result<RemoteNote> {
        self.on_call().await?;
        self.insert_note_calls.fetch_add(1, Ordering::SeqCst);
        let mut notes = lock(&self.notes);
        if notes.contains_key(&note.id) {
            return Err(RemoteStoreError::api(
                409,
                "duplicate key value violates unique constraint",
            ));
        }
        let stored = RemoteNote {
            id: note.id.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
            pinned: note.pinned,
            deleted_at: note.deleted_at.clone(),
            created_at: note.created_at.clone(),
            updated_at: self.next_timestamp(),
        };
        notes.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update_note(&self, note_id: &str, changes: &NoteChanges) -> Result<RemoteNote> {
        self.on_call().await?;
        self.update_note_calls.fetch_add(1, Ordering::SeqCst);
        let updated_at = self.next_timestamp();
        let mut notes = lock(&self.notes);
        let note = notes
            .get_mut(note_id)
            .ok_or_else(|| RemoteStoreError::api(404, "note update matched no rows"))?;
        if let Some(title) = &changes.title {
            note.title = title.clone();
        }
        if let Some(content) = &changes.content {
            note.content = content.clone();
        }
        if let Some(pinned) = changes.pinned {
            note.pinned = pinned;
        }
        if let Some(deleted_at) = &changes.deleted_at {
            note.deleted_at = deleted_at.clone();
        }
        note.updated_at = updated_at;
        Ok(note.clone())
    }

    async fn delete_note(&self, note_id: &str) -> Result<()> {
        self.on_call().await?;
        lock(&self.notes).remove(note_id);
        lock(&self.links).retain(|(note, _)| note != note_id);
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<RemoteTag>> {
        self.on_call().await?;
        self.list_tags_calls.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.tags).values().cloned().collect())
    }

    async fn get_tag(&self, tag_id: &str) -> Result<Option<RemoteTag>> {
        self.on_call().await?;
        Ok(lock(&self.tags).get(tag_id).cloned())
    }

    async fn insert_tag(&self, tag: &TagPayload) -> Result<RemoteTag> {
        self.on_call().await?;
        let mut tags = lock(&self.tags);
        if tags.contains_key(&tag.id) {
            return Err(RemoteStoreError::api(
                409,
                "duplicate key value violates unique constraint",
            ));
        }
        let stored = RemoteTag {
            id: tag.id.clone(),
            name: tag.name.clone(),
            color: tag.color,
            created_at: tag.created_at.clone(),
            updated_at: self.next_timestamp(),
        };
        tags.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update_tag(&self, tag_id: &str, changes: &TagChanges) -> Result<RemoteTag> {
        self.on_call().await?;
        let updated_at = self.next_timestamp();
        let mut tags = lock(&self.tags);
        let tag = tags
            .get_mut(tag_id)
            .ok_or_else(|| RemoteStoreError::api(404, "tag update matched no rows"))?;
        if let Some(name) = &changes.name {
            tag.name = name.clone();
        }
        if let Some(color) = changes.color {
            tag.color = color;
        }
        tag.updated_at = updated_at;
        Ok(tag.clone())
    }

    async fn delete_tag(&self, tag_id: &str) -> Result<()> {
        self.on_call().await?;
        lock(&self.tags).remove(tag_id);
        lock(&self.links).retain(|(_, tag)| tag != tag_id);
        Ok(())
    }

    async fn insert_link(&self, note_id: &str, tag_id: &str) -> Result<()> {
        self.on_call().await?;
        // FK semantics: both endpoints must already exist remotely.
        if !lock(&self.notes).contains_key(note_id) || !lock(&self.tags).contains_key(tag_id) {
            return Err(RemoteStoreError::api(
                409,
                "insert or update violates foreign key constraint",
            ));
        }
        lock(&self.links).insert((note_id.to_string(), tag_id.to_string()));
        Ok(())
    }

    async fn delete_link(&self, note_id: &str, tag_id: &str) -> Result<()> {
        self.on_call().await?;
        lock(&self.links)
            .remove(&(note_id.to_string(), tag_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_clock_is_monotonic_per_write() {
        let remote = InMemoryRemoteStore::new();
        let first = remote.write_note_from_other_device("n1", "a", "1");
        let second = remote.write_note_from_other_device("n1", "a", "2");
        assert!(quillpad_core::sync::remote_is_newer(
            &second.updated_at,
            &first.updated_at
        ));
    }

    #[tokio::test]
    async fn injected_failure_is_consumed_once() {
        let remote = InMemoryRemoteStore::new();
        remote.fail_next_calls(1, 500);
        assert!(remote.list_tags().await.is_err());
        assert!(remote.list_tags().await.is_ok());
    }
}
