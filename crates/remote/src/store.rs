//! Contract for the remote relational store.

use async_trait::async_trait;

use quillpad_core::sync::{NoteChanges, NotePayload, RemoteNote, RemoteTag, TagChanges, TagPayload};

use crate::error::Result;

/// Per-entity CRUD against the remote relational store.
///
/// The server assigns `updated_at` on every write and scopes all rows to the
/// authenticated owner; insert/update return the stored row. Server clock
/// monotonicity is a design assumption the conflict check relies on, not
/// something this boundary enforces.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn notes_updated_after(&self, watermark: &str) -> Result<Vec<RemoteNote>>;
    async fn get_note(&self, note_id: &str) -> Result<Option<RemoteNote>>;
    async fn insert_note(&self, note: &NotePayload) -> Result<RemoteNote>;
    async fn update_note(&self, note_id: &str, changes: &NoteChanges) -> Result<RemoteNote>;
    async fn delete_note(&self, note_id: &str) -> Result<()>;

    async fn list_tags(&self) -> Result<Vec<RemoteTag>>;
    async fn get_tag(&self, tag_id: &str) -> Result<Option<RemoteTag>>;
    async fn insert_tag(&self, tag: &TagPayload) -> Result<RemoteTag>;
    async fn update_tag(&self, tag_id: &str, changes: &TagChanges) -> Result<RemoteTag>;
    async fn delete_tag(&self, tag_id: &str) -> Result<()>;

    async fn insert_link(&self, note_id: &str, tag_id: &str) -> Result<()>;
    async fn delete_link(&self, note_id: &str, tag_id: &str) -> Result<()>;
}
