//! Database models for notes.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use quillpad_core::errors::Result;
use quillpad_core::notes::Note;
use quillpad_core::sync::NotePayload;

use crate::db::enum_from_db;

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::notes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NoteDB {
    pub id: String,
    pub title: String,
    pub content: String,
    pub pinned: i32,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub sync_status: String,
    pub last_synced_at: Option<String>,
    pub server_updated_at: Option<String>,
    pub local_updated_at: String,
}

impl NoteDB {
    pub fn into_domain(self) -> Result<Note> {
        Ok(Note {
            id: self.id,
            title: self.title,
            content: self.content,
            pinned: self.pinned != 0,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            sync_status: enum_from_db(&self.sync_status)?,
            last_synced_at: self.last_synced_at,
            server_updated_at: self.server_updated_at,
            local_updated_at: self.local_updated_at,
        })
    }

    /// The row content as shipped to the remote store.
    pub fn to_payload(&self) -> NotePayload {
        NotePayload {
            id: self.id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            pinned: self.pinned != 0,
            deleted_at: self.deleted_at.clone(),
            created_at: self.created_at.clone(),
        }
    }
}
