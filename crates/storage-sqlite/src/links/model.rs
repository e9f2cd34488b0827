//! Database models for note-tag links.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use quillpad_core::errors::Result;
use quillpad_core::links::NoteTagLink;

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
#[diesel(primary_key(note_id, tag_id))]
#[diesel(table_name = crate::schema::note_tags)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NoteTagLinkDB {
    pub note_id: String,
    pub tag_id: String,
    pub sync_status: String,
    pub created_at: String,
}

impl NoteTagLinkDB {
    pub fn into_domain(self) -> Result<NoteTagLink> {
        Ok(NoteTagLink {
            note_id: self.note_id,
            tag_id: self.tag_id,
            sync_status: enum_from_db(&self.sync_status)?,
            created_at: self.created_at,
        })
    }
}
