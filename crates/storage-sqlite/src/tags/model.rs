//! Database models for tags.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use quillpad_core::errors::Result;
use quillpad_core::sync::TagPayload;
use quillpad_core::tags::Tag;

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
#[diesel(table_name = crate::schema::tags)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TagDB {
    pub id: String,
    pub name: String,
    pub color: String,
    pub created_at: String,
    pub sync_status: String,
    pub last_synced_at: Option<String>,
    pub server_updated_at: Option<String>,
    pub local_updated_at: String,
}

impl TagDB {
    pub fn into_domain(self) -> Result<Tag> {
        Ok(Tag {
            id: self.id,
            name: self.name,
            color: enum_from_db(&self.color)?,
            created_at: self.created_at,
            sync_status: enum_from_db(&self.sync_status)?,
            last_synced_at: self.last_synced_at,
            server_updated_at: self.server_updated_at,
            local_updated_at: self.local_updated_at,
        })
    }

    pub fn to_payload(&self) -> Result<TagPayload> {
        Ok(TagPayload {
            id: self.id.clone(),
            name: self.name.clone(),
            color: enum_from_db(&self.color)?,
            created_at: self.created_at.clone(),
        })
    }
}
