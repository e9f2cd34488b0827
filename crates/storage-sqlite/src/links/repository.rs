//! Offline write layer and read path for note-tag links.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use quillpad_core::errors::{Error, Result};
use quillpad_core::links::NoteTagLink;
use quillpad_core::notes::Note;
use quillpad_core::sync::{QueuePayload, SyncEntity, SyncStatus};
use quillpad_core::tags::Tag;

use crate::db::{enum_from_db, enum_to_db, get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::notes::NoteDB;
use crate::queue::{enqueue_operation, has_pending_entries, remove_entry_tx};
use crate::schema::{note_tags, notes, tags};
use crate::tags::TagDB;

use super::model::NoteTagLinkDB;

pub struct LinkRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

fn load_link_row(
    conn: &mut SqliteConnection,
    note_id: &str,
    tag_id: &str,
) -> Result<Option<NoteTagLinkDB>> {
    note_tags::table
        .find((note_id, tag_id))
        .first::<NoteTagLinkDB>(conn)
        .optional()
        .map_err(|e| StorageError::from(e).into())
}

fn link_entity_id(note_id: &str, tag_id: &str) -> String {
    format!("{note_id}:{tag_id}")
}

fn require_endpoints(conn: &mut SqliteConnection, note_id: &str, tag_id: &str) -> Result<()> {
    let note_exists = notes::table
        .find(note_id)
        .first::<NoteDB>(conn)
        .optional()
        .map_err(StorageError::from)?
        .is_some();
    if !note_exists {
        return Err(Error::not_found("note", note_id));
    }
    let tag_exists = tags::table
        .find(tag_id)
        .first::<TagDB>(conn)
        .optional()
        .map_err(StorageError::from)?
        .is_some();
    if !tag_exists {
        return Err(Error::not_found("tag", tag_id));
    }
    Ok(())
}

impl LinkRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        LinkRepository { pool, writer }
    }

    // ── Read path ────────────────────────────────────────────────────────

    pub fn get_link(&self, note_id: &str, tag_id: &str) -> Result<Option<NoteTagLink>> {
        let mut conn = get_connection(&self.pool)?;
        load_link_row(&mut conn, note_id, tag_id)?
            .map(NoteTagLinkDB::into_domain)
            .transpose()
    }

    pub fn tags_for_note(&self, note_id: &str) -> Result<Vec<Tag>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = note_tags::table
            .inner_join(tags::table.on(tags::id.eq(note_tags::tag_id)))
            .filter(note_tags::note_id.eq(note_id))
            .select(TagDB::as_select())
            .order(tags::name.asc())
            .load::<TagDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(TagDB::into_domain).collect()
    }

    pub fn notes_for_tag(&self, tag_id: &str) -> Result<Vec<Note>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = note_tags::table
            .inner_join(notes::table.on(notes::id.eq(note_tags::note_id)))
            .filter(note_tags::tag_id.eq(tag_id))
            .filter(notes::deleted_at.is_null())
            .select(NoteDB::as_select())
            .order(notes::local_updated_at.desc())
            .load::<NoteDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(NoteDB::into_domain).collect()
    }

    // ── Offline write layer ──────────────────────────────────────────────

    /// Link a tag to a note. Both endpoints must exist locally; re-adding an
    /// existing link is a no-op.
    pub async fn add_tag_to_note(&self, note_id: String, tag_id: String) -> Result<NoteTagLink> {
        self.writer
            .exec(move |conn| {
                require_endpoints(conn, &note_id, &tag_id)?;
                if let Some(existing) = load_link_row(conn, &note_id, &tag_id)? {
                    return existing.into_domain();
                }
                let row = NoteTagLinkDB {
                    note_id: note_id.clone(),
                    tag_id: tag_id.clone(),
                    sync_status: enum_to_db(&SyncStatus::Pending)?,
                    created_at: Utc::now().to_rfc3339(),
                };
                diesel::insert_into(note_tags::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                enqueue_operation(conn, &QueuePayload::LinkAdd { note_id, tag_id })?;
                row.into_domain()
            })
            .await
    }

    pub async fn remove_tag_from_note(&self, note_id: String, tag_id: String) -> Result<()> {
        self.writer
            .exec(move |conn| {
                let link_id = link_entity_id(&note_id, &tag_id);
                if load_link_row(conn, &note_id, &tag_id)?.is_none() {
                    return Err(Error::not_found("note_tag", link_id));
                }
                diesel::delete(note_tags::table.find((&note_id, &tag_id)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                enqueue_operation(conn, &QueuePayload::LinkRemove { note_id, tag_id })?;
                Ok(())
            })
            .await
    }

    // ── Sync-side mutations (engine only) ────────────────────────────────

    /// Apply a realtime link insert. Skipped when either endpoint is missing
    /// locally (its own event will carry it) or the link already exists.
    pub async fn apply_remote_link(&self, note_id: String, tag_id: String) -> Result<bool> {
        self.writer
            .exec(move |conn| {
                if require_endpoints(conn, &note_id, &tag_id).is_err() {
                    return Ok(false);
                }
                if load_link_row(conn, &note_id, &tag_id)?.is_some() {
                    return Ok(false);
                }
                let row = NoteTagLinkDB {
                    note_id,
                    tag_id,
                    sync_status: enum_to_db(&SyncStatus::Synced)?,
                    created_at: Utc::now().to_rfc3339(),
                };
                diesel::insert_into(note_tags::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(true)
            })
            .await
    }

    /// Apply a realtime link removal. Links holding unsynced local intent
    /// are left alone.
    pub async fn apply_remote_link_delete(&self, note_id: String, tag_id: String) -> Result<bool> {
        self.writer
            .exec(move |conn| {
                let Some(existing) = load_link_row(conn, &note_id, &tag_id)? else {
                    return Ok(false);
                };
                let status: SyncStatus = enum_from_db(&existing.sync_status)?;
                if status != SyncStatus::Synced {
                    return Ok(false);
                }
                diesel::delete(note_tags::table.find((&note_id, &tag_id)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(true)
            })
            .await
    }

    /// Confirm a pushed link entry.
    pub async fn complete_link_push(
        &self,
        seq: i64,
        note_id: String,
        tag_id: String,
    ) -> Result<()> {
        self.writer
            .exec(move |conn| {
                remove_entry_tx(conn, seq)?;
                let Some(mut row) = load_link_row(conn, &note_id, &tag_id)? else {
                    return Ok(());
                };
                let entity = enum_to_db(&SyncEntity::NoteTag)?;
                let link_id = link_entity_id(&note_id, &tag_id);
                let status: SyncStatus = enum_from_db(&row.sync_status)?;
                if status == SyncStatus::Pending && !has_pending_entries(conn, &entity, &link_id)? {
                    row.sync_status = enum_to_db(&SyncStatus::Synced)?;
                    diesel::update(note_tags::table.find((&note_id, &tag_id)))
                        .set(&row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(())
            })
            .await
    }
}
