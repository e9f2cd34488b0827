//! Offline write layer and read path for tags.
//!
//! Tags follow the same local-write-plus-queue-entry contract as notes but
//! reconcile last-write-wins, so there is no conflict handling here.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use quillpad_core::errors::{Error, Result};
use quillpad_core::sync::{remote_is_newer, QueuePayload, RemoteTag, SyncEntity, SyncStatus};
use quillpad_core::tags::{NewTag, Tag, TagUpdate};

use crate::db::{enum_from_db, enum_to_db, get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::queue::{enqueue_operation, has_pending_entries, remove_entry_tx};
use crate::schema::{note_tags, tags};

use super::model::TagDB;

pub struct TagRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

fn load_tag_row(conn: &mut SqliteConnection, tag_id: &str) -> Result<Option<TagDB>> {
    tags::table
        .find(tag_id)
        .first::<TagDB>(conn)
        .optional()
        .map_err(|e| StorageError::from(e).into())
}

fn require_tag_row(conn: &mut SqliteConnection, tag_id: &str) -> Result<TagDB> {
    load_tag_row(conn, tag_id)?.ok_or_else(|| Error::not_found("tag", tag_id))
}

/// See the note repository: server timestamps slightly ahead of our clock
/// are taken as the confirmed round-trip stamp.
fn confirmed_sync_time(server_updated_at: Option<&str>) -> String {
    let now = Utc::now().to_rfc3339();
    match server_updated_at {
        Some(server_ts) if remote_is_newer(server_ts, &now) => server_ts.to_string(),
        _ => now,
    }
}

fn touch_for_local_edit(row: &mut TagDB) -> Result<()> {
    row.local_updated_at = Utc::now().to_rfc3339();
    let status: SyncStatus = enum_from_db(&row.sync_status)?;
    if status == SyncStatus::Synced {
        row.sync_status = enum_to_db(&SyncStatus::Pending)?;
    }
    Ok(())
}

impl TagRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        TagRepository { pool, writer }
    }

    // ── Read path ────────────────────────────────────────────────────────

    pub fn get_tag(&self, tag_id: &str) -> Result<Option<Tag>> {
        let mut conn = get_connection(&self.pool)?;
        load_tag_row(&mut conn, tag_id)?
            .map(TagDB::into_domain)
            .transpose()
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = tags::table
            .order(tags::name.asc())
            .load::<TagDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(TagDB::into_domain).collect()
    }

    // ── Offline write layer ──────────────────────────────────────────────

    pub async fn create_tag(&self, new_tag: NewTag) -> Result<Tag> {
        self.writer
            .exec(move |conn| {
                let now = Utc::now().to_rfc3339();
                let row = TagDB {
                    id: Uuid::new_v4().to_string(),
                    name: new_tag.name,
                    color: enum_to_db(&new_tag.color)?,
                    created_at: now.clone(),
                    sync_status: enum_to_db(&SyncStatus::Pending)?,
                    last_synced_at: None,
                    server_updated_at: None,
                    local_updated_at: now,
                };
                diesel::insert_into(tags::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                enqueue_operation(conn, &QueuePayload::TagCreate(row.to_payload()?))?;
                row.into_domain()
            })
            .await
    }

    pub async fn update_tag(&self, tag_id: String, update: TagUpdate) -> Result<Tag> {
        self.writer
            .exec(move |conn| {
                let mut row = require_tag_row(conn, &tag_id)?;
                if let Some(name) = update.name {
                    row.name = name;
                }
                if let Some(color) = update.color {
                    row.color = enum_to_db(&color)?;
                }
                touch_for_local_edit(&mut row)?;
                diesel::update(tags::table.find(&row.id))
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                enqueue_operation(conn, &QueuePayload::TagUpdate(row.to_payload()?))?;
                row.into_domain()
            })
            .await
    }

    /// Delete a tag and all of its note links in the same transaction.
    pub async fn delete_tag(&self, tag_id: String) -> Result<()> {
        self.writer
            .exec(move |conn| {
                require_tag_row(conn, &tag_id)?;
                diesel::delete(note_tags::table.filter(note_tags::tag_id.eq(&tag_id)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(tags::table.find(&tag_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                enqueue_operation(conn, &QueuePayload::TagDelete { id: tag_id })?;
                Ok(())
            })
            .await
    }

    // ── Sync-side mutations (engine only) ────────────────────────────────

    /// Apply a pulled or realtime remote tag last-write-wins. Returns false
    /// when the local row holds unsynced intent and was left alone.
    pub async fn apply_remote_tag(&self, remote: RemoteTag) -> Result<bool> {
        self.writer
            .exec(move |conn| {
                if let Some(existing) = load_tag_row(conn, &remote.id)? {
                    let status: SyncStatus = enum_from_db(&existing.sync_status)?;
                    if status != SyncStatus::Synced {
                        return Ok(false);
                    }
                }
                let confirmed = confirmed_sync_time(Some(&remote.updated_at));
                let row = TagDB {
                    id: remote.id.clone(),
                    name: remote.name.clone(),
                    color: enum_to_db(&remote.color)?,
                    created_at: remote.created_at.clone(),
                    sync_status: enum_to_db(&SyncStatus::Synced)?,
                    last_synced_at: Some(confirmed.clone()),
                    server_updated_at: Some(remote.updated_at.clone()),
                    local_updated_at: confirmed,
                };
                diesel::insert_into(tags::table)
                    .values(&row)
                    .on_conflict(tags::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(true)
            })
            .await
    }

    /// Apply a remote tag delete (realtime feed). Skips unsynced local rows.
    pub async fn apply_remote_tag_delete(&self, tag_id: String) -> Result<bool> {
        self.writer
            .exec(move |conn| {
                let Some(existing) = load_tag_row(conn, &tag_id)? else {
                    return Ok(false);
                };
                let status: SyncStatus = enum_from_db(&existing.sync_status)?;
                if status != SyncStatus::Synced {
                    return Ok(false);
                }
                diesel::delete(note_tags::table.filter(note_tags::tag_id.eq(&tag_id)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(tags::table.find(&tag_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(true)
            })
            .await
    }

    /// Remote deletion detection: drop local `synced` tags absent from the
    /// full remote tag list, links included. Unsynced local tags survive.
    pub async fn delete_tags_absent_from_remote(&self, remote_ids: Vec<String>) -> Result<usize> {
        self.writer
            .exec(move |conn| {
                let remote_ids: HashSet<String> = remote_ids.into_iter().collect();
                let synced = enum_to_db(&SyncStatus::Synced)?;
                let local_ids: Vec<String> = tags::table
                    .filter(tags::sync_status.eq(&synced))
                    .select(tags::id)
                    .load::<String>(conn)
                    .map_err(StorageError::from)?;
                let stale: Vec<String> = local_ids
                    .into_iter()
                    .filter(|id| !remote_ids.contains(id))
                    .collect();
                if stale.is_empty() {
                    return Ok(0);
                }
                diesel::delete(note_tags::table.filter(note_tags::tag_id.eq_any(&stale)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                let deleted = diesel::delete(tags::table.filter(tags::id.eq_any(&stale)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(deleted)
            })
            .await
    }

    /// Confirm a pushed queue entry for a tag, mirroring the note rule.
    pub async fn complete_tag_push(
        &self,
        seq: i64,
        tag_id: String,
        server_updated_at: Option<String>,
    ) -> Result<()> {
        self.writer
            .exec(move |conn| {
                remove_entry_tx(conn, seq)?;
                let Some(mut row) = load_tag_row(conn, &tag_id)? else {
                    return Ok(());
                };
                row.last_synced_at = Some(confirmed_sync_time(server_updated_at.as_deref()));
                if let Some(server_ts) = server_updated_at {
                    row.server_updated_at = Some(server_ts);
                }
                let status: SyncStatus = enum_from_db(&row.sync_status)?;
                let entity = enum_to_db(&SyncEntity::Tag)?;
                if status == SyncStatus::Pending && !has_pending_entries(conn, &entity, &tag_id)? {
                    row.sync_status = enum_to_db(&SyncStatus::Synced)?;
                }
                diesel::update(tags::table.find(&row.id))
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}
