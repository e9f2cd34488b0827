//! Offline write layer and read path for notes.
//!
//! Every mutation follows the same contract: read the current row (NotFound
//! if absent, except create), apply the change, stamp `local_updated_at`,
//! promote `synced` to `pending`, then persist the row and append exactly
//! one queue entry — all inside one writer transaction.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use quillpad_core::errors::{Error, Result};
use quillpad_core::notes::{NewNote, Note, NoteUpdate};
use quillpad_core::sync::{remote_is_newer, QueuePayload, RemoteNote, SyncEntity, SyncStatus};

use crate::db::{enum_from_db, enum_to_db, get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::queue::{enqueue_operation, has_pending_entries, remove_entry_tx};
use crate::schema::{note_tags, notes};

use super::model::NoteDB;

/// Records per writer job during bulk import. A tuning constant bounding
/// memory per transaction, not a correctness constraint.
const IMPORT_CHUNK_SIZE: usize = 100;

pub struct NoteRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

fn load_note_row(conn: &mut SqliteConnection, note_id: &str) -> Result<Option<NoteDB>> {
    notes::table
        .find(note_id)
        .first::<NoteDB>(conn)
        .optional()
        .map_err(|e| StorageError::from(e).into())
}

fn require_note_row(conn: &mut SqliteConnection, note_id: &str) -> Result<NoteDB> {
    load_note_row(conn, note_id)?.ok_or_else(|| Error::not_found("note", note_id))
}

/// Stamp a local edit: bump `local_updated_at` and promote a `synced` row to
/// `pending`. A `conflict` row is rejected — it must be resolved first.
fn touch_for_local_edit(row: &mut NoteDB) -> Result<()> {
    let status: SyncStatus = enum_from_db(&row.sync_status)?;
    if status == SyncStatus::Conflict {
        return Err(Error::UnresolvedConflict(row.id.clone()));
    }
    row.local_updated_at = Utc::now().to_rfc3339();
    if status == SyncStatus::Synced {
        row.sync_status = enum_to_db(&SyncStatus::Pending)?;
    }
    Ok(())
}

/// The confirmed round-trip stamp. Uses the server timestamp when it sits
/// ahead of our clock, so a skewed server never looks "newer than last
/// sync" on the very next push.
fn confirmed_sync_time(server_updated_at: Option<&str>) -> String {
    let now = Utc::now().to_rfc3339();
    match server_updated_at {
        Some(server_ts) if remote_is_newer(server_ts, &now) => server_ts.to_string(),
        _ => now,
    }
}

fn persist_note_row(conn: &mut SqliteConnection, row: &NoteDB) -> Result<()> {
    diesel::update(notes::table.find(&row.id))
        .set(row)
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

fn fresh_note_row(new_note: NewNote) -> Result<NoteDB> {
    let now = Utc::now().to_rfc3339();
    Ok(NoteDB {
        id: Uuid::new_v4().to_string(),
        title: new_note.title,
        content: new_note.content,
        pinned: new_note.pinned as i32,
        deleted_at: None,
        created_at: now.clone(),
        sync_status: enum_to_db(&SyncStatus::Pending)?,
        last_synced_at: None,
        server_updated_at: None,
        local_updated_at: now,
    })
}

fn insert_note_row(conn: &mut SqliteConnection, row: &NoteDB) -> Result<()> {
    diesel::insert_into(notes::table)
        .values(row)
        .execute(conn)
        .map_err(StorageError::from)?;
    enqueue_operation(conn, &QueuePayload::NoteCreate(row.to_payload()))?;
    Ok(())
}

impl NoteRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        NoteRepository { pool, writer }
    }

    // ── Read path ────────────────────────────────────────────────────────

    pub fn get_note(&self, note_id: &str) -> Result<Option<Note>> {
        let mut conn = get_connection(&self.pool)?;
        load_note_row(&mut conn, note_id)?
            .map(NoteDB::into_domain)
            .transpose()
    }

    /// Active notes, pinned first, most recently edited first.
    pub fn list_active_notes(&self) -> Result<Vec<Note>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = notes::table
            .filter(notes::deleted_at.is_null())
            .order((notes::pinned.desc(), notes::local_updated_at.desc()))
            .load::<NoteDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(NoteDB::into_domain).collect()
    }

    pub fn list_deleted_notes(&self) -> Result<Vec<Note>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = notes::table
            .filter(notes::deleted_at.is_not_null())
            .order(notes::local_updated_at.desc())
            .load::<NoteDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(NoteDB::into_domain).collect()
    }

    pub fn notes_updated_after(&self, timestamp: &str) -> Result<Vec<Note>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = notes::table
            .filter(notes::local_updated_at.gt(timestamp.to_string()))
            .order(notes::local_updated_at.asc())
            .load::<NoteDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(NoteDB::into_domain).collect()
    }

    /// The pull watermark: newest confirmed round-trip across all notes.
    /// `None` means this store has never synced (initial hydration).
    pub fn max_last_synced_at(&self) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        notes::table
            .select(diesel::dsl::max(notes::last_synced_at))
            .first::<Option<String>>(&mut conn)
            .map_err(|e| StorageError::from(e).into())
    }

    // ── Offline write layer ──────────────────────────────────────────────

    pub async fn create_note(&self, new_note: NewNote) -> Result<Note> {
        self.writer
            .exec(move |conn| {
                let row = fresh_note_row(new_note)?;
                insert_note_row(conn, &row)?;
                row.into_domain()
            })
            .await
    }

    pub async fn update_note(&self, note_id: String, update: NoteUpdate) -> Result<Note> {
        self.writer
            .exec(move |conn| {
                let mut row = require_note_row(conn, &note_id)?;
                if let Some(title) = update.title {
                    row.title = title;
                }
                if let Some(content) = update.content {
                    row.content = content;
                }
                touch_for_local_edit(&mut row)?;
                persist_note_row(conn, &row)?;
                enqueue_operation(conn, &QueuePayload::NoteUpdate(row.to_payload()))?;
                row.into_domain()
            })
            .await
    }

    pub async fn soft_delete_note(&self, note_id: String) -> Result<Note> {
        self.writer
            .exec(move |conn| {
                let mut row = require_note_row(conn, &note_id)?;
                touch_for_local_edit(&mut row)?;
                let deleted_at = Utc::now().to_rfc3339();
                row.deleted_at = Some(deleted_at.clone());
                persist_note_row(conn, &row)?;
                enqueue_operation(
                    conn,
                    &QueuePayload::NoteSoftDelete {
                        id: note_id,
                        deleted_at,
                    },
                )?;
                row.into_domain()
            })
            .await
    }

    pub async fn restore_note(&self, note_id: String) -> Result<Note> {
        self.writer
            .exec(move |conn| {
                let mut row = require_note_row(conn, &note_id)?;
                touch_for_local_edit(&mut row)?;
                row.deleted_at = None;
                persist_note_row(conn, &row)?;
                enqueue_operation(conn, &QueuePayload::NoteRestore { id: note_id })?;
                row.into_domain()
            })
            .await
    }

    pub async fn set_note_pinned(&self, note_id: String, pinned: bool) -> Result<Note> {
        self.writer
            .exec(move |conn| {
                let mut row = require_note_row(conn, &note_id)?;
                touch_for_local_edit(&mut row)?;
                row.pinned = pinned as i32;
                persist_note_row(conn, &row)?;
                enqueue_operation(conn, &QueuePayload::NotePin { id: note_id, pinned })?;
                row.into_domain()
            })
            .await
    }

    /// Permanent delete: the row and its links go immediately; queued
    /// entries that still reference the note become no-ops at dispatch.
    pub async fn delete_note(&self, note_id: String) -> Result<()> {
        self.writer
            .exec(move |conn| {
                require_note_row(conn, &note_id)?;
                diesel::delete(note_tags::table.filter(note_tags::note_id.eq(&note_id)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(notes::table.find(&note_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                enqueue_operation(conn, &QueuePayload::NoteDelete { id: note_id })?;
                Ok(())
            })
            .await
    }

    /// Bulk creation in fixed-size chunks; each record still gets its own
    /// queue entry for individual retry granularity.
    pub async fn import_notes(&self, batch: Vec<NewNote>) -> Result<Vec<Note>> {
        let mut imported = Vec::with_capacity(batch.len());
        let mut remaining = batch;
        while !remaining.is_empty() {
            let tail = remaining.split_off(remaining.len().min(IMPORT_CHUNK_SIZE));
            let chunk = std::mem::replace(&mut remaining, tail);
            let mut created = self
                .writer
                .exec(move |conn| {
                    let mut chunk_notes = Vec::with_capacity(chunk.len());
                    for new_note in chunk {
                        let row = fresh_note_row(new_note)?;
                        insert_note_row(conn, &row)?;
                        chunk_notes.push(row.into_domain()?);
                    }
                    Ok(chunk_notes)
                })
                .await?;
            imported.append(&mut created);
        }
        Ok(imported)
    }

    // ── Sync-side mutations (engine only) ────────────────────────────────

    /// Apply a pulled or realtime remote note. Returns false when the local
    /// row holds unsynced intent (`pending`/`conflict`) and was left alone.
    pub async fn apply_remote_note(&self, remote: RemoteNote) -> Result<bool> {
        self.writer
            .exec(move |conn| {
                if let Some(existing) = load_note_row(conn, &remote.id)? {
                    let status: SyncStatus = enum_from_db(&existing.sync_status)?;
                    if status != SyncStatus::Synced {
                        return Ok(false);
                    }
                }
                upsert_remote_note(conn, &remote)?;
                Ok(true)
            })
            .await
    }

    /// Apply a remote hard delete. Same skip rule as `apply_remote_note`.
    pub async fn apply_remote_note_delete(&self, note_id: String) -> Result<bool> {
        self.writer
            .exec(move |conn| {
                let Some(existing) = load_note_row(conn, &note_id)? else {
                    return Ok(false);
                };
                let status: SyncStatus = enum_from_db(&existing.sync_status)?;
                if status != SyncStatus::Synced {
                    return Ok(false);
                }
                diesel::delete(note_tags::table.filter(note_tags::note_id.eq(&note_id)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(notes::table.find(&note_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(true)
            })
            .await
    }

    /// Confirm a pushed queue entry: drop it and stamp the note with the
    /// server timestamp. The row is only promoted to `synced` when no newer
    /// local intent is still queued for it.
    pub async fn complete_note_push(
        &self,
        seq: i64,
        note_id: String,
        server_updated_at: Option<String>,
    ) -> Result<()> {
        self.writer
            .exec(move |conn| {
                remove_entry_tx(conn, seq)?;
                let Some(mut row) = load_note_row(conn, &note_id)? else {
                    return Ok(());
                };
                row.last_synced_at = Some(confirmed_sync_time(server_updated_at.as_deref()));
                if let Some(server_ts) = server_updated_at {
                    row.server_updated_at = Some(server_ts);
                }
                let status: SyncStatus = enum_from_db(&row.sync_status)?;
                let entity = enum_to_db(&SyncEntity::Note)?;
                if status == SyncStatus::Pending && !has_pending_entries(conn, &entity, &note_id)? {
                    row.sync_status = enum_to_db(&SyncStatus::Synced)?;
                }
                persist_note_row(conn, &row)
            })
            .await
    }

    /// Route a queue entry to the conflict surface: drop the entry, mark the
    /// note `conflict`, and hand the local version back.
    pub async fn mark_note_conflict(&self, seq: i64, note_id: String) -> Result<Option<Note>> {
        self.writer
            .exec(move |conn| {
                remove_entry_tx(conn, seq)?;
                let Some(mut row) = load_note_row(conn, &note_id)? else {
                    return Ok(None);
                };
                row.sync_status = enum_to_db(&SyncStatus::Conflict)?;
                persist_note_row(conn, &row)?;
                row.into_domain().map(Some)
            })
            .await
    }

    /// Resolution: overwrite the local row with the remote version and mark
    /// it `synced`, regardless of its current status.
    pub async fn resolve_note_with_remote(&self, remote: RemoteNote) -> Result<Note> {
        self.writer
            .exec(move |conn| {
                let row = upsert_remote_note(conn, &remote)?;
                row.into_domain()
            })
            .await
    }

    /// Resolution: the remote store accepted the local content; mark the row
    /// `synced` with the returned server timestamp.
    pub async fn mark_note_resolved_synced(
        &self,
        note_id: String,
        server_updated_at: String,
    ) -> Result<Note> {
        self.writer
            .exec(move |conn| {
                let mut row = require_note_row(conn, &note_id)?;
                row.sync_status = enum_to_db(&SyncStatus::Synced)?;
                row.last_synced_at = Some(confirmed_sync_time(Some(&server_updated_at)));
                row.server_updated_at = Some(server_updated_at);
                persist_note_row(conn, &row)?;
                row.into_domain()
            })
            .await
    }

    /// Resolution while offline: mark the row `pending` again and queue its
    /// current content as a fresh update. The sync baseline advances past
    /// the remote version the caller chose to override, so the re-queued
    /// update does not re-detect the very conflict just resolved.
    pub async fn requeue_local_note(
        &self,
        note_id: String,
        overridden_server_updated_at: String,
    ) -> Result<Note> {
        self.writer
            .exec(move |conn| {
                let mut row = require_note_row(conn, &note_id)?;
                row.sync_status = enum_to_db(&SyncStatus::Pending)?;
                row.local_updated_at = Utc::now().to_rfc3339();
                row.last_synced_at = Some(confirmed_sync_time(Some(
                    &overridden_server_updated_at,
                )));
                row.server_updated_at = Some(overridden_server_updated_at);
                persist_note_row(conn, &row)?;
                enqueue_operation(conn, &QueuePayload::NoteUpdate(row.to_payload()))?;
                row.into_domain()
            })
            .await
    }
}

fn upsert_remote_note(conn: &mut SqliteConnection, remote: &RemoteNote) -> Result<NoteDB> {
    let confirmed = confirmed_sync_time(Some(&remote.updated_at));
    let row = NoteDB {
        id: remote.id.clone(),
        title: remote.title.clone(),
        content: remote.content.clone(),
        pinned: remote.pinned as i32,
        deleted_at: remote.deleted_at.clone(),
        created_at: remote.created_at.clone(),
        sync_status: enum_to_db(&SyncStatus::Synced)?,
        last_synced_at: Some(confirmed.clone()),
        server_updated_at: Some(remote.updated_at.clone()),
        local_updated_at: confirmed,
    };
    diesel::insert_into(notes::table)
        .values(&row)
        .on_conflict(notes::id)
        .do_update()
        .set(&row)
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(row)
}
