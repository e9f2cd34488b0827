//! Repository and transaction helpers for the sync queue.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use quillpad_core::errors::Result;
use quillpad_core::sync::{QueueOp, QueuePayload, SyncQueueEntry};

use crate::db::{enum_to_db, get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::sync_queue;

use super::model::{NewSyncQueueEntryDB, SyncQueueEntryDB};

/// Append one queue entry for `payload` inside the caller's transaction and
/// return its idempotency token.
///
/// Enqueueing an `update` first drops any still-pending update for the same
/// entity, so rapid consecutive edits collapse into one remote round trip.
/// `create` and `delete` entries are never compacted away.
pub fn enqueue_operation(conn: &mut SqliteConnection, payload: &QueuePayload) -> Result<String> {
    let entity = enum_to_db(&payload.entity())?;
    let entity_id = payload.entity_id();
    let op = enum_to_db(&payload.op())?;

    if payload.op() == QueueOp::Update {
        diesel::delete(
            sync_queue::table
                .filter(sync_queue::entity.eq(&entity))
                .filter(sync_queue::entity_id.eq(&entity_id))
                .filter(sync_queue::op.eq(&op)),
        )
        .execute(conn)
        .map_err(StorageError::from)?;
    }

    let op_id = Uuid::new_v4().to_string();
    let row = NewSyncQueueEntryDB {
        op_id: op_id.clone(),
        entity,
        entity_id,
        op,
        payload: serde_json::to_string(payload)?,
        enqueued_at: Utc::now().to_rfc3339(),
        retry_count: 0,
    };
    diesel::insert_into(sync_queue::table)
        .values(&row)
        .execute(conn)
        .map_err(StorageError::from)?;

    Ok(op_id)
}

/// True when any queue entry still targets `(entity, entity_id)`.
pub fn has_pending_entries(
    conn: &mut SqliteConnection,
    entity: &str,
    entity_id: &str,
) -> Result<bool> {
    let count: i64 = sync_queue::table
        .filter(sync_queue::entity.eq(entity))
        .filter(sync_queue::entity_id.eq(entity_id))
        .count()
        .get_result(conn)
        .map_err(StorageError::from)?;
    Ok(count > 0)
}

/// Remove one entry inside the caller's transaction.
pub fn remove_entry_tx(conn: &mut SqliteConnection, seq: i64) -> Result<()> {
    diesel::delete(sync_queue::table.find(seq))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

/// A queue row whose payload failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptQueueEntry {
    pub seq: i64,
    pub error: String,
}

/// Snapshot of the pending queue taken at cycle start.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    pub entries: Vec<SyncQueueEntry>,
    pub corrupt: Vec<CorruptQueueEntry>,
}

pub struct SyncQueueRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SyncQueueRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        SyncQueueRepository { pool, writer }
    }

    /// Load every pending entry in enqueue order. Malformed rows are
    /// reported separately rather than aborting the snapshot.
    pub fn list_pending(&self) -> Result<QueueSnapshot> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_queue::table
            .order(sync_queue::seq.asc())
            .load::<SyncQueueEntryDB>(&mut conn)
            .map_err(StorageError::from)?;

        let mut snapshot = QueueSnapshot::default();
        for row in rows {
            let seq = row.seq;
            match row.into_domain() {
                Ok(entry) => snapshot.entries.push(entry),
                Err(err) => snapshot.corrupt.push(CorruptQueueEntry {
                    seq,
                    error: err.to_string(),
                }),
            }
        }
        Ok(snapshot)
    }

    pub fn pending_count(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        sync_queue::table
            .count()
            .get_result(&mut conn)
            .map_err(|e| StorageError::from(e).into())
    }

    pub fn has_pending_for(&self, entity: &str, entity_id: &str) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;
        has_pending_entries(&mut conn, entity, entity_id)
    }

    pub async fn remove_entry(&self, seq: i64) -> Result<()> {
        self.writer
            .exec(move |conn| remove_entry_tx(conn, seq))
            .await
    }

    /// Bump the retry counter for a failed entry and return the new count.
    pub async fn record_retry(&self, seq: i64) -> Result<i32> {
        self.writer
            .exec(move |conn| {
                let row = sync_queue::table
                    .find(seq)
                    .first::<SyncQueueEntryDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?;
                let Some(row) = row else {
                    return Ok(0);
                };
                let next = row.retry_count + 1;
                diesel::update(sync_queue::table.find(seq))
                    .set(sync_queue::retry_count.eq(next))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(next)
            })
            .await
    }
}
