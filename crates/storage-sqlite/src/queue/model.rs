//! Database models for the sync queue.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use quillpad_core::errors::Result;
use quillpad_core::sync::{QueuePayload, SyncQueueEntry};

use crate::db::enum_from_db;
use crate::errors::StorageError;

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, Serialize, Deserialize)]
#[diesel(primary_key(seq))]
#[diesel(table_name = crate::schema::sync_queue)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncQueueEntryDB {
    pub seq: i64,
    pub op_id: String,
    pub entity: String,
    pub entity_id: String,
    pub op: String,
    pub payload: String,
    pub enqueued_at: String,
    pub retry_count: i32,
}

/// Insertable form; `seq` is assigned by SQLite.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::sync_queue)]
pub struct NewSyncQueueEntryDB {
    pub op_id: String,
    pub entity: String,
    pub entity_id: String,
    pub op: String,
    pub payload: String,
    pub enqueued_at: String,
    pub retry_count: i32,
}

impl SyncQueueEntryDB {
    pub fn into_domain(self) -> Result<SyncQueueEntry> {
        let payload: QueuePayload = serde_json::from_str(&self.payload).map_err(|e| {
            StorageError::Corrupt(format!("queue entry {} payload: {e}", self.seq))
        })?;
        Ok(SyncQueueEntry {
            seq: self.seq,
            op_id: self.op_id,
            entity: enum_from_db(&self.entity)?,
            entity_id: self.entity_id,
            op: enum_from_db(&self.op)?,
            payload,
            enqueued_at: self.enqueued_at,
            retry_count: self.retry_count,
        })
    }
}
