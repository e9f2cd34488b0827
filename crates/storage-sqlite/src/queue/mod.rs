//! Durable sync queue storage.

mod model;
mod repository;

pub use model::{NewSyncQueueEntryDB, SyncQueueEntryDB};
pub use repository::{
    enqueue_operation, has_pending_entries, remove_entry_tx, CorruptQueueEntry, QueueSnapshot,
    SyncQueueRepository,
};
