//! SQLite implementation of the Quillpad local durable store and offline
//! write layer.
//!
//! Reads go through an r2d2 pool; every mutation goes through a single
//! writer actor that wraps the entity change and its sync queue entry in
//! one immediate transaction, so the local store and the queue can never
//! diverge.

pub mod db;
pub mod errors;
pub mod links;
pub mod notes;
pub mod queue;
pub mod schema;
pub mod tags;

pub use db::{get_connection, DbPool, LocalStore, WriteHandle};
pub use errors::StorageError;
pub use links::LinkRepository;
pub use notes::NoteRepository;
pub use queue::{enqueue_operation, QueueSnapshot, SyncQueueRepository};
pub use tags::TagRepository;
