//! Shared error types used across the Quillpad crates.

use thiserror::Error;

/// Result type alias for Quillpad operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the local store, the write layer, and the sync engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Local storage failure
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// A mutation targeted an entity absent from the local store
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An ordinary edit targeted an entity with an unresolved conflict
    #[error("note {0} has an unresolved conflict")]
    UnresolvedConflict(String),

    /// The remote store rejected an operation the engine could not queue
    #[error("Remote store error: {0}")]
    Remote(String),

    /// Input rejected before it reached storage
    #[error("Validation error: {0}")]
    Validation(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Local storage failure classes.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Create a `NotFound` error for the given entity kind and id.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}
