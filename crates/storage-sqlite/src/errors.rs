//! Storage error types and their conversion into the core error.

use quillpad_core::errors::{DatabaseError, Error};
use thiserror::Error;

/// Errors raised inside the SQLite storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Stored value is malformed: {0}")]
    Corrupt(String),

    #[error("Write actor unavailable: {0}")]
    WriterGone(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Query(e) => Error::Database(DatabaseError::Query(e.to_string())),
            StorageError::Pool(e) => Error::Database(DatabaseError::Pool(e.to_string())),
            StorageError::Migration(message) => Error::Database(DatabaseError::Migration(message)),
            StorageError::Corrupt(message) | StorageError::WriterGone(message) => {
                Error::Database(DatabaseError::Internal(message))
            }
        }
    }
}
