//! Database pool, per-user store lifecycle, and the serialized write actor.

use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use tokio::sync::oneshot;

use quillpad_core::errors::{DatabaseError, Error, Result};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const SQLITE_PRAGMAS: &str =
    "PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(SQLITE_PRAGMAS)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Check out a read connection from the pool.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    pool.get()
        .map_err(|e| Error::Database(DatabaseError::Pool(e.to_string())))
}

/// Store an enum as its serde identifier (e.g. `SyncStatus::Pending` -> "pending").
pub(crate) fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

pub(crate) fn enum_from_db<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}

type WriteJob = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

enum TxError {
    App(Error),
    Db(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        TxError::Db(err)
    }
}

/// Handle to the single-writer actor. Every job runs inside an immediate
/// transaction on a dedicated connection, so an entity mutation and its
/// queue entry commit or roll back together.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<WriteJob>,
}

impl WriteHandle {
    fn spawn(database_url: &str) -> Result<Self> {
        let mut conn = SqliteConnection::establish(database_url)
            .map_err(|e| Error::Database(DatabaseError::Pool(e.to_string())))?;
        conn.batch_execute(SQLITE_PRAGMAS)
            .map_err(|e| Error::Database(DatabaseError::Query(e.to_string())))?;

        let (tx, rx) = mpsc::channel::<WriteJob>();
        thread::Builder::new()
            .name("quillpad-writer".to_string())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    job(&mut conn);
                }
            })
            .map_err(|e| {
                Error::Database(DatabaseError::Internal(format!(
                    "Failed to spawn writer thread: {e}"
                )))
            })?;

        Ok(Self { tx })
    }

    /// Run `job` inside an immediate transaction on the writer connection.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel::<Result<T>>();
        let wrapped: WriteJob = Box::new(move |conn| {
            let outcome = conn
                .immediate_transaction::<T, TxError, _>(|tx_conn| {
                    job(tx_conn).map_err(TxError::App)
                })
                .map_err(|err| match err {
                    TxError::App(e) => e,
                    TxError::Db(e) => Error::Database(DatabaseError::Query(e.to_string())),
                });
            let _ = done_tx.send(outcome);
        });

        self.tx.send(wrapped).map_err(|_| {
            Error::Database(DatabaseError::Internal("Write actor is gone".to_string()))
        })?;
        done_rx.await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Write actor dropped the job".to_string(),
            ))
        })?
    }
}

/// The per-user local store. Owns the read pool and the write actor;
/// `destroy` additionally deletes the on-disk database so no data survives
/// for the next account on this device.
pub struct LocalStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    db_path: PathBuf,
}

impl LocalStore {
    /// Open (or create) the store for `user_id` under `data_dir`, running
    /// pending migrations. One instance per authenticated user.
    pub fn open(data_dir: &Path, user_id: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| {
            Error::Database(DatabaseError::Internal(format!(
                "Failed to create data dir: {e}"
            )))
        })?;
        let db_path = data_dir.join(format!("quillpad-{}.db", sanitize_user_id(user_id)));
        let database_url = db_path.to_string_lossy().to_string();

        let manager = ConnectionManager::<SqliteConnection>::new(&database_url);
        let pool = Pool::builder()
            .max_size(4)
            .connection_customizer(Box::new(SqlitePragmas))
            .build(manager)
            .map_err(|e| Error::Database(DatabaseError::Pool(e.to_string())))?;

        {
            let mut conn = get_connection(&pool)?;
            conn.run_pending_migrations(MIGRATIONS)
                .map_err(|e| Error::Database(DatabaseError::Migration(e.to_string())))?;
        }

        let writer = WriteHandle::spawn(&database_url)?;
        log::debug!("[Store] Opened local store at {}", db_path.display());
        Ok(Self {
            pool: Arc::new(pool),
            writer,
            db_path,
        })
    }

    pub fn pool(&self) -> Arc<DbPool> {
        Arc::clone(&self.pool)
    }

    pub fn writer(&self) -> WriteHandle {
        self.writer.clone()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Tear the store down and delete the database file plus its WAL
    /// siblings. Used on logout.
    pub fn destroy(self) -> Result<()> {
        let LocalStore {
            pool,
            writer,
            db_path,
        } = self;
        drop(writer);
        drop(pool);

        for suffix in ["", "-wal", "-shm"] {
            let mut path = db_path.clone().into_os_string();
            path.push(suffix);
            let path = PathBuf::from(path);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::Database(DatabaseError::Internal(format!(
                        "Failed to delete {}: {e}",
                        path.display()
                    ))));
                }
            }
        }
        log::info!("[Store] Destroyed local store at {}", db_path.display());
        Ok(())
    }
}

fn sanitize_user_id(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillpad_core::sync::SyncStatus;

    #[test]
    fn enum_identifiers_round_trip() {
        let stored = enum_to_db(&SyncStatus::Pending).expect("to db");
        assert_eq!(stored, "pending");
        let back: SyncStatus = enum_from_db(&stored).expect("from db");
        assert_eq!(back, SyncStatus::Pending);
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let result: Result<SyncStatus> = enum_from_db("definitely_not_a_status");
        assert!(result.is_err());
    }

    #[test]
    fn user_ids_are_sanitized_for_filenames() {
        assert_eq!(sanitize_user_id("user../1"), "user___1");
        assert_eq!(sanitize_user_id("abc-123"), "abc-123");
    }
}
