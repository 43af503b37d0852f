//! SQLite implementation of the Log trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{log_identity, Log};

/// How long a statement waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based log implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteLog {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
    /// Derived from the nonce stored in `log_meta`.
    identity: String,
    /// Decided by the caller at open time (see `WriterLease`).
    writable: bool,
}

impl SqliteLog {
    /// Open a SQLite log at the given path.
    ///
    /// Creates the file and its schema if they don't exist. A log opened
    /// with `writable = false` rejects every append, and opening an
    /// already initialized log that way performs no writes.
    pub fn open(path: impl AsRef<Path>, writable: bool) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL is persistent in the file; only switch when it is not set yet.
        let mode: String = conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
        }
        conn.pragma_update(None, "synchronous", "FULL")?;
        Self::init(conn, writable)
    }

    /// Open an in-memory SQLite log.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, true)
    }

    fn init(mut conn: Connection, writable: bool) -> Result<Self> {
        let nonce = match initialized_nonce(&conn)? {
            Some(nonce) => nonce,
            None => bootstrap(&mut conn)?,
        };
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            identity: log_identity(&nonce),
            writable,
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(format!("sqlite connection: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

/// The nonce of a log whose schema is current. Read-only.
fn initialized_nonce(conn: &Connection) -> Result<Option<Vec<u8>>> {
    let version = migration::schema_version(conn)?;
    migration::ensure_supported(version)?;
    if version < migration::CURRENT_VERSION {
        return Ok(None);
    }
    stored_nonce(conn)
}

/// Create or upgrade the schema and the creation nonce.
///
/// Everything happens in one IMMEDIATE transaction, so when several
/// processes open a new log at once the first one initializes it and the
/// others wait on the lock, then find nothing left to do.
fn bootstrap(conn: &mut Connection) -> Result<Vec<u8>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    migration::migrate(&tx)?;

    let nonce = match stored_nonce(&tx)? {
        Some(nonce) => nonce,
        None => {
            let mut nonce = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut nonce);
            tx.execute(
                "INSERT INTO log_meta (key, value) VALUES ('nonce', ?1)",
                params![nonce.as_slice()],
            )?;
            nonce.to_vec()
        }
    };

    tx.commit()?;
    Ok(nonce)
}

fn stored_nonce(conn: &Connection) -> Result<Option<Vec<u8>>> {
    Ok(conn
        .query_row(
            "SELECT value FROM log_meta WHERE key = 'nonce'",
            [],
            |row| row.get(0),
        )
        .optional()?)
}

fn next_index(conn: &Connection) -> rusqlite::Result<u64> {
    conn.query_row("SELECT COALESCE(MAX(idx) + 1, 0) FROM entries", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as u64)
}

#[async_trait]
impl Log for SqliteLog {
    async fn append(&self, entry: Bytes) -> Result<u64> {
        if !self.writable {
            return Err(StoreError::ReadOnly(
                "sqlite log opened without the writer lease".into(),
            ));
        }

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let index = next_index(&tx)?;

            tx.execute(
                "INSERT INTO entries (idx, data, appended_at) VALUES (?1, ?2, ?3)",
                params![
                    index as i64,
                    entry.as_ref(),
                    chrono::Utc::now().timestamp_millis()
                ],
            )?;

            tx.commit()?;
            Ok(index)
        })
        .await
    }

    async fn read_at(&self, index: u64) -> Result<Option<Bytes>> {
        let Ok(idx) = i64::try_from(index) else {
            return Ok(None);
        };

        self.blocking(move |conn| {
            let data: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT data FROM entries WHERE idx = ?1",
                    params![idx],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(data.map(Bytes::from))
        })
        .await
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<(u64, Bytes)>> {
        let start = i64::try_from(start).unwrap_or(i64::MAX);
        let end = i64::try_from(end).unwrap_or(i64::MAX);

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT idx, data FROM entries WHERE idx >= ?1 AND idx < ?2 ORDER BY idx",
            )?;

            let entries = stmt
                .query_map(params![start, end], |row| {
                    let idx: i64 = row.get(0)?;
                    let data: Vec<u8> = row.get(1)?;
                    Ok((idx as u64, Bytes::from(data)))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(entries)
        })
        .await
    }

    async fn length(&self) -> Result<u64> {
        self.blocking(|conn| Ok(next_index(conn)?)).await
    }

    async fn byte_size(&self) -> Result<u64> {
        self.blocking(|conn| {
            let size: i64 = conn.query_row(
                "SELECT COALESCE(SUM(LENGTH(data)), 0) FROM entries",
                [],
                |row| row.get(0),
            )?;
            Ok(size as u64)
        })
        .await
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn is_writable(&self) -> bool {
        self.writable
    }
}
