//! Writer lease: at most one process may append to a data directory.
//!
//! The lease is an exclusive SQLite lock on a small side file. SQLite's
//! `locking_mode=EXCLUSIVE` keeps the lock after the first write
//! transaction commits, so the open connection holds it until it is
//! dropped or the process exits, at which point the OS releases it.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, ErrorCode, TransactionBehavior};

use crate::error::Result;

/// Proof that this process is the single writer for a data directory.
#[derive(Debug)]
pub struct WriterLease {
    path: PathBuf,
    // Holding the connection holds the lock.
    _conn: Mutex<Connection>,
}

impl WriterLease {
    /// Try to take the lease without waiting.
    ///
    /// Returns `Ok(None)` when another connection already holds it.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        let mut conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::ZERO)?;

        match claim(&mut conn) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "writer lease acquired");
                Ok(Some(Self {
                    path,
                    _conn: Mutex::new(conn),
                }))
            }
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The lock file backing this lease.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn claim(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.pragma_update_and_check(None, "locking_mode", "EXCLUSIVE", |row| {
        row.get::<_, String>(0)
    })?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;
    tx.execute(
        "CREATE TABLE IF NOT EXISTS lease (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            pid INTEGER NOT NULL,
            acquired_at INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "INSERT OR REPLACE INTO lease (id, pid, acquired_at) VALUES (0, ?1, ?2)",
        params![std::process::id(), chrono::Utc::now().timestamp_millis()],
    )?;
    tx.commit()
}

fn is_contended(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}
