//! SQLite schema versions for the record log.
//!
//! Each entry in [`MIGRATIONS`] moves the schema from the previous version
//! to its own. Applied versions are recorded in `schema_migrations`, so
//! opening an existing log only runs what it is missing.

use rusqlite::{params, Connection, Transaction};

use crate::error::{Result, StoreError};

/// `(version, sql)` in ascending order, starting at 1.
const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    r#"
    -- The append-only log. idx is 0-based and contiguous.
    CREATE TABLE entries (
        idx INTEGER PRIMARY KEY,
        data BLOB NOT NULL,               -- JSON-encoded record
        appended_at INTEGER NOT NULL      -- Unix ms, local clock
    );

    -- Per-log metadata; holds the identity nonce.
    CREATE TABLE log_meta (
        key TEXT PRIMARY KEY,
        value BLOB NOT NULL
    );
    "#,
)];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = MIGRATIONS[MIGRATIONS.len() - 1].0;

/// Bring the schema up to [`CURRENT_VERSION`].
///
/// Runs inside the caller's transaction, which must be IMMEDIATE so that
/// the version read and the DDL happen under one write lock. Idempotent.
pub fn migrate(tx: &Transaction<'_>) -> Result<()> {
    tx.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let applied = schema_version(tx)?;
    ensure_supported(applied)?;

    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > applied) {
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, chrono::Utc::now().timestamp_millis()],
        )?;
        tracing::debug!(version, "applied log schema migration");
    }

    Ok(())
}

/// Highest applied version, 0 for a fresh database. Never writes.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    let tracked: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations')",
        [],
        |row| row.get(0),
    )?;
    if !tracked {
        return Ok(0);
    }

    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?)
}

/// Refuse a log written by a newer build.
pub fn ensure_supported(version: u32) -> Result<()> {
    if version > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "log schema v{} is newer than supported v{}",
            version, CURRENT_VERSION
        )));
    }
    Ok(())
}
