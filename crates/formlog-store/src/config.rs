//! Store configuration.

use std::path::PathBuf;

/// File name of the SQLite log inside the data directory.
pub const LOG_FILE: &str = "records.db";

/// File name of the writer lease inside the data directory.
pub const LEASE_FILE: &str = "writer.lock";

/// Configuration for opening a [`RecordStore`](crate::RecordStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the log and the writer lease. Created on open.
    pub data_dir: PathBuf,
    /// Consecutive log failures before the store enters the failed state.
    pub max_consecutive_failures: u32,
    /// Whether to compete for the writer lease. When false the store is
    /// writable unconditionally and the caller guarantees a single writer.
    pub acquire_writer_lease: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./storage/formlog"),
            max_consecutive_failures: crate::record_store::DEFAULT_MAX_CONSECUTIVE_FAILURES,
            acquire_writer_lease: true,
        }
    }
}

impl StoreConfig {
    /// Set the data directory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the failure threshold. Zero is treated as one.
    pub fn max_consecutive_failures(mut self, n: u32) -> Self {
        self.max_consecutive_failures = n;
        self
    }

    /// Enable or disable the writer lease.
    pub fn acquire_writer_lease(mut self, acquire: bool) -> Self {
        self.acquire_writer_lease = acquire;
        self
    }

    /// Path of the SQLite log file.
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }

    /// Path of the writer lease file.
    pub fn lease_path(&self) -> PathBuf {
        self.data_dir.join(LEASE_FILE)
    }
}
