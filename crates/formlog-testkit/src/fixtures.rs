//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use formlog::Dispatcher;
use formlog_core::events::memory::RecordingSink;
use formlog_core::Document;
use formlog_store::{Log, MemoryLog, RecordStore, SqliteLog, StoreConfig};
use serde_json::{json, Value};
use tempfile::TempDir;

/// An on-disk data directory that is removed when the fixture drops.
///
/// Every store opened through the fixture shares the directory, which is
/// how multi-process scenarios (writer plus read-only followers) are
/// simulated inside one test.
pub struct TestFixture {
    pub dir: TempDir,
    pub config: StoreConfig,
    pub events: Arc<RecordingSink>,
}

impl TestFixture {
    /// Create a fixture backed by a fresh temporary directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let config = StoreConfig::default().data_dir(dir.path());
        Self {
            dir,
            config,
            events: Arc::new(RecordingSink::new()),
        }
    }

    /// Open a store on the fixture's directory.
    pub async fn open_store(&self) -> RecordStore<SqliteLog> {
        RecordStore::open(&self.config, self.events.clone())
            .await
            .expect("failed to open store")
    }

    /// Open a dispatcher on the fixture's directory.
    pub async fn dispatcher(&self) -> Dispatcher<SqliteLog> {
        Dispatcher::new(Arc::new(self.open_store().await), self.events.clone())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A dispatcher over a fresh in-memory log, plus the sink it reports to.
pub async fn memory_dispatcher() -> (Dispatcher<MemoryLog>, Arc<RecordingSink>) {
    dispatcher_over(MemoryLog::new()).await
}

/// A dispatcher over any log, plus the sink it reports to.
pub async fn dispatcher_over<L: Log + 'static>(log: L) -> (Dispatcher<L>, Arc<RecordingSink>) {
    let events = Arc::new(RecordingSink::new());
    let store = RecordStore::with_log(log, events.clone())
        .await
        .expect("failed to wrap log");
    (Dispatcher::new(Arc::new(store), events.clone()), events)
}

/// A valid submission payload.
pub fn submission(username: &str, description: &str) -> Value {
    json!({ "username": username, "description": description })
}

/// A valid document.
pub fn document(username: &str) -> Document {
    Document::try_from(submission(username, "submitted by a test"))
        .expect("fixture document is valid")
}
