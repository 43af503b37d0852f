//! The record store: index assignment, serialized appends, and reads over
//! a [`Log`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use formlog_core::{Document, Event, EventSink, LogInfo, Record};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::lease::WriterLease;
use crate::sqlite::SqliteLog;
use crate::traits::Log;

/// Default number of consecutive log failures tolerated before failing.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Lifecycle state of a record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Serving reads and (if writable) appends.
    Open,
    /// The log kept failing. Every operation reports `StoreUnavailable`
    /// until the process restarts.
    Failed,
}

#[derive(Debug)]
struct Health {
    state: StoreState,
    consecutive_failures: u32,
    last_error: Option<String>,
}

/// Validated, append-only record storage over a log.
///
/// # Concurrency
///
/// Appends are serialized by an internal async mutex, so the index handed
/// out is always the current length. Reads never take that mutex; they see
/// a record only after its append has been confirmed by the log and the
/// length has been published.
///
/// An append that has started writing must be allowed to finish. Callers
/// that may be cancelled should run it in a spawned task.
pub struct RecordStore<L: Log> {
    log: L,
    /// Published length. Only moves forward.
    length: AtomicU64,
    write_lock: tokio::sync::Mutex<()>,
    health: Mutex<Health>,
    max_consecutive_failures: u32,
    events: Arc<dyn EventSink>,
    _lease: Option<WriterLease>,
}

impl RecordStore<SqliteLog> {
    /// Open the SQLite-backed store described by `config`.
    ///
    /// Creates the data directory if needed and competes for the writer
    /// lease. Losing the lease is not an error: the store opens read-only.
    pub async fn open(config: &StoreConfig, events: Arc<dyn EventSink>) -> Result<Self> {
        let cfg = config.clone();
        let (log, lease, denied) = tokio::task::spawn_blocking(move || -> Result<_> {
            std::fs::create_dir_all(&cfg.data_dir)?;

            let (lease, writable, denied) = if cfg.acquire_writer_lease {
                match WriterLease::try_acquire(cfg.lease_path())? {
                    Some(lease) => (Some(lease), true, false),
                    None => (None, false, true),
                }
            } else {
                (None, true, false)
            };

            let log = SqliteLog::open(cfg.log_path(), writable)?;
            Ok((log, lease, denied))
        })
        .await
        .map_err(|e| StoreError::Task(format!("open task failed: {}", e)))??;

        if denied {
            events.emit(&Event::LeaseDenied {
                path: config.lease_path().display().to_string(),
            });
        }

        let mut store = Self::with_log(log, events)
            .await?
            .with_failure_threshold(config.max_consecutive_failures);
        store._lease = lease;
        Ok(store)
    }
}

impl<L: Log> RecordStore<L> {
    /// Wrap an already-opened log.
    pub async fn with_log(log: L, events: Arc<dyn EventSink>) -> Result<Self> {
        let length = log.length().await?;

        events.emit(&Event::StoreOpened {
            identity: log.identity().to_string(),
            length,
            writable: log.is_writable(),
        });

        Ok(Self {
            log,
            length: AtomicU64::new(length),
            write_lock: tokio::sync::Mutex::new(()),
            health: Mutex::new(Health {
                state: StoreState::Open,
                consecutive_failures: 0,
                last_error: None,
            }),
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            events,
            _lease: None,
        })
    }

    /// Set how many consecutive log failures move the store to `Failed`.
    pub fn with_failure_threshold(mut self, n: u32) -> Self {
        self.max_consecutive_failures = n.max(1);
        self
    }

    /// The underlying log.
    pub fn log(&self) -> &L {
        &self.log
    }

    /// Whether this instance may append.
    pub fn is_writable(&self) -> bool {
        self.log.is_writable()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StoreState {
        self.health().state
    }

    /// Number of records visible to readers. No I/O.
    pub fn length(&self) -> u64 {
        self.length.load(Ordering::Acquire)
    }

    /// Append a validated document.
    ///
    /// The record's index is the length just before the append and its
    /// timestamp is the current UTC time. On error nothing becomes visible
    /// and the length is unchanged.
    pub async fn append(&self, document: Document) -> Result<Record> {
        self.ensure_open()?;
        if !self.log.is_writable() {
            return Err(StoreError::ReadOnly(
                "another process holds the writer lease".into(),
            ));
        }

        let _guard = self.write_lock.lock().await;
        // The store may have failed while we waited.
        self.ensure_open()?;

        let index = self.length.load(Ordering::Acquire);
        let record = Record {
            index,
            timestamp: now_timestamp(),
            document,
        };
        let encoded =
            serde_json::to_vec(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let bytes = encoded.len();

        match self.log.append(Bytes::from(encoded)).await {
            Ok(written) if written == index => {
                self.length.store(index + 1, Ordering::Release);
                self.record_success();
                self.events.emit(&Event::Appended { index, bytes });
                Ok(record)
            }
            Ok(written) => {
                let err = StoreError::OutOfSync {
                    expected: index,
                    actual: written,
                };
                self.events.emit(&Event::AppendFailed {
                    index,
                    error: err.to_string(),
                });
                self.fail(&err);
                Err(err)
            }
            Err(err) => {
                self.events.emit(&Event::AppendFailed {
                    index,
                    error: err.to_string(),
                });
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    /// Fetch the record at `index`.
    pub async fn get(&self, index: u64) -> Result<Record> {
        self.ensure_open()?;

        let mut length = self.length();
        if index >= length && !self.log.is_writable() {
            length = self.refresh().await?;
        }
        if index >= length {
            return Err(StoreError::IndexOutOfRange {
                index: i64::try_from(index).unwrap_or(i64::MAX),
                length,
            });
        }

        let result: Result<Record> = async {
            let bytes = self
                .log
                .read_at(index)
                .await?
                .ok_or_else(|| StoreError::Corrupt {
                    index,
                    reason: "entry missing below published length".into(),
                })?;
            decode(index, &bytes)
        }
        .await;

        self.read_outcome(result)
    }

    /// Every record in index order, as of a single length snapshot.
    pub async fn enumerate(&self) -> Result<Vec<Record>> {
        self.ensure_open()?;
        let snapshot = self.current_length().await?;

        let result: Result<Vec<Record>> = async {
            let entries = self.log.read_range(0, snapshot).await?;
            if entries.len() as u64 != snapshot {
                return Err(StoreError::Corrupt {
                    index: entries.len() as u64,
                    reason: format!("expected {} entries, log returned {}", snapshot, entries.len()),
                });
            }

            entries
                .iter()
                .enumerate()
                .map(|(expected, (index, bytes))| {
                    if *index != expected as u64 {
                        return Err(StoreError::Corrupt {
                            index: expected as u64,
                            reason: format!("gap in log, found index {}", index),
                        });
                    }
                    decode(*index, bytes)
                })
                .collect::<Result<Vec<_>>>()
        }
        .await;

        self.read_outcome(result)
    }

    /// Metadata snapshot.
    pub async fn info(&self) -> Result<LogInfo> {
        self.ensure_open()?;
        let length = self.current_length().await?;
        let byte_size = self.read_outcome(self.log.byte_size().await)?;

        Ok(LogInfo {
            identity: self.log.identity().to_string(),
            length,
            byte_size,
            writable: self.log.is_writable(),
        })
    }

    /// Length as readers should see it right now.
    ///
    /// A writable store is the only writer, so its cache is authoritative.
    /// A read-only store asks the log so it observes the writer's appends.
    async fn current_length(&self) -> Result<u64> {
        if self.log.is_writable() {
            Ok(self.length())
        } else {
            self.refresh().await
        }
    }

    async fn refresh(&self) -> Result<u64> {
        let observed = self.read_outcome(self.log.length().await)?;
        let previous = self.length.fetch_max(observed, Ordering::AcqRel);
        Ok(previous.max(observed))
    }

    fn ensure_open(&self) -> Result<()> {
        let health = self.health();
        match health.state {
            StoreState::Open => Ok(()),
            StoreState::Failed => Err(StoreError::Unavailable(
                health
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "store failed".into()),
            )),
        }
    }

    fn read_outcome<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.events.emit(&Event::ReadFailed {
                    error: err.to_string(),
                });
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    fn record_success(&self) {
        let mut health = self.health();
        if health.state == StoreState::Open {
            health.consecutive_failures = 0;
        }
    }

    fn record_failure(&self, err: &StoreError) {
        if !err.is_log_failure() {
            return;
        }

        let mut health = self.health();
        if health.state == StoreState::Failed {
            return;
        }
        health.consecutive_failures += 1;
        health.last_error = Some(err.to_string());

        if health.consecutive_failures >= self.max_consecutive_failures {
            health.state = StoreState::Failed;
            let consecutive_failures = health.consecutive_failures;
            drop(health);
            self.events.emit(&Event::StoreFailed {
                consecutive_failures,
                error: err.to_string(),
            });
        }
    }

    /// Move straight to `Failed`, regardless of the counter.
    fn fail(&self, err: &StoreError) {
        let mut health = self.health();
        if health.state == StoreState::Failed {
            return;
        }
        health.state = StoreState::Failed;
        health.consecutive_failures += 1;
        health.last_error = Some(err.to_string());
        let consecutive_failures = health.consecutive_failures;
        drop(health);

        self.events.emit(&Event::StoreFailed {
            consecutive_failures,
            error: err.to_string(),
        });
    }

    fn health(&self) -> MutexGuard<'_, Health> {
        // Health holds plain values; a panic mid-update cannot leave it torn.
        self.health
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn decode(index: u64, bytes: &[u8]) -> Result<Record> {
    let record: Record = serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        index,
        reason: e.to_string(),
    })?;

    if record.index != index {
        return Err(StoreError::Corrupt {
            index,
            reason: format!("entry claims index {}", record.index),
        });
    }
    Ok(record)
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;
    use formlog_core::events::memory::RecordingSink;
    use formlog_core::{ErrorKind, NoopSink};
    use serde_json::json;

    use super::*;
    use crate::memory::MemoryLog;

    fn doc(username: &str) -> Document {
        Document::try_from(json!({"username": username, "description": "test"})).unwrap()
    }

    /// Wraps a memory log and fails every operation while `failing` is set.
    struct FlakyLog {
        inner: MemoryLog,
        failing: AtomicBool,
    }

    impl FlakyLog {
        fn new() -> Self {
            Self {
                inner: MemoryLog::new(),
                failing: AtomicBool::new(false),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk on fire",
                )))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Log for FlakyLog {
        async fn append(&self, entry: Bytes) -> Result<u64> {
            self.check()?;
            self.inner.append(entry).await
        }

        async fn read_at(&self, index: u64) -> Result<Option<Bytes>> {
            self.check()?;
            self.inner.read_at(index).await
        }

        async fn read_range(&self, start: u64, end: u64) -> Result<Vec<(u64, Bytes)>> {
            self.check()?;
            self.inner.read_range(start, end).await
        }

        async fn length(&self) -> Result<u64> {
            self.check()?;
            self.inner.length().await
        }

        async fn byte_size(&self) -> Result<u64> {
            self.check()?;
            self.inner.byte_size().await
        }

        fn identity(&self) -> &str {
            self.inner.identity()
        }

        fn is_writable(&self) -> bool {
            self.inner.is_writable()
        }
    }

    #[tokio::test]
    async fn test_append_then_get() {
        let sink = Arc::new(RecordingSink::new());
        let store = RecordStore::with_log(MemoryLog::new(), sink.clone())
            .await
            .unwrap();

        let first = store.append(doc("alice")).await.unwrap();
        let second = store.append(doc("bob")).await.unwrap();

        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_eq!(store.length(), 2);
        assert_eq!(store.get(0).await.unwrap(), first);
        assert_eq!(store.get(1).await.unwrap().document.username(), "bob");
        assert!(first.timestamp.ends_with('Z'));

        assert_eq!(sink.count(|e| matches!(e, Event::Appended { .. })), 2);
        assert_eq!(sink.count(|e| matches!(e, Event::StoreOpened { .. })), 1);
    }

    #[tokio::test]
    async fn test_get_out_of_range() {
        let store = RecordStore::with_log(MemoryLog::new(), Arc::new(NoopSink))
            .await
            .unwrap();
        store.append(doc("alice")).await.unwrap();

        let err = store.get(1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
        assert!(matches!(
            err,
            StoreError::IndexOutOfRange {
                index: 1,
                length: 1
            }
        ));
        assert_eq!(store.state(), StoreState::Open);
    }

    #[tokio::test]
    async fn test_concurrent_appends_get_distinct_indices() {
        let store = Arc::new(
            RecordStore::with_log(MemoryLog::new(), Arc::new(NoopSink))
                .await
                .unwrap(),
        );

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.append(doc(&format!("user{}", i))).await })
            })
            .collect();

        let mut indices = Vec::new();
        for handle in handles {
            indices.push(handle.await.unwrap().unwrap().index);
        }
        indices.sort_unstable();

        assert_eq!(indices, (0..32).collect::<Vec<u64>>());
        assert_eq!(store.length(), 32);
        assert_eq!(store.enumerate().await.unwrap().len(), 32);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_enumerate_during_appends_sees_contiguous_prefixes() {
        let store = Arc::new(
            RecordStore::with_log(MemoryLog::new(), Arc::new(NoopSink))
                .await
                .unwrap(),
        );
        let total = 64u64;

        let writers: Vec<_> = (0..total)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.append(doc(&format!("user{}", i))).await })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut last_len = 0u64;
                let mut last_info = 0u64;
                loop {
                    let records = store.enumerate().await.unwrap();
                    let len = records.len() as u64;
                    assert!(len >= last_len, "enumerate shrank from {} to {}", last_len, len);
                    assert!(len <= store.length());
                    for (i, record) in records.iter().enumerate() {
                        assert_eq!(record.index, i as u64);
                    }
                    last_len = len;

                    let info = store.info().await.unwrap();
                    assert!(info.length >= last_info);
                    assert!(info.length <= store.length());
                    last_info = info.length;

                    if len == total {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        for writer in writers {
            writer.await.unwrap().unwrap();
        }
        reader.await.unwrap();
        assert_eq!(store.enumerate().await.unwrap().len() as u64, total);
    }

    #[tokio::test]
    async fn test_enumerate_is_ordered() {
        let store = RecordStore::with_log(MemoryLog::new(), Arc::new(NoopSink))
            .await
            .unwrap();
        for name in ["a", "b", "c"] {
            store.append(doc(name)).await.unwrap();
        }

        let records = store.enumerate().await.unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.document.username()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(records.iter().enumerate().all(|(i, r)| r.index == i as u64));
    }

    #[tokio::test]
    async fn test_read_only_store_rejects_append() {
        let store = RecordStore::with_log(MemoryLog::read_only(), Arc::new(NoopSink))
            .await
            .unwrap();

        let err = store.append(doc("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::ReadOnly(_)));
        assert_eq!(err.kind(), ErrorKind::PersistenceError);
        assert_eq!(store.length(), 0);
        assert_eq!(store.state(), StoreState::Open);
        assert!(!store.info().await.unwrap().writable);
    }

    #[tokio::test]
    async fn test_repeated_failures_fail_the_store() {
        let sink = Arc::new(RecordingSink::new());
        let store = RecordStore::with_log(FlakyLog::new(), sink.clone())
            .await
            .unwrap()
            .with_failure_threshold(3);

        store.append(doc("before")).await.unwrap();
        store.log().set_failing(true);

        for _ in 0..3 {
            let err = store.append(doc("x")).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PersistenceError);
        }
        assert_eq!(store.state(), StoreState::Failed);
        assert_eq!(store.length(), 1);

        store.log().set_failing(false);
        let err = store.get(0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        let err = store.append(doc("after")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);

        assert_eq!(sink.count(|e| matches!(e, Event::StoreFailed { .. })), 1);
        assert_eq!(sink.count(|e| matches!(e, Event::AppendFailed { .. })), 3);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let store = RecordStore::with_log(FlakyLog::new(), Arc::new(NoopSink))
            .await
            .unwrap()
            .with_failure_threshold(2);

        store.append(doc("a")).await.unwrap();
        for _ in 0..3 {
            store.log().set_failing(true);
            assert!(store.get(0).await.is_err());
            store.log().set_failing(false);
            store.get(0).await.unwrap();
        }

        assert_eq!(store.state(), StoreState::Open);
    }

    #[tokio::test]
    async fn test_open_persists_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default().data_dir(dir.path());

        let (identity, record) = {
            let store = RecordStore::open(&config, Arc::new(NoopSink)).await.unwrap();
            assert!(store.is_writable());
            let record = store.append(doc("alice")).await.unwrap();
            (store.info().await.unwrap().identity, record)
        };

        let store = RecordStore::open(&config, Arc::new(NoopSink)).await.unwrap();
        assert_eq!(store.length(), 1);
        assert_eq!(store.get(0).await.unwrap(), record);
        assert_eq!(store.info().await.unwrap().identity, identity);
        assert_eq!(store.append(doc("bob")).await.unwrap().index, 1);
    }

    #[tokio::test]
    async fn test_second_store_is_read_only_and_sees_appends() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default().data_dir(dir.path());

        let writer = RecordStore::open(&config, Arc::new(NoopSink)).await.unwrap();
        let sink = Arc::new(RecordingSink::new());
        let reader = RecordStore::open(&config, sink.clone()).await.unwrap();

        assert!(writer.is_writable());
        assert!(!reader.is_writable());
        assert_eq!(sink.count(|e| matches!(e, Event::LeaseDenied { .. })), 1);

        writer.append(doc("alice")).await.unwrap();

        let records = reader.enumerate().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(reader.get(0).await.unwrap().document.username(), "alice");

        let info = reader.info().await.unwrap();
        assert_eq!(info.length, 1);
        assert!(!info.writable);
        assert_eq!(info.identity, writer.info().await.unwrap().identity);

        assert!(matches!(
            reader.append(doc("mallory")).await,
            Err(StoreError::ReadOnly(_))
        ));
    }

    #[tokio::test]
    async fn test_lease_can_be_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default()
            .data_dir(dir.path())
            .acquire_writer_lease(false);

        let store = RecordStore::open(&config, Arc::new(NoopSink)).await.unwrap();
        assert!(store.is_writable());
        assert!(!config.lease_path().exists());
    }
}
