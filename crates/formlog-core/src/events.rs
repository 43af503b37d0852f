//! Event reporting: the store and dispatcher announce every transition
//! through an injected [`EventSink`] instead of writing to the console.

use std::time::Duration;

use crate::error::ErrorKind;

/// A state transition worth reporting.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The store finished opening its log.
    StoreOpened {
        identity: String,
        length: u64,
        writable: bool,
    },
    /// Another process holds the writer lease; this instance is read-only.
    LeaseDenied { path: String },
    /// A record was durably appended.
    Appended { index: u64, bytes: usize },
    /// An append was rejected; nothing was written.
    AppendFailed { index: u64, error: String },
    /// A read from the underlying log failed.
    ReadFailed { error: String },
    /// The store gave up on its log and now refuses every operation.
    StoreFailed {
        consecutive_failures: u32,
        error: String,
    },
    /// The dispatcher answered a request.
    Dispatched {
        action: String,
        success: bool,
        error_kind: Option<ErrorKind>,
        elapsed: Duration,
    },
}

/// Receives events. Must be cheap and must not block.
pub trait EventSink: Send + Sync {
    /// Report a single event.
    fn emit(&self, event: &Event);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &Event) {}
}

/// Forwards events to `tracing` with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &Event) {
        match event {
            Event::StoreOpened {
                identity,
                length,
                writable,
            } => tracing::info!(%identity, length, writable, "record store opened"),
            Event::LeaseDenied { path } => {
                tracing::warn!(%path, "writer lease held elsewhere, opening read-only")
            }
            Event::Appended { index, bytes } => tracing::debug!(index, bytes, "record appended"),
            Event::AppendFailed { index, error } => {
                tracing::warn!(index, %error, "append failed")
            }
            Event::ReadFailed { error } => tracing::warn!(%error, "log read failed"),
            Event::StoreFailed {
                consecutive_failures,
                error,
            } => tracing::error!(consecutive_failures, %error, "record store failed"),
            Event::Dispatched {
                action,
                success,
                error_kind,
                elapsed,
            } => tracing::debug!(
                %action,
                success,
                error_kind = error_kind.map(|k| k.as_str()),
                elapsed_us = elapsed.as_micros() as u64,
                "dispatched"
            ),
        }
    }
}

/// An in-memory sink for tests.
pub mod memory {
    use std::sync::Mutex;

    use super::{Event, EventSink};

    /// Keeps every event it receives.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        /// Create an empty sink.
        pub fn new() -> Self {
            Self::default()
        }

        /// Snapshot of the events received so far.
        pub fn events(&self) -> Vec<Event> {
            self.events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        }

        /// Count the events matching a predicate.
        pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
            self.events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .iter()
                .filter(|e| predicate(e))
                .count()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: &Event) {
            self.events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(event.clone());
        }
    }
}
