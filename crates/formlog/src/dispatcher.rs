//! The command dispatcher: one entry point for every transport.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use formlog_core::{validate, Event, EventSink};
use formlog_store::{Log, RecordStore, SqliteLog, StoreConfig, StoreError};
use serde_json::Value;

use crate::action::Action;
use crate::envelope::{Envelope, Failure, Payload};
use crate::error::{DispatchError, Result};

/// Routes `(action, payload, correlation id)` to the record store and
/// wraps the outcome in an [`Envelope`].
///
/// Holds only shared handles, so clones are cheap and every transport in a
/// process can use the same store through its own clone.
pub struct Dispatcher<L: Log + 'static> {
    store: Arc<RecordStore<L>>,
    events: Arc<dyn EventSink>,
}

impl<L: Log + 'static> Clone for Dispatcher<L> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            events: Arc::clone(&self.events),
        }
    }
}

impl Dispatcher<SqliteLog> {
    /// Open the SQLite-backed store and wrap it.
    pub async fn open(config: &StoreConfig, events: Arc<dyn EventSink>) -> Result<Self> {
        let store = RecordStore::open(config, Arc::clone(&events)).await?;
        Ok(Self::new(Arc::new(store), events))
    }
}

impl<L: Log + 'static> Dispatcher<L> {
    /// Dispatch against `store`, reporting each request to `events`.
    pub fn new(store: Arc<RecordStore<L>>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    /// The shared store.
    pub fn store(&self) -> &Arc<RecordStore<L>> {
        &self.store
    }

    /// Run one action.
    ///
    /// Never fails: every error, including a panic inside the action,
    /// becomes a failure envelope. The action runs in its own task, so it
    /// completes even if the caller stops waiting.
    pub async fn dispatch(&self, action: &str, payload: Value, correlation_id: Value) -> Envelope {
        let started = Instant::now();

        let outcome = match action.parse::<Action>() {
            Ok(action) => {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move { run(&store, action, payload).await })
                    .await
                    .unwrap_or_else(|join| Err(DispatchError::Internal(describe_join(join))))
            }
            Err(err) => Err(err),
        };

        let envelope = Envelope::new(correlation_id, outcome.map_err(Failure::from));

        self.events.emit(&Event::Dispatched {
            action: action.to_string(),
            success: envelope.success(),
            error_kind: envelope.error_kind(),
            elapsed: started.elapsed(),
        });

        envelope
    }
}

async fn run<L: Log>(store: &RecordStore<L>, action: Action, payload: Value) -> Result<Payload> {
    match action {
        Action::Submit => {
            // Invalid documents never reach the store.
            let document = validate(payload).into_document()?;
            let record = store.append(document).await?;
            Ok(Payload::Submitted {
                total_records: store.length(),
                record,
            })
        }
        Action::GetRecords => {
            let records = store.enumerate().await?;
            Ok(Payload::Records {
                total_records: records.len() as u64,
                records,
            })
        }
        Action::GetRecord => {
            let requested = match payload {
                Value::Object(mut map) => map.remove("index").unwrap_or(Value::Null),
                other => other,
            };

            match (requested.as_u64(), requested.as_i64()) {
                (Some(index), _) => Ok(Payload::Record(store.get(index).await?)),
                (None, Some(negative)) => Err(StoreError::IndexOutOfRange {
                    index: negative,
                    length: store.length(),
                }
                .into()),
                (None, None) => Err(DispatchError::Malformed(format!(
                    "getRecord expects an integer index, got {}",
                    requested
                ))),
            }
        }
        Action::GetInfo => Ok(Payload::Info(store.info().await?)),
    }
}

fn describe_join(err: tokio::task::JoinError) -> String {
    if err.is_panic() {
        format!("action panicked: {}", panic_message(err.into_panic()))
    } else {
        "action was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    }
}
