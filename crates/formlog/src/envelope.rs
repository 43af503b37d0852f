//! The response envelope shared by every transport.
//!
//! On the wire an envelope is a flat JSON object:
//!
//! ```text
//! { correlationId?, success: true,  record | records + totalRecords | info }
//! { correlationId?, success: false, errorKind, error, errors? }
//! ```
//!
//! The correlation key is `correlationId` by default. The pipe transport
//! writes it as `id` via [`Envelope::to_value_keyed`].

use formlog_core::{ErrorKind, FieldError, LogInfo, Record};
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::error::DispatchError;

/// Default key under which the correlation id is written.
pub const CORRELATION_KEY: &str = "correlationId";

/// The successful result of an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `submit`: the appended record and the length after it.
    Submitted { record: Record, total_records: u64 },
    /// `getRecords`.
    Records {
        records: Vec<Record>,
        total_records: u64,
    },
    /// `getRecord`.
    Record(Record),
    /// `getInfo`.
    Info(LogInfo),
}

/// A failed action.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    /// Non-empty only for validation failures.
    pub errors: Vec<FieldError>,
}

impl Failure {
    /// A failure of `kind` with a human-readable message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: Vec::new(),
        }
    }
}

impl From<DispatchError> for Failure {
    fn from(err: DispatchError) -> Self {
        Self {
            kind: err.kind(),
            errors: err.field_errors().to_vec(),
            message: err.to_string(),
        }
    }
}

/// A response, tagged with the caller's correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Echoed verbatim. `Value::Null` means none was supplied and the key
    /// is omitted.
    pub correlation_id: Value,
    pub outcome: Result<Payload, Failure>,
}

impl Envelope {
    /// Wrap an action outcome with the caller's correlation id.
    pub fn new(correlation_id: Value, outcome: Result<Payload, Failure>) -> Self {
        Self {
            correlation_id,
            outcome,
        }
    }

    /// A failure envelope produced outside the dispatcher (transport errors).
    pub fn failure(correlation_id: Value, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(correlation_id, Err(Failure::new(kind, message)))
    }

    /// Whether the action succeeded.
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The failure's kind, `None` on success.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.outcome.as_ref().err().map(|f| f.kind)
    }

    /// Encode with the correlation id under `correlationId`.
    pub fn to_value(&self) -> Value {
        self.to_value_keyed(CORRELATION_KEY)
    }

    /// Encode with the correlation id under `key`.
    pub fn to_value_keyed(&self, key: &str) -> Value {
        let mut map = Map::new();
        if !self.correlation_id.is_null() {
            map.insert(key.to_string(), self.correlation_id.clone());
        }
        map.insert("success".into(), Value::Bool(self.success()));

        match &self.outcome {
            Ok(Payload::Submitted {
                record,
                total_records,
            }) => {
                map.insert("record".into(), json!(record));
                map.insert("totalRecords".into(), json!(total_records));
            }
            Ok(Payload::Records {
                records,
                total_records,
            }) => {
                map.insert("records".into(), json!(records));
                map.insert("totalRecords".into(), json!(total_records));
            }
            Ok(Payload::Record(record)) => {
                map.insert("record".into(), json!(record));
            }
            Ok(Payload::Info(info)) => {
                map.insert("info".into(), json!(info));
            }
            Err(failure) => {
                map.insert("errorKind".into(), json!(failure.kind));
                map.insert("error".into(), Value::String(failure.message.clone()));
                if !failure.errors.is_empty() {
                    map.insert("errors".into(), json!(failure.errors));
                }
            }
        }

        Value::Object(map)
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
