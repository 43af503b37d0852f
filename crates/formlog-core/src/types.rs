//! Strong type definitions for formlog.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::validation::{validate, DESCRIPTION, GITHUB, USERNAME};

/// A submission that satisfies the schema.
///
/// Only constructible through validation, so holding a `Document` is proof
/// that `username` and `description` are non-empty strings and `github`,
/// if present, is a string. Extra fields are kept in their original order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub(crate) fn from_validated(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// The submitter's username.
    pub fn username(&self) -> &str {
        self.str_field(USERNAME).unwrap_or_default()
    }

    /// The free-text description.
    pub fn description(&self) -> &str {
        self.str_field(DESCRIPTION).unwrap_or_default()
    }

    /// The optional GitHub handle.
    pub fn github(&self) -> Option<&str> {
        self.str_field(GITHUB)
    }

    /// Look up any field, including unvalidated extras.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// All fields.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert back into a plain JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }
}

impl TryFrom<Value> for Document {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        validate(value).into_document()
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Document::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// A document durably appended to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Position in the log; equals the log length just before the append.
    pub index: u64,
    /// Append time, RFC 3339 in UTC with millisecond precision.
    pub timestamp: String,
    /// The stored submission.
    pub document: Document,
}

/// Metadata snapshot of a log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInfo {
    /// Opaque identifier, stable for the lifetime of the log.
    pub identity: String,
    /// Number of records.
    pub length: u64,
    /// Total encoded size of all entries. Informational only.
    pub byte_size: u64,
    /// Whether this process holds write capability.
    pub writable: bool,
}
