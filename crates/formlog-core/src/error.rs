//! Error types for formlog Core.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::FieldError;

/// A document failed schema validation.
///
/// Carries every violation found, in deterministic field order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", join_field_errors(.0))]
pub struct ValidationError(pub Vec<FieldError>);

impl ValidationError {
    /// The individual field violations.
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Whether any violation concerns `field`.
    pub fn mentions(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The error taxonomy surfaced to callers in every failure envelope.
///
/// Serializes as the variant name (e.g. `"IndexOutOfRange"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Payload fails the schema. Never fatal.
    ValidationError,
    /// Read index outside `0..length`.
    IndexOutOfRange,
    /// The underlying log rejected a read or write.
    PersistenceError,
    /// The store is in the failed state until restart.
    StoreUnavailable,
    /// Dispatcher routing miss.
    UnknownAction,
    /// A transport could not decode the request.
    MalformedRequest,
    /// HTTP route does not exist.
    NotFound,
    /// An action panicked or otherwise failed unexpectedly.
    Internal,
}

impl ErrorKind {
    /// The wire name of this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::IndexOutOfRange => "IndexOutOfRange",
            ErrorKind::PersistenceError => "PersistenceError",
            ErrorKind::StoreUnavailable => "StoreUnavailable",
            ErrorKind::UnknownAction => "UnknownAction",
            ErrorKind::MalformedRequest => "MalformedRequest",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
