//! Error types for the dispatcher.

use formlog_core::{ErrorKind, FieldError, ValidationError};
use formlog_store::StoreError;
use thiserror::Error;

/// Errors that can occur while dispatching an action.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The payload failed schema validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Storage error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No handler for this action name.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The payload has the wrong shape for the action.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// The action panicked or its task was aborted.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Map onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Validation(_) => ErrorKind::ValidationError,
            DispatchError::Store(e) => e.kind(),
            DispatchError::UnknownAction(_) => ErrorKind::UnknownAction,
            DispatchError::Malformed(_) => ErrorKind::MalformedRequest,
            DispatchError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Per-field violations, when this is a validation failure.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            DispatchError::Validation(e) => e.errors(),
            _ => &[],
        }
    }
}

/// Result type for dispatcher operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
