//! Error types for the store module.

use formlog_core::ErrorKind;
use thiserror::Error;

/// Errors that can occur during log and store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored entry could not be decoded or is missing.
    #[error("corrupt entry at index {index}: {reason}")]
    Corrupt { index: u64, reason: String },

    /// Read outside `0..length`.
    #[error("index {index} out of range (length {length})")]
    IndexOutOfRange { index: i64, length: u64 },

    /// This instance does not hold write capability.
    #[error("log is read-only: {0}")]
    ReadOnly(String),

    /// The log wrote at a different index than the store assigned.
    #[error("log out of sync: expected index {expected}, log wrote {actual}")]
    OutOfSync { expected: u64, actual: u64 },

    /// The store is in the failed state.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),

    /// A mutex guarding the connection was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StoreError {
    /// Map onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            StoreError::Unavailable(_) => ErrorKind::StoreUnavailable,
            _ => ErrorKind::PersistenceError,
        }
    }

    /// Whether this error says something about the health of the log.
    ///
    /// Caller mistakes (bad index, writing to a read-only instance) and the
    /// failed state itself do not count toward failing the store.
    pub fn is_log_failure(&self) -> bool {
        !matches!(
            self,
            StoreError::IndexOutOfRange { .. } | StoreError::ReadOnly(_) | StoreError::Unavailable(_)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let oob = StoreError::IndexOutOfRange {
            index: -1,
            length: 0,
        };
        assert_eq!(oob.kind(), ErrorKind::IndexOutOfRange);
        assert!(!oob.is_log_failure());

        let ro = StoreError::ReadOnly("lease held".into());
        assert_eq!(ro.kind(), ErrorKind::PersistenceError);
        assert!(!ro.is_log_failure());

        let corrupt = StoreError::Corrupt {
            index: 4,
            reason: "bad json".into(),
        };
        assert_eq!(corrupt.kind(), ErrorKind::PersistenceError);
        assert!(corrupt.is_log_failure());

        assert_eq!(
            StoreError::Unavailable("x".into()).kind(),
            ErrorKind::StoreUnavailable
        );
    }
}
