//! Error types for engine operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A key read by the transaction was changed by another commit.
    #[error("transaction conflict on key {}", hex::encode(.key))]
    Conflict {
        /// The key whose version changed.
        key: Vec<u8>,
    },

    /// The commit log is corrupted.
    #[error("engine corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Another handle holds the engine directory lock.
    #[error("engine locked: another handle has exclusive access")]
    Locked,

    /// The engine directory does not exist and creation was not requested.
    #[error("engine directory does not exist: {}", .path.display())]
    Missing {
        /// The requested directory.
        path: PathBuf,
    },

    /// The engine directory already holds data and `error_if_exists` is set.
    #[error("engine directory already exists: {}", .path.display())]
    AlreadyExists {
        /// The requested directory.
        path: PathBuf,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// The engine has been closed.
    #[error("engine is closed")]
    Closed,

    /// A failed commit left bytes in the log that could not be removed.
    ///
    /// The engine refuses further commits. Reopening it drops the partial
    /// record as a torn write.
    #[error("engine poisoned: partial commit could not be rolled back")]
    Poisoned,
}

impl EngineError {
    /// Creates a conflict error for `key`.
    pub fn conflict(key: &[u8]) -> Self {
        Self::Conflict { key: key.to_vec() }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns `true` if the error is a commit-time conflict.
    ///
    /// Conflicts leave no trace in the engine and the same operation may be
    /// attempted again.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_renders_hex_key() {
        let err = EngineError::conflict(&[0xde, 0xad]);
        assert_eq!(err.to_string(), "transaction conflict on key dead");
        assert!(err.is_conflict());
    }

    #[test]
    fn io_error_is_not_conflict() {
        let err = EngineError::from(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(!err.is_conflict());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn poisoned_is_not_conflict() {
        assert!(!EngineError::Poisoned.is_conflict());
    }
}
