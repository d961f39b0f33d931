//! Error types for store operations.

use crate::codec::RecordError;
use refstore_engine::EngineError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by [`crate::RefStore`] operations.
///
/// A failed operation never commits anything: the entry is left exactly as it
/// was before the call.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No entry exists under the key.
    #[error("entry not found: {}", hex::encode(.key))]
    NotFound {
        /// The requested key.
        key: Vec<u8>,
    },

    /// A different value is already stored under the key.
    #[error("value mismatch for key {}: a different value is already stored", hex::encode(.key))]
    ValueMismatch {
        /// The key whose stored value differs.
        key: Vec<u8>,
    },

    /// The stored record could not be decoded.
    #[error("corrupt record for key {}: {source}", hex::encode(.key))]
    Corrupt {
        /// The key holding the corrupt record.
        key: Vec<u8>,
        /// Why decoding failed.
        #[source]
        source: RecordError,
    },

    /// The reference count is already at its maximum.
    #[error("reference count overflow for key {}", hex::encode(.key))]
    ReferenceOverflow {
        /// The saturated key.
        key: Vec<u8>,
    },

    /// The underlying engine failed to read, write or commit.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

impl StoreError {
    /// Creates a not-found error for `key`.
    pub fn not_found(key: &[u8]) -> Self {
        Self::NotFound { key: key.to_vec() }
    }

    /// Creates a value mismatch error for `key`.
    pub fn value_mismatch(key: &[u8]) -> Self {
        Self::ValueMismatch { key: key.to_vec() }
    }

    /// Returns `true` if the key was absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the operation lost a race with a concurrent commit.
    ///
    /// The store does not retry on its own; the caller may repeat the call.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Engine(err) if err.is_conflict())
    }
}
