//! Values returned by store operations.

use crate::codec::ReferenceCount;

/// An entry as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    /// Number of owners currently sharing the entry. Always at least 1.
    pub reference_count: ReferenceCount,
    /// The stored value bytes.
    pub value: Vec<u8>,
}

/// Result of a successful save or increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Reference count after the operation.
    pub reference_count: ReferenceCount,
    /// The key that was saved or incremented.
    pub key: Vec<u8>,
}
