//! Transaction state.

use crate::error::{EngineError, EngineResult};
use crate::types::{SequenceNumber, TransactionId};
use std::collections::{BTreeMap, HashMap};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back or failed to commit.
    Aborted,
}

/// A write staged in a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    /// Insert or replace the value stored under the key.
    Put {
        /// New value bytes.
        value: Vec<u8>,
    },
    /// Remove the key.
    Delete,
}

/// An optimistic transaction.
///
/// Writes are staged locally and applied atomically at commit. Every
/// transactional read records the version it observed; commit fails with
/// [`EngineError::Conflict`] if any of those versions changed in the meantime.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    /// Staged writes, ordered by key so commit records are deterministic.
    writes: BTreeMap<Vec<u8>, PendingWrite>,
    /// Observed versions: `None` means the key had never been written.
    reads: HashMap<Vec<u8>, Option<SequenceNumber>>,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            writes: BTreeMap::new(),
            reads: HashMap::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Stages a put of `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction is no longer active.
    pub fn put(&mut self, key: &[u8], value: Vec<u8>) -> EngineResult<()> {
        self.ensure_active()?;
        self.writes.insert(key.to_vec(), PendingWrite::Put { value });
        Ok(())
    }

    /// Stages a delete of `key`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction is no longer active.
    pub fn delete(&mut self, key: &[u8]) -> EngineResult<()> {
        self.ensure_active()?;
        self.writes.insert(key.to_vec(), PendingWrite::Delete);
        Ok(())
    }

    /// Returns the staged write for `key`, if any.
    #[must_use]
    pub fn pending_write(&self, key: &[u8]) -> Option<&PendingWrite> {
        self.writes.get(key)
    }

    /// Returns all staged writes in key order.
    pub fn pending_writes(&self) -> impl Iterator<Item = (&[u8], &PendingWrite)> {
        self.writes.iter().map(|(k, w)| (k.as_slice(), w))
    }

    /// Returns the number of staged writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Returns the read set used for commit validation.
    pub fn read_set(&self) -> impl Iterator<Item = (&[u8], Option<SequenceNumber>)> {
        self.reads.iter().map(|(k, v)| (k.as_slice(), *v))
    }

    /// Records the version observed by a transactional read.
    ///
    /// The first observation of a key wins; later reads of the same key see
    /// the same committed state from the transaction's point of view.
    pub(crate) fn record_read(&mut self, key: &[u8], observed: Option<SequenceNumber>) {
        if !self.writes.contains_key(key) && !self.reads.contains_key(key) {
            self.reads.insert(key.to_vec(), observed);
        }
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    pub(crate) fn mark_aborted(&mut self) {
        self.state = TransactionState::Aborted;
        self.writes.clear();
    }

    pub(crate) fn ensure_active(&self) -> EngineResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(EngineError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::Aborted => {
                Err(EngineError::invalid_operation("transaction already aborted"))
            }
        }
    }
}
