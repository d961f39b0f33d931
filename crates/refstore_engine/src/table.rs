//! Versioned key table shared by the engines.

use crate::error::{EngineError, EngineResult};
use crate::transaction::{PendingWrite, Transaction};
use crate::types::SequenceNumber;
use std::collections::HashMap;

/// Committed state of a single key.
#[derive(Debug, Clone)]
struct Versioned {
    value: Vec<u8>,
    /// Sequence of the commit that last wrote the key.
    seq: SequenceNumber,
}

/// Committed key/value state with per-key versions.
///
/// Deleting a key drops its entry. No tombstone is needed for validation:
/// sequences never repeat, so a key deleted and re-created after a read
/// carries a version the reader cannot have observed, and a key deleted
/// after a read has no version at all.
#[derive(Debug, Default)]
pub(crate) struct KeyTable {
    entries: HashMap<Vec<u8>, Versioned>,
    committed_seq: SequenceNumber,
}

impl KeyTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the committed value of `key`.
    pub(crate) fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(|e| e.value.as_slice())
    }

    /// Returns the version of `key`, or `None` if it holds no value.
    pub(crate) fn version(&self, key: &[u8]) -> Option<SequenceNumber> {
        self.entries.get(key).map(|e| e.seq)
    }

    /// Returns the sequence of the latest commit.
    pub(crate) fn committed_seq(&self) -> SequenceNumber {
        self.committed_seq
    }

    /// Returns the number of keys currently holding a value.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reads `key` on behalf of `txn`.
    ///
    /// Staged writes of the transaction take precedence. Otherwise the
    /// committed value is returned and its version recorded for validation.
    pub(crate) fn read_in(&self, txn: &mut Transaction, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(write) = txn.pending_write(key) {
            return match write {
                PendingWrite::Put { value } => Some(value.clone()),
                PendingWrite::Delete => None,
            };
        }

        txn.record_read(key, self.version(key));
        self.get(key).map(<[u8]>::to_vec)
    }

    /// Checks that every key read by `txn` still has the observed version.
    pub(crate) fn validate(&self, txn: &Transaction) -> EngineResult<()> {
        for (key, observed) in txn.read_set() {
            if self.version(key) != observed {
                return Err(EngineError::conflict(key));
            }
        }
        Ok(())
    }

    /// Returns the sequence number the next commit will be assigned.
    pub(crate) fn next_seq(&self) -> SequenceNumber {
        self.committed_seq.next()
    }

    /// Applies a single write at `seq`.
    pub(crate) fn apply(&mut self, key: &[u8], write: &PendingWrite, seq: SequenceNumber) {
        match write {
            PendingWrite::Put { value } => {
                self.entries.insert(
                    key.to_vec(),
                    Versioned {
                        value: value.clone(),
                        seq,
                    },
                );
            }
            PendingWrite::Delete => {
                self.entries.remove(key);
            }
        }
        if seq > self.committed_seq {
            self.committed_seq = seq;
        }
    }

    /// Applies every staged write of `txn` at `seq`.
    pub(crate) fn apply_all(&mut self, txn: &Transaction, seq: SequenceNumber) {
        for (key, write) in txn.pending_writes() {
            self.apply(key, write, seq);
        }
    }
}
