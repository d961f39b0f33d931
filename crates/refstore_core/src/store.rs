//! Reference-counted store.

use crate::codec::{decode_record, encode_record, ReferenceCount};
use crate::error::{StoreError, StoreResult};
use crate::types::{SaveOutcome, StoredValue};
use refstore_engine::{
    EngineConfig, FileEngine, MemoryEngine, Transaction, TransactionalEngine,
};
use std::path::Path;
use tracing::{debug, warn};

/// A content-keyed value store with per-entry reference counts.
///
/// Each key maps to one immutable value and the number of owners sharing it.
/// Saving the same value again adds an owner; deleting removes one, and the
/// entry is physically removed when the last owner lets go.
///
/// # Consistency
///
/// Every mutating operation reads the entry, computes the new record and
/// writes it inside a single engine transaction. The engine rejects the commit
/// if another commit touched the key in between, so concurrent callers never
/// lose updates. A rejected call returns an error for which
/// [`StoreError::is_retryable`] is `true`; retrying is up to the caller.
///
/// # Example
///
/// ```rust
/// use refstore_core::RefStore;
///
/// let store = RefStore::in_memory();
/// assert_eq!(store.save(b"hash", b"hello").unwrap().reference_count, 1);
/// assert_eq!(store.save(b"hash", b"hello").unwrap().reference_count, 2);
/// assert_eq!(store.delete(b"hash").unwrap(), 1);
/// assert_eq!(store.delete(b"hash").unwrap(), 0);
/// assert!(store.get(b"hash").unwrap_err().is_not_found());
/// ```
#[derive(Debug)]
pub struct RefStore<E: TransactionalEngine = MemoryEngine> {
    engine: E,
}

impl RefStore<MemoryEngine> {
    /// Creates a store over a fresh in-memory engine.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryEngine::new())
    }
}

impl RefStore<FileEngine> {
    /// Opens a store over a file engine in the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the directory cannot be opened, is locked,
    /// or holds a corrupted commit log.
    pub fn open(path: &Path, config: EngineConfig) -> StoreResult<Self> {
        Ok(Self::new(FileEngine::open(path, config)?))
    }
}

impl<E: TransactionalEngine> RefStore<E> {
    /// Creates a store over `engine`.
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Returns the underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Consumes the store and returns the engine.
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Reads the entry stored under `key`.
    ///
    /// This is a plain point read with no transaction and no side effects.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no entry exists
    /// - `Corrupt` if the stored record cannot be decoded
    /// - `Engine` if the engine read fails
    pub fn get(&self, key: &[u8]) -> StoreResult<StoredValue> {
        let record = self
            .engine
            .get(key)?
            .ok_or_else(|| StoreError::not_found(key))?;
        decode_stored(key, &record)
    }

    /// Saves `value` under `key`, adding one owner.
    ///
    /// The first save creates the entry with a count of 1. Saving the same
    /// value again increments the count. Saving a different value fails and
    /// leaves the entry untouched.
    ///
    /// # Errors
    ///
    /// - `ValueMismatch` if a different value is stored under `key`
    /// - `ReferenceOverflow` if the count is already `u32::MAX`
    /// - `Corrupt` if the stored record cannot be decoded
    /// - `Engine` if the engine fails or the commit conflicts
    pub fn save(&self, key: &[u8], value: &[u8]) -> StoreResult<SaveOutcome> {
        let reference_count = self.in_transaction(|txn| {
            let count = match self.read_entry(txn, key)? {
                None => 1,
                Some(stored) if stored.value == value => {
                    increment(key, stored.reference_count)?
                }
                Some(_) => return Err(StoreError::value_mismatch(key)),
            };
            write_entry(txn, key, count, value)?;
            Ok(count)
        })?;

        debug!(key = %hex::encode(key), reference_count, "saved entry");
        Ok(SaveOutcome {
            reference_count,
            key: key.to_vec(),
        })
    }

    /// Adds one owner to an existing entry.
    ///
    /// Unlike [`save`](Self::save), this never creates an entry.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no entry exists
    /// - `ReferenceOverflow` if the count is already `u32::MAX`
    /// - `Corrupt` if the stored record cannot be decoded
    /// - `Engine` if the engine fails or the commit conflicts
    pub fn increment_reference(&self, key: &[u8]) -> StoreResult<SaveOutcome> {
        let reference_count = self.in_transaction(|txn| {
            let stored = self
                .read_entry(txn, key)?
                .ok_or_else(|| StoreError::not_found(key))?;
            let count = increment(key, stored.reference_count)?;
            write_entry(txn, key, count, &stored.value)?;
            Ok(count)
        })?;

        debug!(key = %hex::encode(key), reference_count, "incremented entry");
        Ok(SaveOutcome {
            reference_count,
            key: key.to_vec(),
        })
    }

    /// Removes one owner from an entry.
    ///
    /// Returns the remaining count. When the last owner is removed the entry
    /// is deleted from the engine and `0` is returned.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no entry exists
    /// - `Corrupt` if the stored record cannot be decoded
    /// - `Engine` if the engine fails or the commit conflicts
    pub fn delete(&self, key: &[u8]) -> StoreResult<ReferenceCount> {
        let remaining = self.in_transaction(|txn| {
            let stored = self
                .read_entry(txn, key)?
                .ok_or_else(|| StoreError::not_found(key))?;

            if stored.reference_count < 2 {
                txn.delete(key)?;
                return Ok(0);
            }

            let count = stored.reference_count - 1;
            write_entry(txn, key, count, &stored.value)?;
            Ok(count)
        })?;

        if remaining == 0 {
            debug!(key = %hex::encode(key), "removed entry");
        } else {
            debug!(key = %hex::encode(key), reference_count = remaining, "released reference");
        }
        Ok(remaining)
    }

    /// Closes the underlying engine.
    ///
    /// # Errors
    ///
    /// Returns an engine error if releasing on-disk resources fails.
    pub fn close(&self) -> StoreResult<()> {
        self.engine.close()?;
        Ok(())
    }

    /// Runs `op` inside a fresh transaction.
    ///
    /// Commits if `op` succeeds, rolls back otherwise.
    fn in_transaction<T>(
        &self,
        op: impl FnOnce(&mut Transaction) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut txn = self.engine.begin_transaction()?;
        match op(&mut txn) {
            Ok(out) => {
                self.engine.commit(&mut txn)?;
                Ok(out)
            }
            Err(err) => {
                if txn.is_active() {
                    if let Err(rollback) = self.engine.rollback(&mut txn) {
                        warn!(txid = %txn.id(), error = %rollback, "rollback failed");
                    }
                }
                Err(err)
            }
        }
    }

    /// Reads and decodes `key` within `txn`.
    fn read_entry(&self, txn: &mut Transaction, key: &[u8]) -> StoreResult<Option<StoredValue>> {
        match self.engine.get_in(txn, key)? {
            Some(record) => decode_stored(key, &record).map(Some),
            None => Ok(None),
        }
    }
}

/// Stages the record for `(count, value)` under `key`.
fn write_entry(
    txn: &mut Transaction,
    key: &[u8],
    count: ReferenceCount,
    value: &[u8],
) -> StoreResult<()> {
    txn.put(key, encode_record(count, value))?;
    Ok(())
}

fn increment(key: &[u8], count: ReferenceCount) -> StoreResult<ReferenceCount> {
    count.checked_add(1).ok_or_else(|| StoreError::ReferenceOverflow {
        key: key.to_vec(),
    })
}

fn decode_stored(key: &[u8], record: &[u8]) -> StoreResult<StoredValue> {
    match decode_record(record) {
        Ok((reference_count, value)) => Ok(StoredValue {
            reference_count,
            value: value.to_vec(),
        }),
        Err(source) => {
            warn!(key = %hex::encode(key), error = %source, "corrupt record");
            Err(StoreError::Corrupt {
                key: key.to_vec(),
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RecordError;
    use proptest::prelude::*;
    use refstore_engine::EngineError;
    use tempfile::tempdir;

    /// Writes `record` under `key` directly through the engine.
    fn put_raw<E: TransactionalEngine>(store: &RefStore<E>, key: &[u8], record: &[u8]) {
        let mut txn = store.engine().begin_transaction().unwrap();
        txn.put(key, record.to_vec()).unwrap();
        store.engine().commit(&mut txn).unwrap();
    }

    #[test]
    fn save_then_get_returns_count_one() {
        let store = RefStore::in_memory();
        let outcome = store.save(b"k", b"v").unwrap();

        assert_eq!(outcome.reference_count, 1);
        assert_eq!(outcome.key, b"k");
        assert_eq!(
            store.get(b"k").unwrap(),
            StoredValue {
                reference_count: 1,
                value: b"v".to_vec()
            }
        );
    }

    #[test]
    fn saving_same_value_increments() {
        let store = RefStore::in_memory();
        assert_eq!(store.save(b"k", b"v").unwrap().reference_count, 1);
        assert_eq!(store.save(b"k", b"v").unwrap().reference_count, 2);

        let stored = store.get(b"k").unwrap();
        assert_eq!(stored.reference_count, 2);
        assert_eq!(stored.value, b"v");
    }

    #[test]
    fn saving_different_value_is_rejected() {
        let store = RefStore::in_memory();
        store.save(b"k", b"v1").unwrap();

        let err = store.save(b"k", b"v2").unwrap_err();
        assert!(matches!(err, StoreError::ValueMismatch { ref key } if key == b"k"));

        let stored = store.get(b"k").unwrap();
        assert_eq!(stored.reference_count, 1);
        assert_eq!(stored.value, b"v1");
    }

    #[test]
    fn increment_and_delete_are_symmetric() {
        let store = RefStore::in_memory();
        store.save(b"k", b"v").unwrap();

        assert_eq!(store.increment_reference(b"k").unwrap().reference_count, 2);
        assert_eq!(store.delete(b"k").unwrap(), 1);
        assert_eq!(store.delete(b"k").unwrap(), 0);
        assert!(store.get(b"k").unwrap_err().is_not_found());
        assert!(store.engine().is_empty());
    }

    #[test]
    fn increment_does_not_create() {
        let store = RefStore::in_memory();

        let err = store.increment_reference(b"absent").unwrap_err();
        assert!(err.is_not_found());
        assert!(store.get(b"absent").unwrap_err().is_not_found());
        assert!(store.engine().is_empty());
    }

    #[test]
    fn delete_absent_is_not_found() {
        let store = RefStore::in_memory();
        let err = store.delete(b"absent").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { ref key } if key == b"absent"));
    }

    #[test]
    fn hello_lifecycle() {
        let store = RefStore::in_memory();
        let hash = b"\x9b\x71\xd2\x24";

        assert_eq!(store.save(hash, b"hello").unwrap().reference_count, 1);
        assert_eq!(store.save(hash, b"hello").unwrap().reference_count, 2);
        assert_eq!(
            store.get(hash).unwrap(),
            StoredValue {
                reference_count: 2,
                value: b"hello".to_vec()
            }
        );
        assert_eq!(store.delete(hash).unwrap(), 1);
        assert_eq!(store.delete(hash).unwrap(), 0);
        assert!(store.get(hash).unwrap_err().is_not_found());
    }

    #[test]
    fn resave_after_removal_starts_over() {
        let store = RefStore::in_memory();
        store.save(b"k", b"old").unwrap();
        store.delete(b"k").unwrap();

        assert_eq!(store.save(b"k", b"new").unwrap().reference_count, 1);
        assert_eq!(store.get(b"k").unwrap().value, b"new");
    }

    #[test]
    fn empty_key_and_value_are_allowed() {
        let store = RefStore::in_memory();
        assert_eq!(store.save(b"", b"").unwrap().reference_count, 1);
        assert_eq!(store.get(b"").unwrap().value, Vec::<u8>::new());
    }

    #[test]
    fn increment_at_max_overflows_without_change() {
        let store = RefStore::in_memory();
        put_raw(&store, b"k", &encode_record(u32::MAX, b"v"));

        let err = store.increment_reference(b"k").unwrap_err();
        assert!(matches!(err, StoreError::ReferenceOverflow { .. }));
        let err = store.save(b"k", b"v").unwrap_err();
        assert!(matches!(err, StoreError::ReferenceOverflow { .. }));

        assert_eq!(store.get(b"k").unwrap().reference_count, u32::MAX);
    }

    #[test]
    fn corrupt_records_surface_from_every_operation() {
        let store = RefStore::in_memory();
        put_raw(&store, b"short", &[1, 0]);
        put_raw(&store, b"zero", &[0, 0, 0, 0, b'v']);

        let is_truncated = |err: StoreError| {
            matches!(
                err,
                StoreError::Corrupt {
                    source: RecordError::Truncated { len: 2 },
                    ..
                }
            )
        };
        assert!(is_truncated(store.get(b"short").unwrap_err()));
        assert!(is_truncated(store.save(b"short", b"v").unwrap_err()));
        assert!(is_truncated(store.increment_reference(b"short").unwrap_err()));
        assert!(is_truncated(store.delete(b"short").unwrap_err()));

        let err = store.delete(b"zero").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Corrupt {
                source: RecordError::ZeroCount,
                ..
            }
        ));
        assert_eq!(store.engine().get(b"zero").unwrap(), Some(vec![0, 0, 0, 0, b'v']));
    }

    #[test]
    fn closed_engine_is_engine_error() {
        let store = RefStore::in_memory();
        store.close().unwrap();

        let err = store.get(b"k").unwrap_err();
        assert!(matches!(err, StoreError::Engine(EngineError::Closed)));
        assert!(!err.is_not_found());
    }

    /// Memory engine whose commits fail with an I/O error once armed.
    #[derive(Default)]
    struct FailingCommitEngine {
        inner: MemoryEngine,
        fail_commits: std::sync::atomic::AtomicBool,
    }

    impl TransactionalEngine for FailingCommitEngine {
        fn get(&self, key: &[u8]) -> refstore_engine::EngineResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn begin_transaction(&self) -> refstore_engine::EngineResult<Transaction> {
            self.inner.begin_transaction()
        }

        fn get_in(
            &self,
            txn: &mut Transaction,
            key: &[u8],
        ) -> refstore_engine::EngineResult<Option<Vec<u8>>> {
            self.inner.get_in(txn, key)
        }

        fn commit(
            &self,
            txn: &mut Transaction,
        ) -> refstore_engine::EngineResult<refstore_engine::SequenceNumber> {
            if self.fail_commits.load(std::sync::atomic::Ordering::SeqCst) {
                self.inner.rollback(txn)?;
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());
            }
            self.inner.commit(txn)
        }

        fn rollback(&self, txn: &mut Transaction) -> refstore_engine::EngineResult<()> {
            self.inner.rollback(txn)
        }
    }

    #[test]
    fn failed_commit_is_engine_error_and_changes_nothing() {
        let store = RefStore::new(FailingCommitEngine::default());
        store.save(b"k", b"v").unwrap();
        store.save(b"k", b"v").unwrap();
        store
            .engine()
            .fail_commits
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let is_io = |err: StoreError| {
            let retryable = err.is_retryable();
            matches!(err, StoreError::Engine(EngineError::Io(_))) && !retryable
        };
        assert!(is_io(store.save(b"k", b"v").unwrap_err()));
        assert!(is_io(store.increment_reference(b"k").unwrap_err()));
        assert!(is_io(store.delete(b"k").unwrap_err()));
        assert!(is_io(store.save(b"new", b"v").unwrap_err()));

        assert_eq!(
            store.get(b"k").unwrap(),
            StoredValue {
                reference_count: 2,
                value: b"v".to_vec()
            }
        );
        assert!(store.get(b"new").unwrap_err().is_not_found());
    }

    #[test]
    fn record_layout_on_engine() {
        let store = RefStore::in_memory();
        store.save(b"k", b"abc").unwrap();
        store.increment_reference(b"k").unwrap();

        assert_eq!(
            store.engine().get(b"k").unwrap(),
            Some(vec![2, 0, 0, 0, b'a', b'b', b'c'])
        );
    }

    #[test]
    fn file_store_survives_reopen() {
        let temp = tempdir().unwrap();
        {
            let store = RefStore::open(temp.path(), EngineConfig::default()).unwrap();
            store.save(b"k", b"v").unwrap();
            store.save(b"k", b"v").unwrap();
            store.save(b"gone", b"x").unwrap();
            store.delete(b"gone").unwrap();
            store.close().unwrap();
        }

        let store = RefStore::open(temp.path(), EngineConfig::default()).unwrap();
        let stored = store.get(b"k").unwrap();
        assert_eq!(stored.reference_count, 2);
        assert_eq!(stored.value, b"v");
        assert!(store.get(b"gone").unwrap_err().is_not_found());
    }

    proptest! {
        #[test]
        fn save_get_round_trip(
            key in prop::collection::vec(any::<u8>(), 0..32),
            value in prop::collection::vec(any::<u8>(), 0..128),
        ) {
            let store = RefStore::in_memory();
            store.save(&key, &value).unwrap();
            prop_assert_eq!(
                store.get(&key).unwrap(),
                StoredValue { reference_count: 1, value }
            );
        }

        #[test]
        fn mismatched_save_never_mutates(
            key in prop::collection::vec(any::<u8>(), 1..16),
            first in prop::collection::vec(any::<u8>(), 0..32),
            second in prop::collection::vec(any::<u8>(), 0..32),
            saves in 1u32..5,
        ) {
            prop_assume!(first != second);
            let store = RefStore::in_memory();
            for _ in 0..saves {
                store.save(&key, &first).unwrap();
            }

            let is_mismatch = matches!(
                store.save(&key, &second),
                Err(StoreError::ValueMismatch { .. })
            );
            prop_assert!(is_mismatch);
            prop_assert_eq!(
                store.get(&key).unwrap(),
                StoredValue { reference_count: saves, value: first }
            );
        }
    }
}
