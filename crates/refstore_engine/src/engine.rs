//! Transactional engine trait definition.

use crate::error::EngineResult;
use crate::transaction::Transaction;
use crate::types::SequenceNumber;

/// A transactional key-value engine.
///
/// Engines are **opaque byte stores** keyed by byte strings. They know nothing
/// about the records stored under each key.
///
/// # Invariants
///
/// - `get` returns the value of the latest commit that wrote the key
/// - `commit` applies every staged write of a transaction or none of them
/// - `commit` fails with a conflict if any key read through `get_in` was
///   written by another commit after the read
/// - Engines must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryEngine`] - For testing and ephemeral use
/// - [`super::FileEngine`] - For persistent storage
pub trait TransactionalEngine: Send + Sync {
    /// Reads the committed value of `key` outside of any transaction.
    ///
    /// Returns `Ok(None)` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed.
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>>;

    /// Opens a new transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is closed.
    fn begin_transaction(&self) -> EngineResult<Transaction>;

    /// Reads `key` within `txn`.
    ///
    /// Writes staged in `txn` are visible. Otherwise the committed value is
    /// returned and the observed version joins the transaction's read set.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is not active or the engine is
    /// closed.
    fn get_in(&self, txn: &mut Transaction, key: &[u8]) -> EngineResult<Option<Vec<u8>>>;

    /// Validates and commits `txn`.
    ///
    /// Returns the sequence number of the latest commit visible afterwards.
    /// On failure nothing is applied and the transaction is left aborted.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A key in the read set changed since it was read (`Conflict`)
    /// - The transaction is not active
    /// - Persisting the commit fails
    fn commit(&self, txn: &mut Transaction) -> EngineResult<SequenceNumber>;

    /// Discards every staged write of `txn`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is not active.
    fn rollback(&self, txn: &mut Transaction) -> EngineResult<()>;

    /// Releases the engine's resources.
    ///
    /// Subsequent operations fail with `Closed`. The default does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or removing on-disk state fails.
    fn close(&self) -> EngineResult<()> {
        Ok(())
    }
}
