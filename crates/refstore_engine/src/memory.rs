//! In-memory engine for testing.

use crate::engine::TransactionalEngine;
use crate::error::{EngineError, EngineResult};
use crate::table::KeyTable;
use crate::transaction::Transaction;
use crate::types::{SequenceNumber, TransactionId};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{trace, warn};

/// An in-memory transactional engine.
///
/// This engine keeps all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// This engine is thread-safe and can be shared across threads. Commits are
/// serialized; reads run concurrently with each other.
///
/// # Example
///
/// ```rust
/// use refstore_engine::{MemoryEngine, TransactionalEngine};
///
/// let engine = MemoryEngine::new();
/// let mut txn = engine.begin_transaction().unwrap();
/// txn.put(b"key", b"value".to_vec()).unwrap();
/// engine.commit(&mut txn).unwrap();
/// assert_eq!(engine.get(b"key").unwrap(), Some(b"value".to_vec()));
/// ```
#[derive(Debug)]
pub struct MemoryEngine {
    table: RwLock<KeyTable>,
    next_txid: AtomicU64,
    closed: AtomicBool,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Creates a new empty in-memory engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: RwLock::new(KeyTable::new()),
            next_txid: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the number of keys currently holding a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Returns `true` if no key holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the sequence number of the latest commit.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.table.read().committed_seq()
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }
        Ok(())
    }
}

impl TransactionalEngine for MemoryEngine {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.table.read().get(key).map(<[u8]>::to_vec))
    }

    fn begin_transaction(&self) -> EngineResult<Transaction> {
        self.ensure_open()?;
        let id = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        Ok(Transaction::new(id))
    }

    fn get_in(&self, txn: &mut Transaction, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        txn.ensure_active()?;
        Ok(self.table.read().read_in(txn, key))
    }

    fn commit(&self, txn: &mut Transaction) -> EngineResult<SequenceNumber> {
        self.ensure_open()?;
        txn.ensure_active()?;

        let mut table = self.table.write();
        if let Err(err) = table.validate(txn) {
            warn!(txid = %txn.id(), error = %err, "commit rejected");
            txn.mark_aborted();
            return Err(err);
        }

        if txn.write_count() == 0 {
            txn.mark_committed();
            return Ok(table.committed_seq());
        }

        let seq = table.next_seq();
        table.apply_all(txn, seq);
        txn.mark_committed();
        trace!(txid = %txn.id(), %seq, writes = txn.write_count(), "committed");

        Ok(seq)
    }

    fn rollback(&self, txn: &mut Transaction) -> EngineResult<()> {
        txn.ensure_active()?;
        txn.mark_aborted();
        Ok(())
    }

    fn close(&self) -> EngineResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
