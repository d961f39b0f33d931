//! File-based engine for persistent storage.

use crate::config::EngineConfig;
use crate::dir::EngineDir;
use crate::engine::TransactionalEngine;
use crate::error::{EngineError, EngineResult};
use crate::log::{encode_commit, scan};
use crate::table::KeyTable;
use crate::transaction::Transaction;
use crate::types::{SequenceNumber, TransactionId};
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, trace, warn};

/// Append handle on the commit log.
#[derive(Debug)]
struct LogFile {
    file: File,
    size: u64,
    /// Set when a partial record could not be rolled back.
    poisoned: bool,
}

impl LogFile {
    fn new(file: File, size: u64) -> Self {
        Self {
            file,
            size,
            poisoned: false,
        }
    }

    /// Appends `data`, rolling the file back to its previous size on failure
    /// so a failed commit never leaves a partial record behind.
    ///
    /// If the rollback itself fails the log is poisoned and every later
    /// append fails with `Poisoned`.
    fn append(&mut self, data: &[u8], sync: bool) -> EngineResult<()> {
        if self.poisoned {
            return Err(EngineError::Poisoned);
        }

        let result = self.write_through(data, sync);
        if result.is_err() {
            if let Err(err) = self.file.set_len(self.size) {
                error!(error = %err, size = self.size, "failed to roll back partial commit");
                self.poisoned = true;
            }
        } else {
            self.size += data.len() as u64;
        }
        result
    }

    fn write_through(&mut self, data: &[u8], sync: bool) -> EngineResult<()> {
        self.file.write_all(data)?;
        self.file.flush()?;
        if sync {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct FileState {
    table: KeyTable,
    /// `None` once the engine is closed.
    open: Option<(EngineDir, LogFile)>,
}

impl FileState {
    fn ensure_open(&self) -> EngineResult<()> {
        if self.open.is_none() {
            return Err(EngineError::Closed);
        }
        Ok(())
    }
}

/// A file-based transactional engine.
///
/// Committed writes are appended to a CRC-checked commit log inside the
/// engine directory and replayed into memory when the engine is opened.
/// Data survives process restarts.
///
/// # Durability
///
/// With `sync_on_commit` (the default) each commit is `fsync`ed before it
/// becomes visible. Without it, commits reach the OS but may be lost on power
/// failure. A torn record at the end of the log is discarded on open.
///
/// # Thread Safety
///
/// This engine is thread-safe and can be shared across threads. The
/// directory is locked so only one engine instance can open it at a time.
///
/// # Example
///
/// ```no_run
/// use refstore_engine::{EngineConfig, FileEngine, TransactionalEngine};
/// use std::path::Path;
///
/// let engine = FileEngine::open(Path::new("data"), EngineConfig::default()).unwrap();
/// let mut txn = engine.begin_transaction().unwrap();
/// txn.put(b"key", b"persistent".to_vec()).unwrap();
/// engine.commit(&mut txn).unwrap();
/// engine.close().unwrap();
/// ```
#[derive(Debug)]
pub struct FileEngine {
    path: PathBuf,
    config: EngineConfig,
    state: RwLock<FileState>,
    next_txid: AtomicU64,
}

impl FileEngine {
    /// Opens or creates a file engine in the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory is missing and `create_if_missing` is false
    /// - The directory holds data and `error_if_exists` is true
    /// - Another engine holds the directory lock
    /// - The commit log is corrupted
    /// - An I/O error occurs
    pub fn open(path: &Path, config: EngineConfig) -> EngineResult<Self> {
        let dir = EngineDir::open(path, config.create_if_missing)?;
        if config.error_if_exists && dir.has_data() {
            return Err(EngineError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }

        let log_path = dir.log_path();
        let (table, size) = Self::recover(&log_path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        info!(
            path = %path.display(),
            keys = table.len(),
            seq = %table.committed_seq(),
            "opened file engine"
        );

        Ok(Self {
            path: path.to_path_buf(),
            config,
            state: RwLock::new(FileState {
                table,
                open: Some((dir, LogFile::new(file, size))),
            }),
            next_txid: AtomicU64::new(1),
        })
    }

    /// Replays the commit log, truncating a torn tail.
    fn recover(log_path: &Path) -> EngineResult<(KeyTable, u64)> {
        let mut table = KeyTable::new();
        let data = match fs::read(log_path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok((table, 0)),
            Err(err) => return Err(err.into()),
        };

        let scanned = scan(&data)?;
        for record in &scanned.records {
            if record.sequence <= table.committed_seq() {
                return Err(EngineError::corrupted(format!(
                    "non-increasing commit sequence {}",
                    record.sequence
                )));
            }
            for (key, write) in &record.ops {
                table.apply(key, write, record.sequence);
            }
        }

        if scanned.valid_len < data.len() {
            warn!(
                path = %log_path.display(),
                dropped = data.len() - scanned.valid_len,
                "truncating torn commit at end of log"
            );
            let file = OpenOptions::new().write(true).open(log_path)?;
            file.set_len(scanned.valid_len as u64)?;
            file.sync_all()?;
        }

        Ok((table, scanned.valid_len as u64))
    }

    /// Returns the engine directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configuration the engine was opened with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the number of keys currently holding a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().table.len()
    }

    /// Returns `true` if no key holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the sequence number of the latest commit.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.state.read().table.committed_seq()
    }

    /// Returns the size of the commit log in bytes, or `None` once closed.
    #[must_use]
    pub fn log_size(&self) -> Option<u64> {
        self.state.read().open.as_ref().map(|(_, log)| log.size)
    }

    fn close_inner(&self) -> EngineResult<()> {
        let Some((dir, log)) = self.state.write().open.take() else {
            return Ok(());
        };

        log.file.sync_all()?;
        drop(log);
        drop(dir);

        if self.config.destroy_on_close {
            fs::remove_dir_all(&self.path)?;
            info!(path = %self.path.display(), "destroyed file engine");
        } else {
            info!(path = %self.path.display(), "closed file engine");
        }
        Ok(())
    }
}

impl TransactionalEngine for FileEngine {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let state = self.state.read();
        state.ensure_open()?;
        Ok(state.table.get(key).map(<[u8]>::to_vec))
    }

    fn begin_transaction(&self) -> EngineResult<Transaction> {
        self.state.read().ensure_open()?;
        let id = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        Ok(Transaction::new(id))
    }

    fn get_in(&self, txn: &mut Transaction, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let state = self.state.read();
        state.ensure_open()?;
        txn.ensure_active()?;
        Ok(state.table.read_in(txn, key))
    }

    fn commit(&self, txn: &mut Transaction) -> EngineResult<SequenceNumber> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let Some((_, log)) = state.open.as_mut() else {
            return Err(EngineError::Closed);
        };
        txn.ensure_active()?;

        if let Err(err) = state.table.validate(txn) {
            warn!(txid = %txn.id(), error = %err, "commit rejected");
            txn.mark_aborted();
            return Err(err);
        }

        if txn.write_count() == 0 {
            txn.mark_committed();
            return Ok(state.table.committed_seq());
        }

        let seq = state.table.next_seq();
        let record = encode_commit(seq, txn)
            .and_then(|data| log.append(&data, self.config.sync_on_commit));
        if let Err(err) = record {
            warn!(txid = %txn.id(), error = %err, "commit failed");
            txn.mark_aborted();
            return Err(err);
        }

        state.table.apply_all(txn, seq);
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
        self.close_inner()
    }
}

impl Drop for FileEngine {
    fn drop(&mut self) {
        if let Err(err) = self.close_inner() {
            warn!(path = %self.path.display(), error = %err, "failed to close file engine");
        }
    }
}
