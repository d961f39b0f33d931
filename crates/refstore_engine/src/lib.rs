//! # refstore engine
//!
//! Transactional key-value engines for refstore.
//!
//! This crate provides the lowest layer of refstore. Engines are **opaque
//! byte stores** keyed by byte strings, with optimistic transactions.
//!
//! ## Design Principles
//!
//! - Engines store bytes and never interpret them
//! - Writes are staged in a [`Transaction`] and applied atomically on commit
//! - Transactional reads join a read set that commit validates, so a
//!   read-modify-write either sees no interference or fails with a conflict
//! - Engines must be `Send + Sync` for concurrent access
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - For testing and ephemeral storage
//! - [`FileEngine`] - For persistent storage backed by a commit log
//!
//! ## Example
//!
//! ```rust
//! use refstore_engine::{MemoryEngine, TransactionalEngine};
//!
//! let engine = MemoryEngine::new();
//! let mut txn = engine.begin_transaction().unwrap();
//! let current = engine.get_in(&mut txn, b"counter").unwrap();
//! assert!(current.is_none());
//! txn.put(b"counter", vec![1]).unwrap();
//! engine.commit(&mut txn).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod engine;
mod error;
mod file;
mod log;
mod memory;
mod table;
mod transaction;
mod types;

pub use config::EngineConfig;
pub use engine::TransactionalEngine;
pub use error::{EngineError, EngineResult};
pub use file::FileEngine;
pub use log::{LogRecordType, LOG_MAGIC, LOG_VERSION};
pub use memory::MemoryEngine;
pub use transaction::{PendingWrite, Transaction, TransactionState};
pub use types::{SequenceNumber, TransactionId};
