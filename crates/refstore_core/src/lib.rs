//! # refstore core
//!
//! Reference-counted, content-keyed value store.
//!
//! This crate lets multiple owners share immutable values keyed by an opaque
//! byte string (typically a content hash). Each entry carries the number of
//! owners; storage is released only when the last owner deletes it.
//!
//! - [`RefStore::save`] creates an entry or adds an owner to it
//! - [`RefStore::increment_reference`] adds an owner to an existing entry
//! - [`RefStore::delete`] removes an owner and the entry with the last one
//! - [`RefStore::get`] reads the count and value
//!
//! A key only ever maps to one value while its entry exists: saving a
//! different value under a live key is rejected.
//!
//! The store runs on any [`refstore_engine::TransactionalEngine`]. Records
//! are laid out as described in [`codec`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod error;
mod store;
mod types;

pub use codec::{decode_record, encode_record, RecordError, ReferenceCount, COUNT_PREFIX_LEN};
pub use error::{StoreError, StoreResult};
pub use refstore_engine::{EngineConfig, EngineError, FileEngine, MemoryEngine, TransactionalEngine};
pub use store::RefStore;
pub use types::{SaveOutcome, StoredValue};
