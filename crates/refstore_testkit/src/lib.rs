//! # refstore testkit
//!
//! Test utilities for refstore.
//!
//! This crate provides:
//! - Store fixtures over memory and temporary file engines
//! - Property-based test generators using proptest
//! - A reference model for model-based testing
//! - Concurrent stress helpers
//! - On-disk record format vectors
//!
//! ## Usage
//!
//! ```rust
//! use refstore_testkit::prelude::*;
//!
//! with_temp_store(|store| {
//!     store.save(b"key", b"value").unwrap();
//!     assert_eq!(store.get(b"key").unwrap().reference_count, 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod model;
pub mod stress;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
    pub use crate::stress::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
pub use stress::*;
pub use vectors::*;
