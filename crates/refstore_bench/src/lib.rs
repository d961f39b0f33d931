//! Benchmarks for refstore.

#![warn(missing_docs)]

pub mod utils;
