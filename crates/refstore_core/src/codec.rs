//! Encoding of stored records.
//!
//! Every entry is persisted as a single engine value:
//!
//! ```text
//! | reference_count: u32 LE (4) | value bytes (rest) |
//! ```
//!
//! The value needs no length prefix: it is everything after the count. This
//! layout is the only on-disk representation of an entry and must stay stable.

use thiserror::Error;

/// Number of owners sharing an entry.
pub type ReferenceCount = u32;

/// Width in bytes of the reference count prefix.
pub const COUNT_PREFIX_LEN: usize = 4;

/// Errors produced when decoding a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The record is too short to hold the count prefix.
    #[error("record of {len} bytes is shorter than the 4-byte count prefix")]
    Truncated {
        /// Length of the record.
        len: usize,
    },

    /// The record carries a count of zero, which is never persisted.
    #[error("record carries a zero reference count")]
    ZeroCount,
}

/// Encodes `count` and `value` into a stored record.
#[must_use]
pub fn encode_record(count: ReferenceCount, value: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(COUNT_PREFIX_LEN + value.len());
    record.extend_from_slice(&count.to_le_bytes());
    record.extend_from_slice(value);
    record
}

/// Decodes a stored record into its count and a borrowed value.
///
/// # Errors
///
/// Returns [`RecordError::Truncated`] for records shorter than
/// [`COUNT_PREFIX_LEN`] (including empty ones) and [`RecordError::ZeroCount`]
/// for a zero count.
pub fn decode_record(record: &[u8]) -> Result<(ReferenceCount, &[u8]), RecordError> {
    if record.len() < COUNT_PREFIX_LEN {
        return Err(RecordError::Truncated { len: record.len() });
    }

    let (prefix, value) = record.split_at(COUNT_PREFIX_LEN);
    let count = ReferenceCount::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    if count == 0 {
        return Err(RecordError::ZeroCount);
    }

    Ok((count, value))
}
