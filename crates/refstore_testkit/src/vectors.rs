//! Stored record format vectors.
//!
//! These vectors pin the byte layout of entry records so that any other
//! reader of the same engine data decodes them identically.

use refstore_core::{decode_record, encode_record, RecordError, ReferenceCount};
use serde::{Deserialize, Serialize};

/// A record format vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Raw record bytes (hex-encoded).
    pub record_hex: String,
    /// Expected reference count, if the record decodes.
    pub reference_count: Option<ReferenceCount>,
    /// Expected value (hex-encoded), if the record decodes.
    pub value_hex: Option<String>,
    /// Expected error kind, if the record is rejected.
    pub expected_error: Option<String>,
}

impl RecordVector {
    fn valid(id: &str, description: &str, record_hex: &str, count: ReferenceCount, value_hex: &str) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            record_hex: record_hex.into(),
            reference_count: Some(count),
            value_hex: Some(value_hex.into()),
            expected_error: None,
        }
    }

    fn invalid(id: &str, description: &str, record_hex: &str, error: &str) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            record_hex: record_hex.into(),
            reference_count: None,
            value_hex: None,
            expected_error: Some(error.into()),
        }
    }
}

/// Stable name for a decode error, as used in `expected_error`.
pub fn record_error_kind(error: &RecordError) -> &'static str {
    match error {
        RecordError::Truncated { .. } => "truncated",
        RecordError::ZeroCount => "zero_count",
    }
}

/// Record encoding vectors.
pub fn record_vectors() -> Vec<RecordVector> {
    vec![
        RecordVector::valid(
            "record_hello_1",
            "Single owner of \"hello\"",
            "0100000068656c6c6f",
            1,
            "68656c6c6f",
        ),
        RecordVector::valid(
            "record_hello_2",
            "Two owners of \"hello\"",
            "0200000068656c6c6f",
            2,
            "68656c6c6f",
        ),
        RecordVector::valid("record_empty_value", "Empty value", "01000000", 1, ""),
        RecordVector::valid(
            "record_count_256",
            "Count spills into the second byte",
            "00010000ff",
            256,
            "ff",
        ),
        RecordVector::valid(
            "record_count_le",
            "Count is little-endian",
            "04030201aabb",
            0x0102_0304,
            "aabb",
        ),
        RecordVector::valid(
            "record_count_max",
            "Largest representable count",
            "ffffffff00",
            u32::MAX,
            "00",
        ),
        RecordVector::invalid("record_empty", "Empty record", "", "truncated"),
        RecordVector::invalid("record_three_bytes", "Shorter than the count", "010000", "truncated"),
        RecordVector::invalid("record_zero_count", "Zero count", "0000000068", "zero_count"),
    ]
}

/// Checks `vector` against the codec in both directions.
///
/// # Errors
///
/// Returns a description of the first mismatch.
pub fn verify_record_vector(vector: &RecordVector) -> Result<(), String> {
    let record = hex::decode(&vector.record_hex)
        .map_err(|e| format!("{}: bad record hex: {e}", vector.id))?;

    match (decode_record(&record), &vector.expected_error) {
        (Ok((count, value)), None) => {
            let expected_count = vector.reference_count.ok_or_else(|| format!("{}: no count", vector.id))?;
            let expected_value = vector
                .value_hex
                .as_deref()
                .ok_or_else(|| format!("{}: no value", vector.id))?;

            if count != expected_count {
                return Err(format!("{}: count {count}, expected {expected_count}", vector.id));
            }
            if hex::encode(value) != expected_value {
                return Err(format!("{}: value {}, expected {expected_value}", vector.id, hex::encode(value)));
            }
            let encoded = hex::encode(encode_record(count, value));
            if encoded != vector.record_hex {
                return Err(format!("{}: re-encoded as {encoded}", vector.id));
            }
            Ok(())
        }
        (Err(e), Some(expected)) if record_error_kind(&e) == expected => Ok(()),
        (Err(e), _) => Err(format!("{}: unexpected error {e}", vector.id)),
        (Ok(_), Some(expected)) => Err(format!("{}: decoded, expected {expected}", vector.id)),
    }
}

/// Serializes all vectors to JSON.
pub fn all_vectors_json() -> String {
    let vectors = AllTestVectors {
        record: record_vectors(),
    };

    serde_json::to_string_pretty(&vectors).expect("Failed to serialize vectors")
}

/// Parses vectors previously produced by [`all_vectors_json`].
///
/// # Errors
///
/// Returns the JSON error if the input is malformed.
pub fn load_record_vectors(json: &str) -> serde_json::Result<Vec<RecordVector>> {
    let vectors: AllTestVectors = serde_json::from_str(json)?;
    Ok(vectors.record)
}

#[derive(Debug, Serialize, Deserialize)]
struct AllTestVectors {
    record: Vec<RecordVector>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_vectors() {
        for vector in record_vectors() {
            if let Err(e) = verify_record_vector(&vector) {
                panic!("Vector failed: {e} ({})", vector.description);
            }
        }
    }

    #[test]
    fn test_tampered_vector_is_reported() {
        let mut vector = record_vectors().remove(0);
        vector.reference_count = Some(7);
        assert!(verify_record_vector(&vector).is_err());

        let mut vector = record_vectors().pop().unwrap();
        vector.expected_error = Some("truncated".into());
        assert!(verify_record_vector(&vector).is_err());
    }

    #[test]
    fn test_all_vectors_json() {
        let json = all_vectors_json();
        assert!(json.contains("record_hello_1"));

        let loaded = load_record_vectors(&json).unwrap();
        assert_eq!(loaded, record_vectors());
    }
}
