//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, values and operation sequences.
//! Key strategies draw from a small space so sequences revisit the same
//! entries often.

use proptest::prelude::*;

/// Strategy for 32-byte content-hash style keys.
pub fn hash_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 32)
}

/// Strategy for keys drawn from a space of at most 16 distinct keys.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    (0u8..16).prop_map(|k| vec![b'k', k])
}

/// Strategy for arbitrary values.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for values drawn from a space of 3 distinct values, so saves
/// both match and mismatch stored values.
pub fn small_value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::sample::select(vec![b"alpha".to_vec(), b"beta".to_vec(), Vec::new()])
}

/// A single store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    /// Save a value
    Save {
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Add a reference
    Increment {
        /// Key
        key: Vec<u8>,
    },
    /// Release a reference
    Delete {
        /// Key
        key: Vec<u8>,
    },
    /// Read an entry
    Get {
        /// Key
        key: Vec<u8>,
    },
}

impl StoreOperation {
    /// Returns the key the operation targets.
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Save { key, .. }
            | Self::Increment { key }
            | Self::Delete { key }
            | Self::Get { key } => key,
        }
    }
}

/// Strategy for generating store operations over a small key space.
pub fn operation_strategy() -> impl Strategy<Value = StoreOperation> {
    prop_oneof![
        3 => (key_strategy(), small_value_strategy())
            .prop_map(|(key, value)| StoreOperation::Save { key, value }),
        1 => key_strategy().prop_map(|key| StoreOperation::Increment { key }),
        2 => key_strategy().prop_map(|key| StoreOperation::Delete { key }),
        1 => key_strategy().prop_map(|key| StoreOperation::Get { key }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<StoreOperation>> {
    prop::collection::vec(operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn hash_keys_are_32_bytes(key in hash_key_strategy()) {
            prop_assert_eq!(key.len(), 32);
        }

        #[test]
        fn small_keys_stay_in_space(op in operation_strategy()) {
            let key = op.key();
            prop_assert_eq!(key.len(), 2);
            prop_assert_eq!(key[0], b'k');
            prop_assert!(key[1] < 16);
        }

        #[test]
        fn values_stay_bounded(value in value_strategy()) {
            prop_assert!(value.len() < 256);
        }

        #[test]
        fn sequences_respect_bounds(ops in operation_sequence_strategy(5, 10)) {
            prop_assert!(ops.len() >= 5 && ops.len() < 10);
        }
    }
}
