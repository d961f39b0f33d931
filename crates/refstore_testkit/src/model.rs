//! Reference model for model-based testing.
//!
//! [`ReferenceModel`] is a plain map from key to `(count, value)` with the
//! store's semantics. Running the same operations against the model and a
//! real store must produce identical outcomes.

use crate::generators::StoreOperation;
use refstore_core::{RefStore, ReferenceCount, StoreError, TransactionalEngine};
use std::collections::HashMap;

/// Observable result of a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Save or increment succeeded with this count
    Referenced(ReferenceCount),
    /// Delete succeeded with this remaining count
    Released(ReferenceCount),
    /// Get returned this entry
    Found {
        /// Reference count
        reference_count: ReferenceCount,
        /// Stored value
        value: Vec<u8>,
    },
    /// No entry for the key
    NotFound,
    /// A different value is stored under the key
    ValueMismatch,
}

/// In-memory model of the store.
#[derive(Debug, Default, Clone)]
pub struct ReferenceModel {
    entries: HashMap<Vec<u8>, (ReferenceCount, Vec<u8>)>,
}

impl ReferenceModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are live.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the live entry for `key`.
    pub fn entry(&self, key: &[u8]) -> Option<(ReferenceCount, &[u8])> {
        self.entries
            .get(key)
            .map(|(count, value)| (*count, value.as_slice()))
    }

    /// Applies `op` and returns its outcome.
    pub fn apply(&mut self, op: &StoreOperation) -> Outcome {
        match op {
            StoreOperation::Save { key, value } => match self.entries.get_mut(key) {
                None => {
                    self.entries.insert(key.clone(), (1, value.clone()));
                    Outcome::Referenced(1)
                }
                Some((count, stored)) if stored == value => {
                    *count += 1;
                    Outcome::Referenced(*count)
                }
                Some(_) => Outcome::ValueMismatch,
            },
            StoreOperation::Increment { key } => match self.entries.get_mut(key) {
                Some((count, _)) => {
                    *count += 1;
                    Outcome::Referenced(*count)
                }
                None => Outcome::NotFound,
            },
            StoreOperation::Delete { key } => match self.entries.get_mut(key) {
                Some((count, _)) if *count > 1 => {
                    *count -= 1;
                    Outcome::Released(*count)
                }
                Some(_) => {
                    self.entries.remove(key);
                    Outcome::Released(0)
                }
                None => Outcome::NotFound,
            },
            StoreOperation::Get { key } => match self.entries.get(key) {
                Some((count, value)) => Outcome::Found {
                    reference_count: *count,
                    value: value.clone(),
                },
                None => Outcome::NotFound,
            },
        }
    }
}

/// Applies `op` to a real store and maps the result to an [`Outcome`].
///
/// # Panics
///
/// Panics on any error the model cannot produce, such as engine failures.
pub fn apply_to_store<E: TransactionalEngine>(store: &RefStore<E>, op: &StoreOperation) -> Outcome {
    let result = match op {
        StoreOperation::Save { key, value } => store
            .save(key, value)
            .map(|outcome| Outcome::Referenced(outcome.reference_count)),
        StoreOperation::Increment { key } => store
            .increment_reference(key)
            .map(|outcome| Outcome::Referenced(outcome.reference_count)),
        StoreOperation::Delete { key } => store.delete(key).map(Outcome::Released),
        StoreOperation::Get { key } => store.get(key).map(|stored| Outcome::Found {
            reference_count: stored.reference_count,
            value: stored.value,
        }),
    };

    match result {
        Ok(outcome) => outcome,
        Err(StoreError::NotFound { .. }) => Outcome::NotFound,
        Err(StoreError::ValueMismatch { .. }) => Outcome::ValueMismatch,
        Err(e) => panic!("unexpected store error for key {}: {e}", hex::encode(op.key())),
    }
}

/// Runs `ops` against both `store` and a fresh model.
///
/// Returns the model after all operations, or a description of the first
/// divergence.
pub fn run_against_model<E: TransactionalEngine>(
    store: &RefStore<E>,
    ops: &[StoreOperation],
) -> Result<ReferenceModel, String> {
    let mut model = ReferenceModel::new();
    for (index, op) in ops.iter().enumerate() {
        let expected = model.apply(op);
        let actual = apply_to_store(store, op);
        if expected != actual {
            return Err(format!(
                "operation {index} ({op:?}) diverged: model {expected:?}, store {actual:?}"
            ));
        }
    }
    Ok(model)
}
