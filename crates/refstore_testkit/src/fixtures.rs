//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common test scenarios.

use refstore_core::RefStore;
use refstore_engine::{EngineConfig, FileEngine, MemoryEngine};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// A store over a memory engine.
pub type MemoryStore = RefStore<MemoryEngine>;

/// A store over a file engine.
pub type FileStore = RefStore<FileEngine>;

/// Installs a `tracing` subscriber for tests, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A file-backed test store with automatic cleanup.
pub struct TestFileStore {
    store: Option<FileStore>,
    path: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TestFileStore {
    /// Creates a new store in a fresh temporary directory.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates a new store with the given engine configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("store");
        let store = RefStore::open(&path, config).expect("Failed to open file store");

        Self {
            store: Some(store),
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the engine directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the store and opens it again from disk.
    pub fn reopen(&mut self) {
        if let Some(store) = self.store.take() {
            store.close().expect("Failed to close file store");
        }
        let config = EngineConfig::default().create_if_missing(false);
        self.store = Some(RefStore::open(&self.path, config).expect("Failed to reopen file store"));
    }
}

impl Default for TestFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestFileStore {
    type Target = FileStore;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref().expect("store is open")
    }
}

/// Runs a test with a fresh in-memory store.
///
/// # Example
///
/// ```rust
/// use refstore_testkit::with_temp_store;
///
/// with_temp_store(|store| {
///     assert!(store.get(b"missing").unwrap_err().is_not_found());
/// });
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&MemoryStore) -> R,
{
    let store = RefStore::in_memory();
    f(&store)
}

/// Runs a test with a fresh file-backed store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&FileStore, &Path) -> R,
{
    let test_store = TestFileStore::new();
    f(&*test_store, test_store.path())
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Key used by scenario `index`.
    pub fn scenario_key(index: usize) -> Vec<u8> {
        format!("key-{index:04}").into_bytes()
    }

    /// Value used by scenario `index`.
    pub fn scenario_value(index: usize) -> Vec<u8> {
        format!("value-{index}").into_bytes()
    }

    /// Creates a store with `entry_count` entries, entry `i` holding
    /// `i % max_refs + 1` references.
    pub fn populated_store(entry_count: usize, max_refs: usize) -> MemoryStore {
        let store = RefStore::in_memory();
        for i in 0..entry_count {
            let key = scenario_key(i);
            let value = scenario_value(i);
            for _ in 0..=(i % max_refs.max(1)) {
                store.save(&key, &value).expect("Failed to save entry");
            }
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_temp_store() {
        with_temp_store(|store| {
            store.save(b"k", b"v").unwrap();
            assert_eq!(store.get(b"k").unwrap().reference_count, 1);
        });
    }

    #[test]
    fn test_file_store_reopen() {
        init_test_tracing();
        let mut test_store = TestFileStore::new();
        test_store.save(b"k", b"v").unwrap();
        test_store.increment_reference(b"k").unwrap();

        test_store.reopen();
        assert_eq!(test_store.get(b"k").unwrap().reference_count, 2);
    }

    #[test]
    fn test_with_file_store_path() {
        with_file_store(|store, path| {
            store.save(b"k", b"v").unwrap();
            assert!(path.join("records.log").exists());
        });
    }

    #[test]
    fn test_populated_scenario() {
        let store = scenarios::populated_store(10, 3);
        assert_eq!(store.engine().len(), 10);
        assert_eq!(store.get(&scenarios::scenario_key(0)).unwrap().reference_count, 1);
        assert_eq!(store.get(&scenarios::scenario_key(2)).unwrap().reference_count, 3);
        assert_eq!(store.get(&scenarios::scenario_key(4)).unwrap().reference_count, 2);
    }
}
