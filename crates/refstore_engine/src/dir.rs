//! Engine directory management.
//!
//! Layout of a file engine directory:
//!
//! ```text
//! <engine_path>/
//! ├─ LOCK          # Advisory lock for exclusive access
//! └─ records.log   # Append-only commit log
//! ```

use crate::error::{EngineError, EngineResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "records.log";

/// An engine directory with its exclusive lock held.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub(crate) struct EngineDir {
    path: PathBuf,
    _lock_file: File,
}

impl EngineDir {
    /// Opens or creates an engine directory and acquires its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path exists but is not a directory
    /// - Another handle holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub(crate) fn open(path: &Path, create_if_missing: bool) -> EngineResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(EngineError::Missing {
                    path: path.to_path_buf(),
                });
            }
        }

        if !path.is_dir() {
            return Err(EngineError::invalid_operation(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(EngineError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the commit log.
    pub(crate) fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Returns `true` if the commit log exists and is non-empty.
    pub(crate) fn has_data(&self) -> bool {
        fs::metadata(self.log_path()).map_or(false, |m| m.len() > 0)
    }
}
