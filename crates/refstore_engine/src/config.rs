//! Engine configuration.

/// Configuration for opening a [`crate::FileEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether to create the engine directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the engine directory already holds a commit log.
    pub error_if_exists: bool,

    /// Whether to sync the commit log on every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Whether to remove the engine directory when the engine is closed.
    ///
    /// Intended for test harnesses only. Destroys every stored entry.
    pub destroy_on_close: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            sync_on_commit: true,
            destroy_on_close: false,
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the engine directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if the engine already holds data.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether to sync the commit log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets whether to remove the engine directory on close.
    #[must_use]
    pub const fn destroy_on_close(mut self, value: bool) -> Self {
        self.destroy_on_close = value;
        self
    }
}
