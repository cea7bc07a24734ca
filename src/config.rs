//! Store configuration.
//!
//! The defaults reproduce the conventional layout: a `.gamestats` directory
//! next to the game's own files, holding a single `stats.sqlite` database.

use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Defaults
// =============================================================================

/// Directory created beside the host's data to hold the database.
pub const DEFAULT_DIR_NAME: &str = ".gamestats";

/// Database file name inside [`DEFAULT_DIR_NAME`].
pub const DEFAULT_FILE_NAME: &str = "stats.sqlite";

/// How long a connection waits on another process's lock before failing.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// =============================================================================
// Store Configuration
// =============================================================================

/// Configuration for a [`StatsStore`](crate::StatsStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name of the stats directory created under the base directory.
    pub dir_name: String,

    /// Name of the database file inside the stats directory.
    pub file_name: String,

    /// Lock wait applied to every connection the store opens.
    ///
    /// Locking itself is SQLite's; this only bounds how long an operation
    /// waits for another process to let go of the file.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir_name: DEFAULT_DIR_NAME.to_string(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

impl StoreConfig {
    /// Returns `base_dir/<dir_name>/<file_name>`.
    pub fn database_path(&self, base_dir: impl AsRef<Path>) -> PathBuf {
        base_dir.as_ref().join(&self.dir_name).join(&self.file_name)
    }
}
