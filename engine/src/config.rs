//! Engine configuration.
//!
//! Host-level settings that stay the same across runs, as opposed to the
//! per-run [`TransferRequest`](crate::model::TransferRequest).

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Block size of the copy loop (8 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Delay before the first progress sample, so fast transfers never flash a
/// progress display.
pub const DEFAULT_INITIAL_PROGRESS_DELAY_MS: u64 = 3000;

/// Interval between progress samples.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 500;

/// Settings for the transfer engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Size of each read/write block in bytes.
    pub buffer_size: usize,

    /// Milliseconds before the progress timer first fires.
    pub initial_progress_delay_ms: u64,

    /// Milliseconds between progress samples.
    pub progress_interval_ms: u64,

    /// Copy the source modification time onto each transferred file.
    ///
    /// Only the modification time is carried over. Creation time cannot be
    /// set portably and access time is left to the destination filesystem.
    pub keep_last_modified: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            initial_progress_delay_ms: DEFAULT_INITIAL_PROGRESS_DELAY_MS,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            keep_last_modified: false,
        }
    }
}

impl TransferConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| EngineError::read(path, e))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(EngineError::Config("buffer_size must be greater than zero".to_string()));
        }
        if self.progress_interval_ms == 0 {
            return Err(EngineError::Config(
                "progress_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn initial_progress_delay(&self) -> Duration {
        Duration::from_millis(self.initial_progress_delay_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}
