//! Error types for the transfer engine.
//!
//! `EngineError` covers the fatal failures that abort a transfer run. Soft
//! failures (a destination directory that cannot be created, a short copy)
//! never become an `EngineError`; they are logged and leave the affected item
//! out of the transferred set.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by storage accessors and the transfer engine.
///
/// Paths are kept as `PathBuf` even for virtual locations so that messages
/// render the same way regardless of which accessor produced them.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source item does not exist
    #[error("Source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Failed to open or read a source file
    #[error("Failed to read file: {}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to open or write a destination file
    #[error("Failed to write file: {}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to list a directory
    #[error("Failed to enumerate directory: {}", path.display())]
    EnumerationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create a directory
    #[error("Failed to create directory: {}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to delete a file or directory tree
    #[error("Failed to delete: {}", path.display())]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Path is malformed or points at the wrong kind of node
    #[error("Invalid path: {} ({reason})", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// Configuration could not be loaded or is out of range
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Catch-all for unexpected errors
    #[error("Engine error: {message}")]
    Unknown { message: String },
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<u32> {
        match self {
            Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::EnumerationFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. }
            | Self::DeleteFailed { source, .. } => source.raw_os_error().map(|e| e as u32),
            _ => None,
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::WriteError {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<io::Error> for EngineError {
    fn from(err: io::Error) -> Self {
        EngineError::Unknown {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_path() {
        let err = EngineError::write("/dst/a.txt", io::Error::new(io::ErrorKind::Other, "disk full"));
        assert_eq!(err.to_string(), "Failed to write file: /dst/a.txt");
    }

    #[test]
    fn test_raw_os_error_extracted_from_io_source() {
        let err = EngineError::read("/src/a.txt", io::Error::from_raw_os_error(2));
        assert_eq!(err.raw_os_error(), Some(2));

        let err = EngineError::invalid("/src", "not a directory");
        assert_eq!(err.raw_os_error(), None);
    }
}
