//! Core data model for transfer runs.
//!
//! This module defines the main data structures for a copy/move operation:
//! - FileEntry: a source or destination node
//! - ConflictResolutionTable: pre-decided answers for destination conflicts
//! - TransferRequest: the immutable input of one engine run
//! - TransferResult: the outcome handed back to the caller
//! - ProgressSample: one snapshot pushed to a progress sink

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::paths;

/// Divisor applied to byte counts when progress is shown in kilobyte units.
pub const PROGRESS_UNIT: u64 = 1000;

/// A single file or directory, on either side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Full path (local or virtual)
    pub path: String,

    /// Display name (last path component)
    pub name: String,

    /// True if this entry is a directory
    pub is_dir: bool,

    /// Number of immediate children (directories only, informational)
    pub child_count: usize,

    /// Size in bytes; `None` until resolved. For directories this is the
    /// recursive sum of their contents once resolved.
    pub size: Option<u64>,
}

impl FileEntry {
    /// A regular file with a known size.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        FileEntry {
            name: paths::file_name(&path).to_string(),
            path,
            is_dir: false,
            child_count: 0,
            size: Some(size),
        }
    }

    /// A directory whose size is not resolved yet.
    pub fn directory(path: impl Into<String>) -> Self {
        let path = path.into();
        FileEntry {
            name: paths::file_name(&path).to_string(),
            path,
            is_dir: true,
            child_count: 0,
            size: None,
        }
    }

    /// An entry of unknown kind-specific size, as produced by a caller that
    /// only knows the path.
    pub fn unresolved(path: impl Into<String>, is_dir: bool) -> Self {
        let path = path.into();
        FileEntry {
            name: paths::file_name(&path).to_string(),
            path,
            is_dir,
            child_count: 0,
            size: None,
        }
    }

    /// Size in bytes, treating an unresolved size as zero.
    pub fn size_or_zero(&self) -> u64 {
        self.size.unwrap_or(0)
    }
}

/// A pre-decided answer for one conflicting destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictAction {
    /// Leave the existing destination alone and skip the source
    Skip,
    /// Delete the existing destination, then transfer
    Overwrite,
}

impl std::fmt::Display for ConflictAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictAction::Skip => write!(f, "Skip"),
            ConflictAction::Overwrite => write!(f, "Overwrite"),
        }
    }
}

/// Outcome of consulting the conflict resolver for one destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Destination does not exist; nothing to resolve
    NoConflict,
    /// Destination exists and must be left untouched
    Skip,
    /// Destination exists and must be replaced
    Overwrite,
}

impl From<ConflictAction> for Resolution {
    fn from(action: ConflictAction) -> Self {
        match action {
            ConflictAction::Skip => Resolution::Skip,
            ConflictAction::Overwrite => Resolution::Overwrite,
        }
    }
}

/// Mapping from destination path to conflict action.
///
/// A table holding a single entry under the empty key is a global policy
/// applied to every conflicting path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResolutionTable {
    entries: BTreeMap<String, ConflictAction>,
}

impl ConflictResolutionTable {
    /// Key under which a global action is stored.
    pub const GLOBAL_KEY: &'static str = "";

    pub fn new() -> Self {
        Self::default()
    }

    /// A table that applies `action` to every conflicting path.
    pub fn global(action: ConflictAction) -> Self {
        let mut table = Self::new();
        table.insert(Self::GLOBAL_KEY, action);
        table
    }

    /// Record the action for one exact destination path.
    pub fn insert(&mut self, path: impl Into<String>, action: ConflictAction) {
        self.entries.insert(path.into(), action);
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with(mut self, path: impl Into<String>, action: ConflictAction) -> Self {
        self.insert(path, action);
        self
    }

    /// Exact lookup, without the global/default rules.
    pub fn get(&self, path: &str) -> Option<ConflictAction> {
        self.entries.get(path).copied()
    }

    /// The global action, if this table is a single empty-key entry.
    pub fn global_action(&self) -> Option<ConflictAction> {
        if self.entries.len() == 1 {
            self.get(Self::GLOBAL_KEY)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The operation mode for a transfer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Copy; sources remain unchanged
    Copy,
    /// Copy, then delete every fully transferred source
    Move,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Copy => write!(f, "Copy"),
            Mode::Move => write!(f, "Move"),
        }
    }
}

/// Input of one engine run. Not mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Top-level sources, processed in order
    pub sources: Vec<FileEntry>,

    /// Directory every source is placed into
    pub destination: String,

    /// Copy or Move
    pub mode: Mode,

    /// Only copy images, videos and gifs; other files still count toward progress
    pub media_only: bool,

    /// Include dot-files when resolving directory sizes
    pub include_hidden: bool,

    /// Pre-decided conflict answers
    pub resolutions: ConflictResolutionTable,
}

impl TransferRequest {
    pub fn new(sources: Vec<FileEntry>, destination: impl Into<String>, mode: Mode) -> Self {
        TransferRequest {
            sources,
            destination: destination.into(),
            mode,
            media_only: false,
            include_hidden: false,
            resolutions: ConflictResolutionTable::new(),
        }
    }

    pub fn with_resolutions(mut self, resolutions: ConflictResolutionTable) -> Self {
        self.resolutions = resolutions;
        self
    }

    pub fn media_only(mut self, media_only: bool) -> Self {
        self.media_only = media_only;
        self
    }

    pub fn include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// True when sources are left in place after the run.
    pub fn is_copy_only(&self) -> bool {
        self.mode == Mode::Copy
    }
}

/// Outcome of one engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    /// Identifier of the run, also recorded in log spans
    pub run_id: Uuid,

    /// False if a fatal error aborted the run
    pub success: bool,

    /// Top-level sources fully transferred
    pub transferred_top_level_count: usize,

    /// Top-level sources that were not skipped by conflict resolution
    pub expected_count: usize,

    /// Destination directory of the run
    pub destination_directory: String,

    /// Every item (top-level or nested) marked transferred during the run
    pub transferred: Vec<FileEntry>,

    /// Human-readable cause of a failed run
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TransferResult {
    /// True when every non-skipped top-level source was fully transferred.
    pub fn all_transferred(&self) -> bool {
        self.transferred_top_level_count >= self.expected_count
    }
}

/// One progress snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSample {
    /// Name of the file currently being copied (empty before the first file)
    pub current_filename: String,

    /// Bytes accounted for so far
    pub bytes_done: u64,

    /// Estimated total, computed once before the first byte is copied
    pub bytes_total: u64,
}

impl ProgressSample {
    /// Completion percentage, clamped to 100 since lazily expanded
    /// directories can push `bytes_done` past the estimate.
    pub fn percent(&self) -> u32 {
        if self.bytes_total == 0 {
            return 0;
        }
        let percent = self.bytes_done as f64 / self.bytes_total as f64 * 100.0;
        percent.min(100.0) as u32
    }

    /// `(done, total)` in kilobyte units, truncated.
    pub fn units(&self) -> (u64, u64) {
        (self.bytes_done / PROGRESS_UNIT, self.bytes_total / PROGRESS_UNIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_entry_constructors_derive_name() {
        let file = FileEntry::file("/src/photos/a.jpg", 10);
        assert_eq!(file.name, "a.jpg");
        assert_eq!(file.size, Some(10));
        assert!(!file.is_dir);

        let dir = FileEntry::directory("/src/photos");
        assert_eq!(dir.name, "photos");
        assert_eq!(dir.size, None);
    }

    #[test]
    fn test_empty_file_is_not_unresolved() {
        let empty = FileEntry::file("/src/empty", 0);
        assert_eq!(empty.size, Some(0));
        assert_ne!(empty.size, FileEntry::unresolved("/src/empty", false).size);
    }

    #[test]
    fn test_global_action_requires_single_entry() {
        let table = ConflictResolutionTable::global(ConflictAction::Overwrite);
        assert_eq!(table.global_action(), Some(ConflictAction::Overwrite));

        let table = table.with("/dst/a.txt", ConflictAction::Skip);
        assert_eq!(table.global_action(), None);
    }

    #[test]
    fn test_progress_sample_percent_and_units() {
        let sample = ProgressSample {
            current_filename: "a".to_string(),
            bytes_done: 2500,
            bytes_total: 10_000,
        };
        assert_eq!(sample.percent(), 25);
        assert_eq!(sample.units(), (2, 10));

        let overshoot = ProgressSample {
            bytes_done: 20_000,
            ..sample
        };
        assert_eq!(overshoot.percent(), 100);
    }

    #[test]
    fn test_all_transferred() {
        let now = Utc::now();
        let mut result = TransferResult {
            run_id: Uuid::new_v4(),
            success: true,
            transferred_top_level_count: 1,
            expected_count: 2,
            destination_directory: "/dst".to_string(),
            transferred: Vec::new(),
            error: None,
            started_at: now,
            finished_at: now,
        };
        assert!(!result.all_transferred());
        result.transferred_top_level_count = 2;
        assert!(result.all_transferred());
    }
}
