//! Conflict resolution.
//!
//! The engine never prompts. Every conflicting destination path is answered
//! from a [`ConflictResolutionTable`] prepared by the caller.

use crate::model::{ConflictAction, ConflictResolutionTable, Resolution};

/// Action the table prescribes for `destination`, ignoring whether the path
/// exists.
///
/// A single empty-key entry wins for every path. Otherwise an exact match is
/// used, and anything else falls back to [`ConflictAction::Skip`].
pub fn lookup(destination: &str, table: &ConflictResolutionTable) -> ConflictAction {
    if let Some(action) = table.global_action() {
        return action;
    }
    table.get(destination).unwrap_or(ConflictAction::Skip)
}

/// Resolve one destination path.
///
/// Returns [`Resolution::NoConflict`] when the destination does not exist,
/// whatever the table says.
pub fn resolve(
    destination: &str,
    destination_exists: bool,
    table: &ConflictResolutionTable,
) -> Resolution {
    if !destination_exists {
        return Resolution::NoConflict;
    }
    lookup(destination, table).into()
}
