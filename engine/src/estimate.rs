//! Size estimation.
//!
//! Computes the byte volume of a run once, before the first byte moves. The
//! estimate only covers top-level sources: a source whose destination exists
//! and resolves to Skip is left out, everything else counts in full.

use tracing::debug;

use crate::conflict;
use crate::error::Result;
use crate::model::{ConflictAction, ConflictResolutionTable, FileEntry, PROGRESS_UNIT};
use crate::paths;
use crate::storage::StorageAccessor;

/// Total volume of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeEstimate {
    /// Sum of the included sources' sizes in bytes
    pub bytes: u64,
}

impl SizeEstimate {
    /// Total in kilobyte units, truncated.
    pub fn kilobytes(&self) -> u64 {
        self.bytes / PROGRESS_UNIT
    }
}

/// Fill in the size of every source that is still unresolved.
pub fn resolve_sizes(
    storage: &dyn StorageAccessor,
    sources: &mut [FileEntry],
    include_hidden: bool,
) -> Result<()> {
    for source in sources.iter_mut().filter(|s| s.size.is_none()) {
        source.size = Some(storage.resolve_size(source, include_hidden)?);
    }
    Ok(())
}

/// Resolve unknown sizes, then total the sources that will be transferred.
pub fn estimate(
    storage: &dyn StorageAccessor,
    sources: &mut [FileEntry],
    destination: &str,
    resolutions: &ConflictResolutionTable,
    include_hidden: bool,
) -> Result<SizeEstimate> {
    resolve_sizes(storage, sources, include_hidden)?;

    let mut bytes = 0;
    for source in sources.iter() {
        let target = paths::join(destination, &source.name);
        let skipped = conflict::lookup(&target, resolutions) == ConflictAction::Skip && storage.exists(&target);
        if skipped {
            debug!(source = %source.path, "excluded from estimate");
            continue;
        }
        bytes += source.size_or_zero();
    }

    Ok(SizeEstimate { bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;

    fn fixture() -> MemoryStorage {
        let storage = MemoryStorage::new("/m");
        storage.insert_file("/m/src/a.txt", vec![0u8; 1500]).expect("insert");
        storage.insert_file("/m/src/b.txt", vec![0u8; 2500]).expect("insert");
        storage.insert_file("/m/src/d/x.txt", vec![0u8; 700]).expect("insert");
        storage.insert_file("/m/src/d/.hidden", vec![0u8; 300]).expect("insert");
        storage.insert_file("/m/dst/a.txt", vec![1u8; 5]).expect("insert");
        storage
    }

    fn sources() -> Vec<FileEntry> {
        vec![
            FileEntry::unresolved("/m/src/a.txt", false),
            FileEntry::unresolved("/m/src/b.txt", false),
            FileEntry::directory("/m/src/d"),
        ]
    }

    #[test]
    fn test_excludes_existing_skipped_destinations() {
        let storage = fixture();
        let mut sources = sources();

        let total = estimate(&storage, &mut sources, "/m/dst", &ConflictResolutionTable::new(), false)
            .expect("estimate");

        // a.txt exists at the destination and defaults to Skip
        assert_eq!(total.bytes, 2500 + 700);
        assert_eq!(total.kilobytes(), 3);
        assert_eq!(sources[0].size, Some(1500));
        assert_eq!(sources[2].size, Some(700));
    }

    #[test]
    fn test_overwrite_keeps_conflicting_source() {
        let storage = fixture();
        let mut sources = sources();
        let table = ConflictResolutionTable::global(ConflictAction::Overwrite);

        let total = estimate(&storage, &mut sources, "/m/dst", &table, true).expect("estimate");
        assert_eq!(total.bytes, 1500 + 2500 + 1000);
    }

    #[test]
    fn test_independent_of_input_order() {
        let storage = fixture();
        let mut forward = sources();
        let mut backward = sources();
        backward.reverse();
        let table = ConflictResolutionTable::new();

        let a = estimate(&storage, &mut forward, "/m/dst", &table, false).expect("estimate");
        let b = estimate(&storage, &mut backward, "/m/dst", &table, false).expect("estimate");
        assert_eq!(a, b);
    }

    #[test]
    fn test_known_sizes_are_not_re_resolved() {
        let storage = fixture();
        // A stale caller-supplied size wins over the real one
        let mut sources = vec![FileEntry::file("/m/src/b.txt", 10)];
        let total = estimate(&storage, &mut sources, "/m/dst", &ConflictResolutionTable::new(), false)
            .expect("estimate");
        assert_eq!(total.bytes, 10);
    }
}
