//! Prefix-based routing between accessors.
//!
//! A transfer may read from a virtual tree and write to local disk (or the
//! other way round). `RoutingStorage` presents several accessors as one: a
//! path under a mounted prefix goes to that mount, anything else goes to the
//! default accessor.

use std::sync::Arc;
use std::time::SystemTime;

use crate::error::Result;
use crate::model::FileEntry;
use crate::paths;
use crate::storage::{DirHandle, IndexedCallback, ReadStream, StorageAccessor, WriteStream};

/// Mount table over a default accessor.
pub struct RoutingStorage {
    default: Arc<dyn StorageAccessor>,
    mounts: Vec<(String, Arc<dyn StorageAccessor>)>,
}

impl RoutingStorage {
    pub fn new(default: Arc<dyn StorageAccessor>) -> Self {
        RoutingStorage {
            default,
            mounts: Vec::new(),
        }
    }

    /// Route every path under `prefix` to `accessor`.
    pub fn mount(mut self, prefix: impl Into<String>, accessor: Arc<dyn StorageAccessor>) -> Self {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        self.mounts.push((prefix, accessor));
        // Longest prefix first so nested mounts win
        self.mounts.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    /// Accessor responsible for `path`.
    pub fn route(&self, path: &str) -> &dyn StorageAccessor {
        self.mounts
            .iter()
            .find(|(prefix, _)| paths::is_within(path, prefix))
            .map(|(_, accessor)| accessor.as_ref())
            .unwrap_or_else(|| self.default.as_ref())
    }
}

impl StorageAccessor for RoutingStorage {
    fn exists(&self, path: &str) -> bool {
        self.route(path).exists(path)
    }

    fn stat(&self, path: &str) -> Result<FileEntry> {
        self.route(path).stat(path)
    }

    fn list_children(&self, path: &str) -> Result<Vec<FileEntry>> {
        self.route(path).list_children(path)
    }

    fn open_read(&self, path: &str) -> Result<ReadStream> {
        self.route(path).open_read(path)
    }

    fn open_write(&self, path: &str, mime_hint: &str, parent: Option<DirHandle>) -> Result<WriteStream> {
        self.route(path).open_write(path, mime_hint, parent)
    }

    fn needs_directory_handle(&self, path: &str) -> bool {
        self.route(path).needs_directory_handle(path)
    }

    fn directory_handle(&self, dir: &str) -> Result<Option<DirHandle>> {
        self.route(dir).directory_handle(dir)
    }

    fn create_directory(&self, path: &str) -> Result<()> {
        self.route(path).create_directory(path)
    }

    fn delete_recursive(&self, entry: &FileEntry) -> Result<()> {
        self.route(&entry.path).delete_recursive(entry)
    }

    fn resolve_size(&self, entry: &FileEntry, include_hidden: bool) -> Result<u64> {
        self.route(&entry.path).resolve_size(entry, include_hidden)
    }

    fn notify_indexed(&self, path: &str, on_done: IndexedCallback) {
        self.route(path).notify_indexed(path, on_done)
    }

    fn modified(&self, path: &str) -> Result<Option<SystemTime>> {
        self.route(path).modified(path)
    }

    fn set_modified(&self, path: &str, time: SystemTime) -> Result<()> {
        self.route(path).set_modified(path, time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalStorage;
    use crate::memory::MemoryStorage;

    #[test]
    fn test_routes_by_longest_prefix() {
        let outer = Arc::new(MemoryStorage::new("/virtual"));
        let inner = Arc::new(MemoryStorage::new("/virtual/card"));
        outer.insert_file("/virtual/a.txt", b"a".to_vec()).expect("insert");
        inner.insert_file("/virtual/card/b.txt", b"b".to_vec()).expect("insert");

        let storage = RoutingStorage::new(Arc::new(LocalStorage::new()))
            .mount("/virtual", outer)
            .mount("/virtual/card/", inner);

        assert!(storage.exists("/virtual/a.txt"));
        assert!(storage.exists("/virtual/card/b.txt"));
        assert!(!storage.exists("/virtual/card/a.txt"));
        assert!(storage.needs_directory_handle("/virtual/card/b.txt"));
        assert!(!storage.needs_directory_handle("/tmp/whatever"));
    }

    #[test]
    fn test_prefix_match_respects_component_boundary() {
        let mem = Arc::new(MemoryStorage::new("/virtual"));
        mem.insert_file("/virtual/x", b"x".to_vec()).expect("insert");
        let storage = RoutingStorage::new(Arc::new(LocalStorage::new())).mount("/virtual", mem);

        // "/virtualx" is not under "/virtual" and falls through to local disk
        assert!(!storage.exists("/virtualx"));
        assert!(storage.exists("/virtual/x"));
    }
}
