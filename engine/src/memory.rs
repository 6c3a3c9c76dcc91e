//! In-memory virtual accessor.
//!
//! A document-tree style store addressed by string paths under a mount root
//! (for example `/virtual`). Like remote document providers, it creates a
//! file through its parent directory handle; writes that arrive without one
//! resolve the handle on the spot. Mount it with
//! [`RoutingStorage`](crate::routing::RoutingStorage) to mix it with local
//! paths in one transfer.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::model::FileEntry;
use crate::paths;
use crate::storage::{DirHandle, IndexedCallback, ReadStream, StorageAccessor, WriteStream};

#[derive(Debug)]
enum Node {
    Dir { modified: SystemTime },
    File { data: Vec<u8>, modified: SystemTime },
}

type Tree = BTreeMap<String, Node>;

/// Thread-safe in-memory tree.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    root: String,
    tree: Arc<Mutex<Tree>>,
    handle_lookups: Arc<AtomicUsize>,
    indexed: Arc<Mutex<Vec<String>>>,
}

impl MemoryStorage {
    /// Create an empty tree whose root directory is `root`.
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into().trim_end_matches('/').to_string();
        let mut tree = Tree::new();
        tree.insert(
            root.clone(),
            Node::Dir {
                modified: SystemTime::now(),
            },
        );
        MemoryStorage {
            root,
            tree: Arc::new(Mutex::new(tree)),
            handle_lookups: Arc::new(AtomicUsize::new(0)),
            indexed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Root path of this tree.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Store a file, creating parent directories as needed.
    pub fn insert_file(&self, path: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        let parent = paths::parent(path).ok_or_else(|| EngineError::invalid(path, "no parent directory"))?;
        self.create_directory(parent)?;
        self.lock().insert(
            path.to_string(),
            Node::File {
                data: data.into(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    /// Contents of the file at `path`.
    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        match self.lock().get(path) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Number of times a directory handle was resolved.
    pub fn handle_lookups(&self) -> usize {
        self.handle_lookups.load(Ordering::SeqCst)
    }

    /// Paths passed to `notify_indexed`, in order.
    pub fn indexed_paths(&self) -> Vec<String> {
        self.indexed.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        // A panic in another holder cannot leave the map half-updated
        self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_under_root(&self, path: &str) -> Result<()> {
        if paths::is_within(path, &self.root) {
            Ok(())
        } else {
            Err(EngineError::invalid(path, format!("outside of {}", self.root)))
        }
    }

    fn entry_for(tree: &Tree, path: &str, node: &Node) -> FileEntry {
        match node {
            Node::Dir { .. } => FileEntry {
                path: path.to_string(),
                name: paths::file_name(path).to_string(),
                is_dir: true,
                child_count: Self::children_of(tree, path).count(),
                size: None,
            },
            Node::File { data, .. } => FileEntry::file(path, data.len() as u64),
        }
    }

    fn children_of<'a>(tree: &'a Tree, dir: &'a str) -> impl Iterator<Item = (&'a String, &'a Node)> + 'a {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        tree.range(prefix.clone()..)
            .take_while(move |(path, _)| path.starts_with(&prefix))
            .filter(move |(path, _)| paths::parent(path) == Some(dir))
    }
}

impl StorageAccessor for MemoryStorage {
    fn exists(&self, path: &str) -> bool {
        self.lock().contains_key(path)
    }

    fn stat(&self, path: &str) -> Result<FileEntry> {
        let tree = self.lock();
        match tree.get(path) {
            Some(node) => Ok(Self::entry_for(&tree, path, node)),
            None => Err(EngineError::SourceNotFound { path: path.into() }),
        }
    }

    fn list_children(&self, path: &str) -> Result<Vec<FileEntry>> {
        let tree = self.lock();
        match tree.get(path) {
            Some(Node::Dir { .. }) => Ok(Self::children_of(&tree, path)
                .map(|(child, node)| Self::entry_for(&tree, child, node))
                .collect()),
            Some(Node::File { .. }) => Err(EngineError::invalid(path, "not a directory")),
            None => Err(EngineError::EnumerationFailed {
                path: path.into(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such directory"),
            }),
        }
    }

    fn open_read(&self, path: &str) -> Result<ReadStream> {
        match self.lock().get(path) {
            Some(Node::File { data, .. }) => Ok(Box::new(Cursor::new(data.clone()))),
            Some(Node::Dir { .. }) => Err(EngineError::invalid(path, "is a directory")),
            None => Err(EngineError::read(
                path,
                io::Error::new(io::ErrorKind::NotFound, "no such file"),
            )),
        }
    }

    fn open_write(&self, path: &str, _mime_hint: &str, parent: Option<DirHandle>) -> Result<WriteStream> {
        self.check_under_root(path)?;
        let dir = paths::parent(path).ok_or_else(|| EngineError::invalid(path, "no parent directory"))?;
        let handle = match parent {
            Some(handle) => handle,
            None => self
                .directory_handle(dir)?
                .ok_or_else(|| EngineError::invalid(dir, "parent directory missing"))?,
        };
        if handle.path() != dir {
            return Err(EngineError::invalid(path, format!("handle belongs to {}", handle.path())));
        }

        let mut tree = self.lock();
        if !matches!(tree.get(dir), Some(Node::Dir { .. })) {
            return Err(EngineError::write(
                path,
                io::Error::new(io::ErrorKind::NotFound, "parent directory missing"),
            ));
        }
        if let Some(Node::Dir { .. }) = tree.get(path) {
            return Err(EngineError::invalid(path, "is a directory"));
        }
        tree.insert(
            path.to_string(),
            Node::File {
                data: Vec::new(),
                modified: SystemTime::now(),
            },
        );

        Ok(Box::new(MemoryWriter {
            path: path.to_string(),
            tree: Arc::clone(&self.tree),
        }))
    }

    fn needs_directory_handle(&self, path: &str) -> bool {
        paths::is_within(path, &self.root)
    }

    fn directory_handle(&self, dir: &str) -> Result<Option<DirHandle>> {
        self.handle_lookups.fetch_add(1, Ordering::SeqCst);
        match self.lock().get(dir) {
            Some(Node::Dir { .. }) => Ok(Some(DirHandle::new(dir))),
            _ => Ok(None),
        }
    }

    fn create_directory(&self, path: &str) -> Result<()> {
        self.check_under_root(path)?;
        let mut tree = self.lock();
        let path = path.trim_end_matches('/');

        // Walk every ancestor below the root, then the path itself
        let mut ancestors: Vec<&str> = path
            .match_indices('/')
            .map(|(idx, _)| &path[..idx])
            .filter(|ancestor| ancestor.len() > self.root.len())
            .collect();
        ancestors.push(path);

        for dir in ancestors {
            match tree.get(dir) {
                Some(Node::Dir { .. }) => {}
                Some(Node::File { .. }) => {
                    return Err(EngineError::DirectoryCreationFailed {
                        path: dir.into(),
                        source: io::Error::new(io::ErrorKind::AlreadyExists, "a file is in the way"),
                    })
                }
                None => {
                    tree.insert(
                        dir.to_string(),
                        Node::Dir {
                            modified: SystemTime::now(),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn delete_recursive(&self, entry: &FileEntry) -> Result<()> {
        let mut tree = self.lock();
        tree.retain(|path, _| !paths::is_within(path, &entry.path));
        Ok(())
    }

    fn resolve_size(&self, entry: &FileEntry, include_hidden: bool) -> Result<u64> {
        let tree = self.lock();
        match tree.get(&entry.path) {
            Some(Node::File { data, .. }) => Ok(data.len() as u64),
            Some(Node::Dir { .. }) => {
                let base = entry.path.trim_end_matches('/');
                let total = tree
                    .iter()
                    .filter(|(path, _)| paths::is_within(path, base) && path.as_str() != base)
                    .filter(|(path, _)| {
                        include_hidden
                            || !path[base.len()..]
                                .split('/')
                                .any(paths::is_hidden_name)
                    })
                    .map(|(_, node)| match node {
                        Node::File { data, .. } => data.len() as u64,
                        Node::Dir { .. } => 0,
                    })
                    .sum();
                Ok(total)
            }
            None => Err(EngineError::SourceNotFound {
                path: entry.path.as_str().into(),
            }),
        }
    }

    fn notify_indexed(&self, path: &str, on_done: IndexedCallback) {
        debug!(path, "indexing virtual file");
        if let Ok(mut indexed) = self.indexed.lock() {
            indexed.push(path.to_string());
        }
        on_done();
    }

    fn modified(&self, path: &str) -> Result<Option<SystemTime>> {
        match self.lock().get(path) {
            Some(Node::Dir { modified }) | Some(Node::File { modified, .. }) => Ok(Some(*modified)),
            None => Err(EngineError::SourceNotFound { path: path.into() }),
        }
    }

    fn set_modified(&self, path: &str, time: SystemTime) -> Result<()> {
        match self.lock().get_mut(path) {
            Some(Node::Dir { modified }) | Some(Node::File { modified, .. }) => {
                *modified = time;
                Ok(())
            }
            None => Err(EngineError::SourceNotFound { path: path.into() }),
        }
    }
}

/// Appends straight into the tree node, so partial writes stay visible.
struct MemoryWriter {
    path: String,
    tree: Arc<Mutex<Tree>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut tree = self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match tree.get_mut(&self.path) {
            Some(Node::File { data, modified }) => {
                data.extend_from_slice(buf);
                *modified = SystemTime::now();
                Ok(buf.len())
            }
            _ => Err(io::Error::new(io::ErrorKind::NotFound, "file was removed while writing")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn sample_tree() -> MemoryStorage {
        let storage = MemoryStorage::new("/virtual");
        storage.insert_file("/virtual/dcim/a.jpg", vec![1u8; 10]).expect("insert");
        storage.insert_file("/virtual/dcim/b.jpg", vec![2u8; 20]).expect("insert");
        storage.insert_file("/virtual/dcim/.thumbs/a.jpg", vec![3u8; 5]).expect("insert");
        storage
    }

    #[test]
    fn test_list_children_is_shallow() {
        let storage = sample_tree();
        let mut names: Vec<_> = storage
            .list_children("/virtual/dcim")
            .expect("list")
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        assert_eq!(names, vec![".thumbs", "a.jpg", "b.jpg"]);

        let dir = storage.stat("/virtual/dcim").expect("stat");
        assert!(dir.is_dir);
        assert_eq!(dir.child_count, 3);
    }

    #[test]
    fn test_resolve_size_honors_hidden_flag() {
        let storage = sample_tree();
        let dir = FileEntry::directory("/virtual/dcim");
        assert_eq!(storage.resolve_size(&dir, false).expect("size"), 30);
        assert_eq!(storage.resolve_size(&dir, true).expect("size"), 35);
    }

    #[test]
    fn test_write_resolves_handle_when_missing() {
        let storage = MemoryStorage::new("/virtual");
        storage.create_directory("/virtual/out").expect("mkdir");

        let mut out = storage.open_write("/virtual/out/x.bin", "application/octet-stream", None).expect("open");
        out.write_all(b"abc").expect("write");
        drop(out);

        assert_eq!(storage.read_file("/virtual/out/x.bin"), Some(b"abc".to_vec()));
        assert_eq!(storage.handle_lookups(), 1);
    }

    #[test]
    fn test_write_rejects_foreign_handle() {
        let storage = MemoryStorage::new("/virtual");
        storage.create_directory("/virtual/a").expect("mkdir");
        storage.create_directory("/virtual/b").expect("mkdir");

        let result = storage.open_write("/virtual/a/x", "text/plain", Some(DirHandle::new("/virtual/b")));
        assert!(result.is_err());
    }

    #[test]
    fn test_create_directory_blocked_by_file() {
        let storage = sample_tree();
        let result = storage.create_directory("/virtual/dcim/a.jpg/sub");
        assert!(matches!(result, Err(EngineError::DirectoryCreationFailed { .. })));
        assert!(storage.create_directory("/elsewhere").is_err());
    }

    #[test]
    fn test_delete_recursive_removes_subtree_only() {
        let storage = sample_tree();
        storage.insert_file("/virtual/dcim2/c.jpg", vec![0u8; 1]).expect("insert");

        storage
            .delete_recursive(&FileEntry::directory("/virtual/dcim"))
            .expect("delete");

        assert!(!storage.exists("/virtual/dcim"));
        assert!(!storage.exists("/virtual/dcim/.thumbs/a.jpg"));
        assert!(storage.exists("/virtual/dcim2/c.jpg"));
    }

    #[test]
    fn test_open_read_returns_contents() {
        let storage = sample_tree();
        let mut buf = Vec::new();
        storage
            .open_read("/virtual/dcim/a.jpg")
            .expect("open")
            .read_to_end(&mut buf)
            .expect("read");
        assert_eq!(buf, vec![1u8; 10]);
    }
}
