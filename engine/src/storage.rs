//! Storage accessor capability.
//!
//! The engine never touches a filesystem directly. Everything it needs
//! (existence checks, listing, streams, directory creation, deletion, size
//! resolution, timestamps) goes through [`StorageAccessor`], so local paths
//! and virtual trees are handled by the same transfer code.

use std::io::{Read, Write};
use std::time::SystemTime;

use crate::error::Result;
use crate::model::FileEntry;

/// Opaque handle on a destination directory.
///
/// Some accessors can only create a file through its parent directory
/// object. Resolving that object can be expensive, so the engine caches one
/// handle per parent directory for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirHandle {
    path: String,
}

impl DirHandle {
    pub fn new(path: impl Into<String>) -> Self {
        DirHandle { path: path.into() }
    }

    /// Directory this handle was resolved for.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Readable stream returned by [`StorageAccessor::open_read`].
pub type ReadStream = Box<dyn Read + Send>;

/// Writable stream returned by [`StorageAccessor::open_write`].
pub type WriteStream = Box<dyn Write + Send>;

/// Callback run once an accessor has indexed a newly written file.
pub type IndexedCallback = Box<dyn FnOnce() + Send>;

/// Filesystem primitives consumed by the transfer engine.
///
/// Implementations must be safe to share with the worker thread; the engine
/// itself only ever calls them from that one thread.
#[cfg_attr(test, mockall::automock)]
pub trait StorageAccessor: Send + Sync {
    /// True if anything exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Describe the node at `path`.
    fn stat(&self, path: &str) -> Result<FileEntry>;

    /// Immediate children of the directory at `path`.
    fn list_children(&self, path: &str) -> Result<Vec<FileEntry>>;

    /// Open `path` for reading.
    fn open_read(&self, path: &str) -> Result<ReadStream>;

    /// Create or truncate `path` for writing.
    fn open_write(&self, path: &str, mime_hint: &str, parent: Option<DirHandle>)
        -> Result<WriteStream>;

    /// True if writes to `path` should be given a parent [`DirHandle`].
    fn needs_directory_handle(&self, path: &str) -> bool;

    /// Resolve the handle of directory `dir`, if this accessor uses handles.
    fn directory_handle(&self, dir: &str) -> Result<Option<DirHandle>>;

    /// Create `path` and any missing ancestors. An existing directory is not
    /// an error.
    fn create_directory(&self, path: &str) -> Result<()>;

    /// Delete `entry`, recursively for directories. A missing target is not
    /// an error.
    fn delete_recursive(&self, entry: &FileEntry) -> Result<()>;

    /// Size of `entry` in bytes; directories are summed recursively.
    fn resolve_size(&self, entry: &FileEntry, include_hidden: bool) -> Result<u64>;

    /// Let an external index register `path`, then run `on_done`.
    fn notify_indexed(&self, path: &str, on_done: IndexedCallback);

    /// Last modification time of `path`, if the accessor tracks one.
    fn modified(&self, path: &str) -> Result<Option<SystemTime>>;

    /// Set the modification time of `path`.
    fn set_modified(&self, path: &str, time: SystemTime) -> Result<()>;
}

/// Copy the modification time of `source` onto `destination`.
///
/// Creation and access times are not touched.
///
/// The two paths may live on different accessors when `storage` routes by
/// prefix. Returns `Ok(false)` when the source has no timestamp to copy.
pub fn copy_modified(storage: &dyn StorageAccessor, source: &str, destination: &str) -> Result<bool> {
    match storage.modified(source)? {
        Some(time) => {
            storage.set_modified(destination, time)?;
            Ok(true)
        }
        None => Ok(false),
    }
}
