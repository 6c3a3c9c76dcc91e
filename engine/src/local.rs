//! Local filesystem accessor.
//!
//! Backs [`StorageAccessor`] with `std::fs`. Directory sizes are computed
//! with `walkdir`, and modification times are carried over with `filetime`.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use filetime::FileTime;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{EngineError, Result};
use crate::model::FileEntry;
use crate::paths;
use crate::storage::{DirHandle, IndexedCallback, ReadStream, StorageAccessor, WriteStream};

/// Accessor for paths on the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        LocalStorage
    }
}

fn entry_from_metadata(path: &str, metadata: &fs::Metadata) -> FileEntry {
    let is_dir = metadata.is_dir();
    FileEntry {
        path: path.to_string(),
        name: paths::file_name(path).to_string(),
        is_dir,
        child_count: if is_dir { count_children(path) } else { 0 },
        size: if is_dir { None } else { Some(metadata.len()) },
    }
}

fn count_children(path: &str) -> usize {
    fs::read_dir(path).map(|entries| entries.count()).unwrap_or(0)
}

impl StorageAccessor for LocalStorage {
    fn exists(&self, path: &str) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn stat(&self, path: &str) -> Result<FileEntry> {
        // Links are reported as themselves, matching `exists`
        match fs::symlink_metadata(path) {
            Ok(metadata) => Ok(entry_from_metadata(path, &metadata)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(EngineError::SourceNotFound {
                path: path.into(),
            }),
            Err(e) => Err(EngineError::read(path, e)),
        }
    }

    fn list_children(&self, path: &str) -> Result<Vec<FileEntry>> {
        let enumeration_failed = |source| EngineError::EnumerationFailed {
            path: path.into(),
            source,
        };

        let mut children = Vec::new();
        for entry in fs::read_dir(path).map_err(enumeration_failed)? {
            let entry = entry.map_err(enumeration_failed)?;
            let metadata = entry.metadata().map_err(enumeration_failed)?;
            let child_path = paths::join(path, &entry.file_name().to_string_lossy());
            children.push(entry_from_metadata(&child_path, &metadata));
        }
        Ok(children)
    }

    fn open_read(&self, path: &str) -> Result<ReadStream> {
        let file = fs::File::open(path).map_err(|e| EngineError::read(path, e))?;
        Ok(Box::new(file))
    }

    fn open_write(&self, path: &str, _mime_hint: &str, _parent: Option<DirHandle>) -> Result<WriteStream> {
        let file = fs::File::create(path).map_err(|e| EngineError::write(path, e))?;
        Ok(Box::new(file))
    }

    fn needs_directory_handle(&self, _path: &str) -> bool {
        false
    }

    fn directory_handle(&self, _dir: &str) -> Result<Option<DirHandle>> {
        Ok(None)
    }

    fn create_directory(&self, path: &str) -> Result<()> {
        let dir = Path::new(path);
        if dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(dir).map_err(|e| EngineError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: e,
        })
    }

    fn delete_recursive(&self, entry: &FileEntry) -> Result<()> {
        let path = Path::new(&entry.path);
        // Trust the filesystem over the entry: the node may have changed kind
        let is_dir = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata.is_dir(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(EngineError::DeleteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let removed = if is_dir {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match removed {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::DeleteFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    fn resolve_size(&self, entry: &FileEntry, include_hidden: bool) -> Result<u64> {
        let metadata = fs::metadata(&entry.path).map_err(|e| EngineError::read(entry.path.as_str(), e))?;
        if !metadata.is_dir() {
            return Ok(metadata.len());
        }

        let mut total = 0;
        let walker = WalkDir::new(&entry.path)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| include_hidden || !paths::is_hidden_name(&e.file_name().to_string_lossy()));
        for item in walker {
            // Unreadable subtrees do not stop the estimate
            let Ok(item) = item else { continue };
            if item.file_type().is_file() {
                total += item.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }
        Ok(total)
    }

    fn notify_indexed(&self, path: &str, on_done: IndexedCallback) {
        debug!(path, "no media index for local paths");
        on_done();
    }

    fn modified(&self, path: &str) -> Result<Option<SystemTime>> {
        let metadata = fs::metadata(path).map_err(|e| EngineError::read(path, e))?;
        Ok(metadata.modified().ok())
    }

    fn set_modified(&self, path: &str, time: SystemTime) -> Result<()> {
        filetime::set_file_mtime(path, FileTime::from_system_time(time))
            .map_err(|e| EngineError::write(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::time::Duration;

    fn path_str(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_list_children_reports_sizes() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("sub")).expect("Failed to create dirs");
        fs::write(src.join("a.txt"), b"12345").expect("Failed to write file");

        let storage = LocalStorage::new();
        let mut children = storage.list_children(&path_str(&src)).expect("Failed to list");
        children.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "a.txt");
        assert_eq!(children[0].size, Some(5));
        assert_eq!(children[1].name, "sub");
        assert!(children[1].is_dir);
        assert_eq!(children[1].size, None);
    }

    #[test]
    fn test_resolve_size_honors_hidden_flag() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join(".cache")).expect("Failed to create dirs");
        fs::write(src.join("visible.txt"), b"abc").expect("Failed to write file");
        fs::write(src.join(".hidden"), b"1234").expect("Failed to write file");
        fs::write(src.join(".cache").join("blob"), b"12345678").expect("Failed to write file");

        let storage = LocalStorage::new();
        let entry = FileEntry::directory(path_str(&src));

        assert_eq!(storage.resolve_size(&entry, false).expect("size"), 3);
        assert_eq!(storage.resolve_size(&entry, true).expect("size"), 15);
    }

    #[test]
    fn test_streams_round_trip() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = path_str(&temp_dir.path().join("out.bin"));
        let storage = LocalStorage::new();

        let mut out = storage.open_write(&file, "application/octet-stream", None).expect("open write");
        out.write_all(b"payload").expect("write");
        drop(out);

        let mut content = Vec::new();
        storage.open_read(&file).expect("open read").read_to_end(&mut content).expect("read");
        assert_eq!(content, b"payload");
    }

    #[test]
    fn test_delete_recursive_tolerates_missing_and_kind_mismatch() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dir = temp_dir.path().join("d");
        fs::create_dir_all(dir.join("nested")).expect("Failed to create dirs");
        fs::write(dir.join("nested").join("x"), b"x").expect("Failed to write file");

        let storage = LocalStorage::new();
        // Entry claims a file, filesystem holds a directory
        storage.delete_recursive(&FileEntry::file(path_str(&dir), 0)).expect("delete");
        assert!(!dir.exists());

        storage.delete_recursive(&FileEntry::file(path_str(&dir), 0)).expect("missing is fine");
    }

    #[test]
    fn test_modified_time_copy() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = path_str(&temp_dir.path().join("src.txt"));
        let dst = path_str(&temp_dir.path().join("dst.txt"));
        fs::write(&src, b"a").expect("Failed to write file");
        fs::write(&dst, b"a").expect("Failed to write file");

        let storage = LocalStorage::new();
        let past = SystemTime::now() - Duration::from_secs(86_400);
        storage.set_modified(&src, past).expect("set mtime");

        assert!(crate::storage::copy_modified(&storage, &src, &dst).expect("copy mtime"));
        let copied = storage.modified(&dst).expect("mtime").expect("has mtime");
        let delta = copied.duration_since(past).unwrap_or_else(|e| e.duration());
        assert!(delta < Duration::from_secs(1));
    }

    #[cfg(unix)]
    #[test]
    fn test_stat_agrees_with_exists_on_dangling_link() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(temp_dir.path().join("gone"), &link).expect("Failed to create link");

        let storage = LocalStorage::new();
        let link = path_str(&link);
        assert!(storage.exists(&link));
        let entry = storage.stat(&link).expect("stat link");
        assert!(!entry.is_dir);

        storage.delete_recursive(&entry).expect("delete link");
        assert!(!storage.exists(&link));
    }

    #[test]
    fn test_create_directory_is_idempotent() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dir = path_str(&temp_dir.path().join("a").join("b"));
        let storage = LocalStorage::new();

        storage.create_directory(&dir).expect("create");
        storage.create_directory(&dir).expect("create again");
        assert!(Path::new(&dir).is_dir());
    }

    #[test]
    fn test_create_directory_fails_below_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"x").expect("Failed to write file");

        let storage = LocalStorage::new();
        let result = storage.create_directory(&path_str(&blocker.join("sub")));
        assert!(matches!(result, Err(EngineError::DirectoryCreationFailed { .. })));
    }
}
