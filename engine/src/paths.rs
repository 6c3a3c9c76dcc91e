//! String path helpers.
//!
//! Transfers address both local and virtual locations, so paths travel as
//! `/`-separated strings rather than `PathBuf`. Destination paths are always
//! built with [`join`] so every depth of the tree uses the same rule.

/// Join a directory and a child name with a single `/`.
pub fn join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    format!("{}/{}", dir, name)
}

/// Parent directory of `path`, or `None` for a top-level name.
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&trimmed[..idx]),
        None => None,
    }
}

/// Last component of `path`.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// True for dot-files and dot-directories.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// True when `path` equals `ancestor` or lies somewhere beneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    let ancestor = ancestor.trim_end_matches('/');
    path == ancestor
        || (path.len() > ancestor.len()
            && path.starts_with(ancestor)
            && path.as_bytes()[ancestor.len()] == b'/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_normalizes_trailing_separator() {
        assert_eq!(join("/dst", "a.txt"), "/dst/a.txt");
        assert_eq!(join("/dst/", "a.txt"), "/dst/a.txt");
        assert_eq!(join("/", "a.txt"), "/a.txt");
    }

    #[test]
    fn test_parent_and_file_name() {
        assert_eq!(parent("/dst/sub/a.txt"), Some("/dst/sub"));
        assert_eq!(parent("/a.txt"), Some("/"));
        assert_eq!(parent("a.txt"), None);
        assert_eq!(file_name("/dst/sub/a.txt"), "a.txt");
        assert_eq!(file_name("/dst/sub/"), "sub");
    }

    #[test]
    fn test_is_within_respects_component_boundaries() {
        assert!(is_within("/src/d/x.txt", "/src/d"));
        assert!(is_within("/src/d", "/src/d"));
        assert!(!is_within("/src/dd/x.txt", "/src/d"));
    }
}
