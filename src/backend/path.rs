// Slash-separated store paths such as `messages/alice/bob/-Nx3...`

use crate::error::{BackendError, BackendResult};

/// Characters a path segment may not contain.
const FORBIDDEN: [char; 6] = ['.', '#', '$', '[', ']', '\u{7f}'];

/// Split a path into validated segments. Leading, trailing and doubled
/// slashes are ignored; the empty path is the root.
pub fn segments(path: &str) -> BackendResult<Vec<&str>> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    for part in &parts {
        if part.chars().any(|c| FORBIDDEN.contains(&c) || c.is_control()) {
            return Err(BackendError::InvalidPath(path.to_string()));
        }
    }
    Ok(parts)
}

/// Canonical form of a path: segments joined by single slashes.
pub fn normalize(path: &str) -> BackendResult<String> {
    Ok(segments(path)?.join("/"))
}

pub fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// True when `ancestor` is `path` itself or one of its parents.
pub fn is_ancestor_or_self(ancestor: &str, path: &str) -> bool {
    if ancestor.is_empty() {
        return true;
    }
    path == ancestor || (path.starts_with(ancestor) && path[ancestor.len()..].starts_with('/'))
}

/// True when a write at one path can change what is stored at the other.
pub fn related(a: &str, b: &str) -> bool {
    is_ancestor_or_self(a, b) || is_ancestor_or_self(b, a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_extra_slashes() {
        assert_eq!(normalize("/messages//a/b/").unwrap(), "messages/a/b");
        assert_eq!(normalize("").unwrap(), "");
    }

    #[test]
    fn test_rejects_forbidden_characters() {
        assert!(matches!(normalize("users/a.b"), Err(BackendError::InvalidPath(_))));
        assert!(normalize("users/$uid").is_err());
        assert!(normalize("users/[0]").is_err());
    }

    #[test]
    fn test_ancestry() {
        assert!(is_ancestor_or_self("messages/a", "messages/a/b"));
        assert!(is_ancestor_or_self("messages/a", "messages/a"));
        assert!(!is_ancestor_or_self("messages/a", "messages/ab"));
        assert!(is_ancestor_or_self("", "anything"));
        assert!(related("users/a/status", "users/a"));
        assert!(!related("users/a", "users/b"));
    }

    #[test]
    fn test_join() {
        assert_eq!(join(&["messages", "a", "b"]), "messages/a/b");
        assert_eq!(join(&["messages/", "/a"]), "messages/a");
    }
}
