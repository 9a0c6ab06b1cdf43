//! path normalization and helpers
//!
//! all manifest paths are slash-separated, relative, with no trailing slash.
//! the canonical key for the filesystem root is the empty string: `""`, `"."`
//! and `"/"` all normalize to it.

/// normalize a path to its canonical manifest key
///
/// removes redundant separators and `.` components, resolves `..` without
/// escaping the root, and strips any leading slash.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// parent directory of a normalized path ("" for root and top-level names)
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

/// final component of a normalized path ("" for root)
pub fn base_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// join two path fragments and normalize the result
pub fn join(prefix: &str, rest: &str) -> String {
    if prefix.is_empty() {
        normalize(rest)
    } else if rest.is_empty() {
        normalize(prefix)
    } else {
        normalize(&format!("{}/{}", prefix, rest))
    }
}

/// true if `child` is a direct child of `parent`
///
/// both paths must already be normalized. for the root parent, a direct
/// child is any non-empty path with no separator at all.
pub fn is_direct_child(parent: &str, child: &str) -> bool {
    if parent.is_empty() {
        return !child.is_empty() && !child.contains('/');
    }
    let Some(remainder) = child.strip_prefix(parent) else {
        return false;
    };
    let Some(remainder) = remainder.strip_prefix('/') else {
        return false;
    };
    !remainder.is_empty() && !remainder.contains('/')
}

/// true if `path` equals `prefix` or lives underneath it
///
/// both paths must already be normalized; the root prefix covers everything.
pub fn is_within(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    path == prefix || path.starts_with(&format!("{}/", prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_root_forms() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("."), "");
        assert_eq!(normalize("/"), "");
        assert_eq!(normalize("./."), "");
    }

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize("a//b"), "a/b");
        assert_eq!(normalize("/a/b/"), "a/b");
        assert_eq!(normalize("./a/./b"), "a/b");
    }

    #[test]
    fn test_normalize_dotdot() {
        assert_eq!(normalize("a/b/../c"), "a/c");
        assert_eq!(normalize("../a"), "a");
        assert_eq!(normalize("a/.."), "");
    }

    #[test]
    fn test_parent_and_base() {
        assert_eq!(parent("a/b/c"), "a/b");
        assert_eq!(parent("a"), "");
        assert_eq!(parent(""), "");
        assert_eq!(base_name("a/b/c"), "c");
        assert_eq!(base_name("a"), "a");
        assert_eq!(base_name(""), "");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a", "b/c"), "a/b/c");
        assert_eq!(join("a/b", ""), "a/b");
        assert_eq!(join("a", "../b"), "b");
    }

    #[test]
    fn test_is_direct_child() {
        assert!(is_direct_child("", "a"));
        assert!(!is_direct_child("", "a/b"));
        assert!(!is_direct_child("", ""));
        assert!(is_direct_child("a", "a/b"));
        assert!(!is_direct_child("a", "a/b/c"));
        assert!(!is_direct_child("a", "ab"));
        assert!(!is_direct_child("a", "a"));
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("", "anything/at/all"));
        assert!(is_within("a", "a"));
        assert!(is_within("a", "a/b/c"));
        assert!(!is_within("a", "ab"));
        assert!(!is_within("a/b", "a"));
    }
}
