//! scoped views rooted at a directory
//!
//! a [`Subtree`] borrows the parent overlay and rewrites paths on the way
//! in; it holds no state of its own, so it always reflects the parent's
//! current composed view. escaping the prefix is impossible: `..` is
//! resolved during normalization before the prefix is applied.

use crate::error::{Error, Result};
use crate::overlay::dir::DirEntry;
use crate::overlay::file::{Handle, WriteHandle};
use crate::overlay::OverlayFs;
use crate::path;
use crate::types::Metadata;

/// a view of the overlay scoped to one directory
pub struct Subtree<'a> {
    parent: &'a OverlayFs,
    prefix: String,
}

impl std::fmt::Debug for Subtree<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subtree")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl OverlayFs {
    /// scope a view to an existing directory
    ///
    /// the prefix must name a directory at construction time; the root
    /// yields a view equivalent to the overlay itself.
    pub fn subtree(&self, dir: &str) -> Result<Subtree<'_>> {
        let prefix = path::normalize(dir);
        let metadata = self.lstat(&prefix).map_err(|e| match e {
            Error::NotFound { path, .. } => Error::NotFound { op: "subtree", path },
            other => other,
        })?;
        if !metadata.is_dir() {
            return Err(Error::NotADirectory {
                op: "subtree",
                path: prefix,
            });
        }
        Ok(Subtree {
            parent: self,
            prefix,
        })
    }
}

impl<'a> Subtree<'a> {
    /// the directory this view is rooted at, as a parent-overlay path
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    // the relative name is normalized on its own first, so ".." clamps at
    // the view root instead of climbing out of the prefix
    fn full(&self, name: &str) -> String {
        path::join(&self.prefix, &path::normalize(name))
    }

    pub fn open(&self, name: &str) -> Result<Handle> {
        self.parent.open(&self.full(name))
    }

    pub fn create(&self, name: &str) -> Result<WriteHandle<'a>> {
        self.parent.create(&self.full(name))
    }

    pub fn create_with_mode(&self, name: &str, mode: u32) -> Result<WriteHandle<'a>> {
        self.parent.create_with_mode(&self.full(name), mode)
    }

    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.parent.read_file(&self.full(name))
    }

    pub fn write_file(&self, name: &str, content: &[u8], mode: u32) -> Result<()> {
        self.parent.write_file(&self.full(name), content, mode)
    }

    pub fn read_dir(&self, name: &str) -> Result<Vec<DirEntry>> {
        self.parent.read_dir(&self.full(name))
    }

    pub fn stat(&self, name: &str) -> Result<Metadata> {
        self.parent.stat(&self.full(name))
    }

    pub fn lstat(&self, name: &str) -> Result<Metadata> {
        self.parent.lstat(&self.full(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.parent.exists(&self.full(name))
    }

    pub fn is_dir(&self, name: &str) -> bool {
        self.parent.is_dir(&self.full(name))
    }

    pub fn mkdir(&self, name: &str, mode: u32) -> Result<()> {
        self.parent.mkdir(&self.full(name), mode)
    }

    pub fn mkdir_all(&self, name: &str, mode: u32) -> Result<()> {
        self.parent.mkdir_all(&self.full(name), mode)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        self.parent.remove(&self.full(name))
    }

    pub fn remove_all(&self, name: &str) -> Result<()> {
        self.parent.remove_all(&self.full(name))
    }

    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.parent.rename(&self.full(old_name), &self.full(new_name))
    }

    pub fn symlink(&self, target: &str, name: &str) -> Result<()> {
        self.parent.symlink(target, &self.full(name))
    }

    pub fn read_link(&self, name: &str) -> Result<String> {
        self.parent.read_link(&self.full(name))
    }

    pub fn chmod(&self, name: &str, mode: u32) -> Result<()> {
        self.parent.chmod(&self.full(name), mode)
    }

    pub fn chtimes(&self, name: &str, atime: i64, mtime: i64) -> Result<()> {
        self.parent.chtimes(&self.full(name), atime, mtime)
    }

    /// glob within the view; matches come back prefix-relative
    pub fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let full_pattern = self.full(pattern);
        let matches = self.parent.glob(&full_pattern)?;
        if self.prefix.is_empty() {
            return Ok(matches);
        }

        let lead = format!("{}/", self.prefix);
        Ok(matches
            .into_iter()
            .filter_map(|m| m.strip_prefix(&lead).map(str::to_string))
            .collect())
    }

    /// scope further down; the result borrows the same parent overlay
    pub fn subtree(&self, dir: &str) -> Result<Subtree<'a>> {
        self.parent.subtree(&self.full(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::tests::{empty_fs, seeded_fs};

    #[test]
    fn test_subtree_requires_directory() {
        let fs = seeded_fs();
        assert!(fs.subtree("docs").is_ok());
        assert!(matches!(
            fs.subtree("x.txt").unwrap_err(),
            Error::NotADirectory { .. }
        ));
        assert!(matches!(
            fs.subtree("missing").unwrap_err(),
            Error::NotFound { .. }
        ));
    }

    #[test]
    fn test_subtree_of_root() {
        let fs = seeded_fs();
        let view = fs.subtree("/").unwrap();
        assert_eq!(view.prefix(), "");
        assert!(view.exists("x.txt"));
    }

    #[test]
    fn test_reads_and_writes_go_through_prefix() {
        let fs = seeded_fs();
        let view = fs.subtree("docs").unwrap();

        view.write_file("a.md", b"scoped", 0o644).unwrap();
        assert_eq!(view.read_file("a.md").unwrap(), b"scoped");
        assert_eq!(fs.read_file("docs/a.md").unwrap(), b"scoped");
    }

    #[test]
    fn test_listing_is_scoped() {
        let fs = seeded_fs();
        fs.write_file("docs/one.md", b"1", 0o644).unwrap();
        fs.write_file("top.txt", b"t", 0o644).unwrap();

        let view = fs.subtree("docs").unwrap();
        let names: Vec<String> = view
            .read_dir("")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["one.md"]);
    }

    #[test]
    fn test_dotdot_cannot_escape() {
        let fs = seeded_fs();
        fs.write_file("docs/inner.md", b"in", 0o644).unwrap();
        let view = fs.subtree("docs").unwrap();

        // ".." collapses before the prefix applies, so this stays inside
        assert_eq!(view.read_file("sub/../inner.md").unwrap(), b"in");
        let err = view.read_file("../x.txt").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_mutations_are_scoped() {
        let fs = empty_fs();
        fs.mkdir("scope", 0o755).unwrap();
        let view = fs.subtree("scope").unwrap();

        view.mkdir_all("a/b", 0o755).unwrap();
        view.write_file("a/b/f", b"x", 0o644).unwrap();
        view.rename("a/b/f", "a/g").unwrap();
        view.remove_all("a/b").unwrap();

        assert!(fs.exists("scope/a/g"));
        assert!(!fs.exists("scope/a/b"));
    }

    #[test]
    fn test_glob_returns_relative_paths() {
        let fs = seeded_fs();
        fs.write_file("docs/a.md", b"a", 0o644).unwrap();
        fs.write_file("docs/b.md", b"b", 0o644).unwrap();
        fs.write_file("c.md", b"c", 0o644).unwrap();

        let view = fs.subtree("docs").unwrap();
        assert_eq!(view.glob("*.md").unwrap(), vec!["a.md", "b.md"]);
    }

    #[test]
    fn test_nested_subtree() {
        let fs = empty_fs();
        fs.mkdir_all("a/b", 0o755).unwrap();
        fs.write_file("a/b/f.txt", b"deep", 0o644).unwrap();

        let outer = fs.subtree("a").unwrap();
        let inner = outer.subtree("b").unwrap();
        assert_eq!(inner.prefix(), "a/b");
        assert_eq!(inner.read_file("f.txt").unwrap(), b"deep");
    }

    #[test]
    fn test_symlink_targets_resolve_in_parent_namespace() {
        let fs = seeded_fs();
        let view = fs.subtree("docs").unwrap();
        view.symlink("/x.txt", "link").unwrap();

        // the target is absolute in the overlay, not the view
        assert_eq!(fs.read_file("docs/link").unwrap(), b"hello");
    }
}
