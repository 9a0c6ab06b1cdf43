//! symlink resolution
//!
//! paths are walked component by component; each accumulated prefix gets a
//! non-following lookup, and any symlink found restarts the walk at its
//! target. a decrementing hop budget bounds the walk, so loops and
//! pathological chains fail the same way. there is no separate cycle set;
//! the bound is the cycle protection.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::overlay::{OverlayFs, State};
use crate::path;
use crate::types::{Entry, Metadata};

/// maximum symlink hops before resolution fails (matches the usual OS limit)
pub(crate) const MAX_SYMLINK_HOPS: u32 = 40;

impl OverlayFs {
    /// metadata for a path, following symlinks
    pub fn stat(&self, name: &str) -> Result<Metadata> {
        let state = self.read_state();
        let entry = resolve(&state, "stat", name)?;
        Ok(entry
            .metadata()
            .cloned()
            .expect("resolution never returns tombstones"))
    }

    /// resolve a path to its final non-symlink entry under one read lock
    pub(crate) fn resolve_entry(&self, op: &'static str, name: &str) -> Result<Entry> {
        let state = self.read_state();
        resolve(&state, op, name)
    }
}

fn components(normalized: &str) -> VecDeque<String> {
    normalized
        .split('/')
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// walk `name` to its final non-symlink entry
pub(crate) fn resolve(state: &State, op: &'static str, name: &str) -> Result<Entry> {
    let mut hops = MAX_SYMLINK_HOPS;
    let mut pending = components(&path::normalize(name));
    let mut resolved = String::new();

    while let Some(component) = pending.pop_front() {
        if resolved.is_empty() {
            resolved = component;
        } else {
            resolved = format!("{}/{}", resolved, component);
        }

        // a missing intermediate component surfaces its lookup error directly
        let entry = state.lookup(op, &resolved)?;
        let metadata = entry
            .metadata()
            .expect("lookup never returns tombstones");

        if let Some(target) = metadata.symlink_target() {
            if hops == 0 {
                return Err(Error::TooManyLinks {
                    op,
                    path: path::normalize(name),
                });
            }
            hops -= 1;

            // relative targets resolve against the symlink's directory,
            // absolute targets against the root
            let base_dir = if target.starts_with('/') {
                String::new()
            } else {
                path::parent(&resolved).to_string()
            };
            let mut next = path::join(&base_dir, target);

            // unprocessed components continue under the new target
            for rest in pending.drain(..) {
                next = path::join(&next, &rest);
            }

            pending = components(&next);
            resolved.clear();
        }
    }

    state.lookup(op, &resolved)
}

/// resolved metadata helper for the open path
pub(crate) fn resolve_metadata(state: &State, op: &'static str, name: &str) -> Result<(Entry, Metadata)> {
    let entry = resolve(state, op, name)?;
    let metadata = entry
        .metadata()
        .cloned()
        .expect("resolution never returns tombstones");
    Ok((entry, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::tests::empty_fs;

    #[test]
    fn test_stat_follows_symlink() {
        let fs = empty_fs();
        fs.write_file("a.txt", b"hello", 0o644).unwrap();
        fs.symlink("a.txt", "link").unwrap();

        // lstat sees the link itself, stat sees through it
        assert!(fs.lstat("link").unwrap().is_symlink());
        let meta = fs.stat("link").unwrap();
        assert!(meta.kind.is_regular());
        assert_eq!(meta.size(), 5);
    }

    #[test]
    fn test_symlink_chain() {
        let fs = empty_fs();
        fs.write_file("real.txt", b"content", 0o644).unwrap();
        fs.symlink("real.txt", "l1").unwrap();
        fs.symlink("l1", "l2").unwrap();
        fs.symlink("l2", "l3").unwrap();

        assert_eq!(fs.read_file("l3").unwrap(), b"content");
    }

    #[test]
    fn test_symlink_to_directory_component() {
        let fs = empty_fs();
        fs.mkdir("real", 0o755).unwrap();
        fs.write_file("real/f.txt", b"x", 0o644).unwrap();
        fs.symlink("real", "dirlink").unwrap();

        // resolving a path that crosses the symlinked directory
        assert_eq!(fs.read_file("dirlink/f.txt").unwrap(), b"x");
        assert!(fs.stat("dirlink").unwrap().is_dir());
    }

    #[test]
    fn test_relative_target_resolves_against_link_dir() {
        let fs = empty_fs();
        fs.mkdir("d", 0o755).unwrap();
        fs.write_file("d/real.txt", b"rel", 0o644).unwrap();
        fs.symlink("real.txt", "d/link").unwrap();

        assert_eq!(fs.read_file("d/link").unwrap(), b"rel");
    }

    #[test]
    fn test_absolute_target_resolves_against_root() {
        let fs = empty_fs();
        fs.write_file("top.txt", b"abs", 0o644).unwrap();
        fs.mkdir("d", 0o755).unwrap();
        fs.symlink("/top.txt", "d/link").unwrap();

        assert_eq!(fs.read_file("d/link").unwrap(), b"abs");
    }

    #[test]
    fn test_symlink_loop() {
        let fs = empty_fs();
        fs.symlink("b", "a").unwrap();
        fs.symlink("a", "b").unwrap();

        let err = fs.stat("a").unwrap_err();
        assert!(matches!(err, Error::TooManyLinks { .. }));
    }

    #[test]
    fn test_self_referential_symlink() {
        let fs = empty_fs();
        fs.symlink("me", "me").unwrap();

        let err = fs.read_file("me").unwrap_err();
        assert!(matches!(err, Error::TooManyLinks { .. }));
    }

    #[test]
    fn test_chain_exceeding_budget() {
        let fs = empty_fs();
        fs.write_file("end.txt", b"deep", 0o644).unwrap();
        let mut target = "end.txt".to_string();
        for i in 0..MAX_SYMLINK_HOPS + 1 {
            let link = format!("l{}", i);
            fs.symlink(&target, &link).unwrap();
            target = link;
        }

        let err = fs.stat(&target).unwrap_err();
        assert!(matches!(err, Error::TooManyLinks { .. }));
    }

    #[test]
    fn test_chain_within_budget() {
        let fs = empty_fs();
        fs.write_file("end.txt", b"deep", 0o644).unwrap();
        let mut target = "end.txt".to_string();
        for i in 0..10 {
            let link = format!("l{}", i);
            fs.symlink(&target, &link).unwrap();
            target = link;
        }

        assert_eq!(fs.read_file(&target).unwrap(), b"deep");
    }

    #[test]
    fn test_broken_symlink() {
        let fs = empty_fs();
        fs.symlink("missing.txt", "dangling").unwrap();

        // lstat works, stat surfaces the missing target
        assert!(fs.lstat("dangling").unwrap().is_symlink());
        let err = fs.stat("dangling").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
