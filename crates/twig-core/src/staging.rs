//! Staging area.
//!
//! Pending additions map a path to the hash of the content staged for
//! it. Pending removals are paths to drop from the next commit. A path is
//! never in both sets. Staged bytes wait in `.twig/staging/` until a
//! commit moves them into the content store.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{TwigError, TwigResult};
use crate::hash::{hash_bytes, is_hex_id};

/// Pending changes for the next commit.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StagingArea {
    /// Relative path -> hash of the staged content.
    pub additions: BTreeMap<String, String>,
    /// Relative paths to untrack.
    pub removals: BTreeSet<String>,
}

impl StagingArea {
    /// Stage `hash` as the new content of `path`.
    pub fn stage_addition(&mut self, path: &str, hash: String) {
        self.removals.remove(path);
        self.additions.insert(path.to_string(), hash);
    }

    /// Mark `path` for removal, dropping any pending addition.
    pub fn stage_removal(&mut self, path: &str) {
        self.additions.remove(path);
        self.removals.insert(path.to_string());
    }

    /// Drop a pending addition. Returns true if one existed.
    pub fn unstage(&mut self, path: &str) -> bool {
        self.additions.remove(path).is_some()
    }

    pub fn is_staged(&self, path: &str) -> bool {
        self.additions.contains_key(path)
    }

    pub fn is_removed(&self, path: &str) -> bool {
        self.removals.contains(path)
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    pub fn clear(&mut self) {
        self.additions.clear();
        self.removals.clear();
    }
}

/// Holding pool for staged bytes, keyed by content hash.
pub struct StagedContents {
    root: PathBuf,
}

impl StagedContents {
    pub fn new(staging_dir: &Path) -> Self {
        Self {
            root: staging_dir.to_path_buf(),
        }
    }

    /// Hold `data` until the next commit and return its hash.
    pub fn put(&self, data: &[u8]) -> TwigResult<String> {
        let hash = hash_bytes(data);
        let path = self.root.join(&hash);
        if !path.exists() {
            fs::write(&path, data)?;
        }
        Ok(hash)
    }

    /// Read staged bytes back.
    pub fn read(&self, hash: &str) -> TwigResult<Vec<u8>> {
        let path = self.root.join(hash);
        if !is_hex_id(hash) || !path.exists() {
            return Err(TwigError::BlobNotFound(hash.to_string()));
        }
        Ok(fs::read(path)?)
    }

    /// Discard everything held.
    pub fn clear(&self) -> TwigResult<()> {
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_addition_and_removal_stay_disjoint() {
        let mut staging = StagingArea::default();

        staging.stage_addition("a.txt", "h1".into());
        staging.stage_removal("a.txt");
        assert!(!staging.is_staged("a.txt"));
        assert!(staging.is_removed("a.txt"));

        staging.stage_addition("a.txt", "h2".into());
        assert!(staging.is_staged("a.txt"));
        assert!(!staging.is_removed("a.txt"));
        assert_eq!(staging.additions["a.txt"], "h2");
    }

    #[test]
    fn test_unstage_and_clear() {
        let mut staging = StagingArea::default();
        assert!(staging.is_empty());

        staging.stage_addition("a.txt", "h1".into());
        staging.stage_removal("b.txt");
        assert!(staging.unstage("a.txt"));
        assert!(!staging.unstage("a.txt"));
        assert!(!staging.is_empty());

        staging.clear();
        assert!(staging.is_empty());
    }

    #[test]
    fn test_staged_contents_put_read_clear() {
        let dir = tempdir().unwrap();
        let pool = StagedContents::new(dir.path());

        let hash = pool.put(b"pending").unwrap();
        assert_eq!(hash, hash_bytes(b"pending"));
        assert_eq!(pool.read(&hash).unwrap(), b"pending");

        pool.clear().unwrap();
        assert!(matches!(pool.read(&hash), Err(TwigError::BlobNotFound(_))));
    }
}
