//! Content-addressable blob store.
//!
//! Blobs live in `.twig/blobs/` using a 2-character prefix directory
//! scheme. Each blob is identified by the SHA-256 of its bytes, written
//! once and never modified or deleted afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{TwigError, TwigResult};
use crate::hash::{hash_bytes, is_hex_id};

/// The content store manages blob storage on disk.
pub struct ContentStore {
    /// Root path: `.twig/blobs/`
    root: PathBuf,
}

impl ContentStore {
    /// Create a new ContentStore rooted at the given path.
    pub fn new(blobs_dir: &Path) -> Self {
        Self {
            root: blobs_dir.to_path_buf(),
        }
    }

    /// Store bytes and return their content hash.
    ///
    /// Adding content that is already present is a no-op and returns
    /// the existing hash.
    pub fn add(&self, data: &[u8]) -> TwigResult<String> {
        let hash = hash_bytes(data);
        let path = self.blob_path(&hash)?;

        if path.exists() {
            return Ok(hash);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, data)?;
        debug!(blob = %hash, size = data.len(), "stored blob");
        Ok(hash)
    }

    /// Retrieve a blob by its hash.
    pub fn get(&self, hash: &str) -> TwigResult<Vec<u8>> {
        let path = self.blob_path(hash)?;
        if !path.exists() {
            return Err(TwigError::BlobNotFound(hash.to_string()));
        }
        Ok(fs::read(&path)?)
    }

    /// Check if a blob exists.
    pub fn contains(&self, hash: &str) -> bool {
        self.blob_path(hash).map(|p| p.exists()).unwrap_or(false)
    }

    /// Filesystem path for a blob hash: `abcdef...` -> `ab/cdef...`
    fn blob_path(&self, hash: &str) -> TwigResult<PathBuf> {
        if hash.len() < 3 || !is_hex_id(hash) {
            return Err(TwigError::BlobNotFound(hash.to_string()));
        }
        let (prefix, rest) = hash.split_at(2);
        Ok(self.root.join(prefix).join(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn blob_count(root: &Path) -> usize {
        walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count()
    }

    #[test]
    fn test_add_and_get() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path());

        let hash = store.add(b"hello world").unwrap();
        assert_eq!(store.get(&hash).unwrap(), b"hello world");
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path());

        let h1 = store.add(b"same content").unwrap();
        let h2 = store.add(&b"same content".to_vec()).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(blob_count(dir.path()), 1);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path());

        let err = store.get("deadbeef00").unwrap_err();
        assert!(matches!(err, TwigError::BlobNotFound(_)));
    }

    #[test]
    fn test_malformed_hash_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path());

        assert!(matches!(store.get("a"), Err(TwigError::BlobNotFound(_))));
        assert!(matches!(
            store.get("../../etc/passwd"),
            Err(TwigError::BlobNotFound(_))
        ));
        assert!(!store.contains("zz"));
    }

    #[test]
    fn test_contains() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path());

        let hash = store.add(b"test").unwrap();
        assert!(store.contains(&hash));
        assert!(!store.contains("0000000000"));
    }
}
