//! Working tree access.
//!
//! All reads and writes of user files go through [`WorkTree`]. Paths are
//! relative, `/`-separated, and may not escape the root or reach into
//! the control directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{TwigError, TwigResult};
use crate::fsutil::remove_empty_dirs;
use crate::ignore::IgnoreRules;
use crate::CONTROL_DIR;

pub struct WorkTree {
    root: PathBuf,
    rules: IgnoreRules,
}

impl WorkTree {
    /// Open the working tree at `root`, loading `.twigignore` if present.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            rules: IgnoreRules::load(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an absolute one, rejecting anything
    /// that escapes the root or targets the control directory.
    pub fn resolve(&self, rel_path: &str) -> TwigResult<PathBuf> {
        let invalid = || TwigError::InvalidPath(rel_path.to_string());
        let path = Path::new(rel_path);
        if rel_path.is_empty() {
            return Err(invalid());
        }
        let mut components = path.components().peekable();
        if let Some(Component::Normal(first)) = components.peek() {
            if *first == CONTROL_DIR {
                return Err(invalid());
            }
        }
        if !components.all(|c| matches!(c, Component::Normal(_))) {
            return Err(invalid());
        }
        Ok(self.root.join(path))
    }

    pub fn exists(&self, rel_path: &str) -> bool {
        self.resolve(rel_path).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn read(&self, rel_path: &str) -> TwigResult<Vec<u8>> {
        let path = self.resolve(rel_path)?;
        if !path.is_file() {
            return Err(TwigError::FileNotFound(rel_path.to_string()));
        }
        Ok(fs::read(path)?)
    }

    /// Write a file, creating parent directories as needed.
    pub fn write(&self, rel_path: &str, data: &[u8]) -> TwigResult<()> {
        let path = self.resolve(rel_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }

    /// Delete a file if present and prune directories left empty.
    /// Returns true if a file was removed.
    pub fn remove(&self, rel_path: &str) -> TwigResult<bool> {
        let path = self.resolve(rel_path)?;
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        if let Some(parent) = path.parent() {
            remove_empty_dirs(parent, &self.root)?;
        }
        Ok(true)
    }

    /// All non-ignored files under the root, as sorted relative paths.
    pub fn list_files(&self) -> TwigResult<Vec<String>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                !(e.file_type().is_dir() && self.rules.is_dir_ignored(&name))
            });

        for entry in walker {
            let entry = entry.map_err(|e| TwigError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !self.rules.is_file_ignored(&rel) {
                files.push(rel);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_read_remove() {
        let dir = tempdir().unwrap();
        let tree = WorkTree::new(dir.path());

        tree.write("nested/dir/a.txt", b"hello").unwrap();
        assert!(tree.exists("nested/dir/a.txt"));
        assert_eq!(tree.read("nested/dir/a.txt").unwrap(), b"hello");

        assert!(tree.remove("nested/dir/a.txt").unwrap());
        assert!(!tree.exists("nested/dir/a.txt"));
        assert!(!dir.path().join("nested").exists());
        assert!(!tree.remove("nested/dir/a.txt").unwrap());
    }

    #[test]
    fn test_read_missing() {
        let dir = tempdir().unwrap();
        let tree = WorkTree::new(dir.path());
        assert!(matches!(tree.read("nope.txt"), Err(TwigError::FileNotFound(_))));
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = tempdir().unwrap();
        let tree = WorkTree::new(dir.path());

        for bad in ["", "../x", "a/../../x", "/etc/passwd", ".twig/state.json", "./a"] {
            assert!(
                matches!(tree.resolve(bad), Err(TwigError::InvalidPath(_))),
                "{bad} should be rejected"
            );
        }
        assert!(tree.resolve("a/b.txt").is_ok());
    }

    #[test]
    fn test_list_files_skips_control_and_ignored() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".twig/blobs")).unwrap();
        fs::write(dir.path().join(".twig/state.json"), "{}").unwrap();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("build/out.bin"), "x").unwrap();
        fs::write(dir.path().join(".twigignore"), "build\n*.log\n").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("debug.log"), "l").unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.txt"), "a").unwrap();

        let tree = WorkTree::new(dir.path());
        assert_eq!(
            tree.list_files().unwrap(),
            vec![".twigignore", "b.txt", "src/a.txt"]
        );
    }
}
