//! Commits — immutable snapshot nodes of the history DAG.
//!
//! A commit maps working-tree paths to blob hashes and links to at most
//! two parents. Its id is the SHA-256 of a canonical rendering of its
//! fields, so the same inputs always produce the same id regardless of
//! how the file mapping was built.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TwigError, TwigResult};
use crate::fsutil::atomic_write;
use crate::hash::{hash_str, is_hex_id};

/// Message of the root commit every repository starts from.
pub const ROOT_MESSAGE: &str = "initial commit";

static ROOT_COMMIT_ID: LazyLock<String> = LazyLock::new(|| Commit::root().id);

/// Id of the root commit. Identical in every repository.
pub fn root_commit_id() -> &'static str {
    &ROOT_COMMIT_ID
}

/// Path -> blob hash mapping of a snapshot.
pub type FileMap = BTreeMap<String, String>;

/// An immutable snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commit {
    /// Content hash of the remaining fields.
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// First parent (None only for the root commit).
    pub parent: Option<String>,
    /// Second parent, set on merge commits only.
    pub second_parent: Option<String>,
    /// Tracked files: relative path -> blob hash.
    pub files: FileMap,
}

impl Commit {
    /// Create a commit stamped with the current time.
    pub fn new(
        message: &str,
        parent: Option<String>,
        second_parent: Option<String>,
        files: FileMap,
    ) -> TwigResult<Self> {
        Self::at(Utc::now(), message, parent, second_parent, files)
    }

    /// Create a commit with an explicit timestamp.
    pub fn at(
        timestamp: DateTime<Utc>,
        message: &str,
        parent: Option<String>,
        second_parent: Option<String>,
        files: FileMap,
    ) -> TwigResult<Self> {
        if message.trim().is_empty() {
            return Err(TwigError::EmptyMessage);
        }
        Ok(Self::build(timestamp, message, parent, second_parent, files))
    }

    /// The root commit: fixed message, epoch timestamp, no parents, no files.
    pub fn root() -> Self {
        Self::build(DateTime::<Utc>::UNIX_EPOCH, ROOT_MESSAGE, None, None, FileMap::new())
    }

    fn build(
        timestamp: DateTime<Utc>,
        message: &str,
        parent: Option<String>,
        second_parent: Option<String>,
        files: FileMap,
    ) -> Self {
        let mut commit = Commit {
            id: String::new(),
            message: message.to_string(),
            timestamp,
            parent,
            second_parent,
            files,
        };
        commit.id = commit.compute_id();
        commit
    }

    /// Hash of the canonical rendering of this commit's fields.
    ///
    /// Variable-length fields are length-prefixed. The second parent only
    /// contributes when present, so ordinary commits hash exactly their
    /// message, timestamp, parent and sorted file mapping.
    pub fn compute_id(&self) -> String {
        let mut canonical = format!(
            "message {}:{}\ntimestamp {}\nparent {}\n",
            self.message.len(),
            self.message,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.parent.as_deref().unwrap_or("-"),
        );
        for (path, blob) in &self.files {
            canonical.push_str(&format!("file {}:{} {}\n", path.len(), path, blob));
        }
        if let Some(second) = &self.second_parent {
            canonical.push_str(&format!("merge {second}\n"));
        }
        hash_str(&canonical)
    }

    /// True if the stored id matches the commit's contents.
    pub fn verify_id(&self) -> bool {
        self.id == self.compute_id()
    }

    pub fn is_merge(&self) -> bool {
        self.second_parent.is_some()
    }

    /// Parent ids, first parent first.
    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.parent
            .as_deref()
            .into_iter()
            .chain(self.second_parent.as_deref())
    }

    /// Leading `len` characters of the id.
    pub fn short_id(&self, len: usize) -> &str {
        &self.id[..len.min(self.id.len())]
    }

    /// Blob hash tracked for `path`, if any.
    pub fn blob_for(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }
}

/// Commit records on disk at `.twig/commits/<id>.json`.
pub struct CommitStore {
    root: PathBuf,
}

impl CommitStore {
    pub fn new(commits_dir: &Path) -> Self {
        Self {
            root: commits_dir.to_path_buf(),
        }
    }

    /// Write a commit keyed by its id. Existing records are left untouched.
    pub fn persist(&self, commit: &Commit) -> TwigResult<()> {
        let path = self.record_path(&commit.id)?;
        if path.exists() {
            return Ok(());
        }
        let json = serde_json::to_string_pretty(commit)?;
        atomic_write(&path, json.as_bytes())?;
        debug!(commit = %commit.id, files = commit.files.len(), "persisted commit");
        Ok(())
    }

    /// Load a commit by its full id.
    pub fn lookup(&self, id: &str) -> TwigResult<Commit> {
        let path = self.record_path(id)?;
        if !path.exists() {
            return Err(TwigError::CommitNotFound(id.to_string()));
        }
        let data = fs::read_to_string(&path)?;
        let commit: Commit = serde_json::from_str(&data)?;
        if commit.id != id {
            return Err(TwigError::Corrupt {
                what: format!("commit {id}"),
                reason: format!("record holds id {}", commit.id),
            });
        }
        Ok(commit)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.record_path(id).map(|p| p.exists()).unwrap_or(false)
    }

    /// Breadth-first walk over `id` and everything reachable from it.
    pub fn ancestors(&self, id: &str) -> Ancestors<'_> {
        Ancestors::new(self, id)
    }

    /// Commits along first-parent links, starting at `id`, newest first.
    pub fn first_parent_history(&self, id: &str) -> TwigResult<Vec<Commit>> {
        let mut history = vec![self.lookup(id)?];
        while let Some(parent) = history.last().and_then(|c| c.parent.clone()) {
            match self.lookup(&parent) {
                Ok(commit) => history.push(commit),
                Err(e) => {
                    warn!(commit = %parent, error = %e, "history stops at unreadable parent");
                    break;
                }
            }
        }
        Ok(history)
    }

    fn record_path(&self, id: &str) -> TwigResult<PathBuf> {
        if !is_hex_id(id) {
            return Err(TwigError::CommitNotFound(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.json")))
    }
}

/// Lazy breadth-first iterator over a commit and its ancestors.
///
/// Yields `(depth, commit)` pairs, where depth is the number of parent
/// links from the starting commit. Each commit is yielded once. First
/// parents are queued before second parents. Unreadable commits are
/// skipped, which ends the walk along that line.
pub struct Ancestors<'a> {
    store: &'a CommitStore,
    queue: VecDeque<(usize, String)>,
    visited: HashSet<String>,
}

impl<'a> Ancestors<'a> {
    fn new(store: &'a CommitStore, start: &str) -> Self {
        Self {
            store,
            queue: VecDeque::from([(0, start.to_string())]),
            visited: HashSet::from([start.to_string()]),
        }
    }
}

impl Iterator for Ancestors<'_> {
    type Item = (usize, Commit);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((depth, id)) = self.queue.pop_front() {
            let commit = match self.store.lookup(&id) {
                Ok(commit) => commit,
                Err(e) => {
                    warn!(commit = %id, error = %e, "ancestor walk skipped unreadable commit");
                    continue;
                }
            };
            for parent in commit.parents() {
                if self.visited.insert(parent.to_string()) {
                    self.queue.push_back((depth + 1, parent.to_string()));
                }
            }
            return Some((depth, commit));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn files(pairs: &[(&str, &str)]) -> FileMap {
        pairs
            .iter()
            .map(|(p, h)| (p.to_string(), h.to_string()))
            .collect()
    }

    fn persist(store: &CommitStore, commit: Commit) -> String {
        store.persist(&commit).unwrap();
        commit.id
    }

    /// File-less commit at `secs` with the given parents.
    fn node(secs: i64, msg: &str, parent: &str, second: Option<&str>) -> Commit {
        Commit::at(
            ts(secs),
            msg,
            Some(parent.to_string()),
            second.map(str::to_string),
            FileMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_blank_message_rejected() {
        let err = Commit::new("   ", None, None, FileMap::new()).unwrap_err();
        assert!(matches!(err, TwigError::EmptyMessage));
        assert!(Commit::new("", None, None, FileMap::new()).is_err());
    }

    #[test]
    fn test_id_deterministic() {
        let a = Commit::at(ts(100), "add a", Some("p".into()), None, files(&[("a", "1")])).unwrap();
        let b = Commit::at(ts(100), "add a", Some("p".into()), None, files(&[("a", "1")])).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 64);
    }

    #[test]
    fn test_id_independent_of_insertion_order() {
        let mut forward = FileMap::new();
        forward.insert("a.txt".into(), "h1".into());
        forward.insert("b.txt".into(), "h2".into());
        forward.insert("c.txt".into(), "h3".into());

        let mut backward = FileMap::new();
        backward.insert("c.txt".into(), "h3".into());
        backward.insert("b.txt".into(), "h2".into());
        backward.insert("a.txt".into(), "h1".into());

        let a = Commit::at(ts(5), "m", None, None, forward).unwrap();
        let b = Commit::at(ts(5), "m", None, None, backward).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_id_depends_on_every_field() {
        let make = |secs, msg, parent: &str, second: Option<&str>, blob| {
            Commit::at(
                ts(secs),
                msg,
                Some(parent.to_string()),
                second.map(str::to_string),
                files(&[("a", blob)]),
            )
            .unwrap()
        };
        let base = make(1, "m", "p", None, "1");
        let other_msg = make(1, "n", "p", None, "1");
        let other_time = make(2, "m", "p", None, "1");
        let other_parent = make(1, "m", "q", None, "1");
        let other_files = make(1, "m", "p", None, "2");
        let merge = make(1, "m", "p", Some("r"), "1");

        for other in [other_msg, other_time, other_parent, other_files, merge] {
            assert_ne!(base.id, other.id);
        }
    }

    #[test]
    fn test_root_commit_is_fixed() {
        let root = Commit::root();
        assert_eq!(root.id, root_commit_id());
        assert_eq!(root.id, Commit::root().id);
        assert_eq!(root.message, ROOT_MESSAGE);
        assert!(root.parent.is_none());
        assert!(root.files.is_empty());
        assert_eq!(root.timestamp.timestamp(), 0);
    }

    #[test]
    fn test_persist_and_lookup_round_trip() {
        let dir = tempdir().unwrap();
        let store = CommitStore::new(dir.path());

        let commit = Commit::new(
            "hello",
            Some(root_commit_id().into()),
            None,
            files(&[("a", "1")]),
        )
        .unwrap();
        store.persist(&commit).unwrap();
        store.persist(&commit).unwrap();

        let loaded = store.lookup(&commit.id).unwrap();
        assert_eq!(loaded, commit);
        assert!(loaded.verify_id());
    }

    #[test]
    fn test_lookup_missing() {
        let dir = tempdir().unwrap();
        let store = CommitStore::new(dir.path());

        assert!(matches!(store.lookup("abc123"), Err(TwigError::CommitNotFound(_))));
        assert!(matches!(store.lookup("../x"), Err(TwigError::CommitNotFound(_))));
        assert!(!store.contains("abc123"));
    }

    #[test]
    fn test_short_id() {
        let commit = Commit::root();
        assert_eq!(commit.short_id(7), &commit.id[..7]);
        assert_eq!(commit.short_id(500), commit.id);
    }

    #[test]
    fn test_ancestors_follow_both_parents() {
        let dir = tempdir().unwrap();
        let store = CommitStore::new(dir.path());

        // root <- a <- b
        //          \      \
        //           c <--- m (b, c)
        let root = persist(&store, Commit::root());
        let a = persist(&store, node(1, "a", &root, None));
        let b = persist(&store, node(2, "b", &a, None));
        let c = persist(&store, node(3, "c", &a, None));
        let m = persist(&store, node(4, "m", &b, Some(&c)));

        let walk: Vec<(usize, String)> = store.ancestors(&m).map(|(d, c)| (d, c.id)).collect();
        assert_eq!(walk, vec![(0, m), (1, b), (1, c), (2, a), (3, root)]);
    }

    #[test]
    fn test_ancestors_skip_missing_parent() {
        let dir = tempdir().unwrap();
        let store = CommitStore::new(dir.path());

        let orphan = persist(
            &store,
            Commit::at(ts(1), "orphan", Some("0123abcd".into()), None, FileMap::new()).unwrap(),
        );
        let walk: Vec<String> = store.ancestors(&orphan).map(|(_, c)| c.id).collect();
        assert_eq!(walk, vec![orphan]);

        assert_eq!(store.ancestors("ffff").count(), 0);
    }

    #[test]
    fn test_first_parent_history() {
        let dir = tempdir().unwrap();
        let store = CommitStore::new(dir.path());

        let root = persist(&store, Commit::root());
        let a = persist(&store, node(1, "a", &root, None));
        let side = persist(&store, node(2, "side", &root, None));
        let m = persist(&store, node(3, "m", &a, Some(&side)));

        let ids: Vec<String> = store
            .first_parent_history(&m)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![m, a, root]);
    }
}
