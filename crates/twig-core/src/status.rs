//! Working tree status.
//!
//! Compares the working tree against the current commit and the staging
//! area. The result is plain data; presenting it is left to callers.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::commit::Commit;
use crate::error::TwigResult;
use crate::hash::hash_bytes;
use crate::state::RepoState;
use crate::worktree::WorkTree;

/// Why a path shows up as changed but not staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchEntry {
    pub name: String,
    pub commit: String,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnstagedChange {
    pub path: String,
    pub status: FileStatus,
}

/// Snapshot of branches, staged changes and working tree drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    /// All branches, sorted by name.
    pub branches: Vec<BranchEntry>,
    /// Paths staged for addition.
    pub staged: Vec<String>,
    /// Paths staged for removal.
    pub removed: Vec<String>,
    /// Changes in the working tree that are not staged.
    pub unstaged: Vec<UnstagedChange>,
    /// Working files twig does not track.
    pub untracked: Vec<String>,
}

impl Status {
    /// True if nothing is staged and the working tree matches.
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.removed.is_empty()
            && self.unstaged.is_empty()
            && self.untracked.is_empty()
    }
}

/// Compute status for `state`, whose current commit is `head`.
pub fn compute_status(state: &RepoState, head: &Commit, tree: &WorkTree) -> TwigResult<Status> {
    let staging = &state.staging;
    let on_disk: BTreeSet<String> = tree.list_files()?.into_iter().collect();

    let mut paths: BTreeSet<&str> = on_disk.iter().map(String::as_str).collect();
    paths.extend(head.files.keys().map(String::as_str));
    paths.extend(staging.additions.keys().map(String::as_str));

    let mut unstaged: BTreeMap<String, FileStatus> = BTreeMap::new();
    let mut untracked = Vec::new();

    for path in paths {
        let tracked = head.blob_for(path);
        let staged = staging.additions.get(path).map(String::as_str);
        let removed = staging.is_removed(path);

        if !on_disk.contains(path) {
            if staged.is_some() || (tracked.is_some() && !removed) {
                unstaged.insert(path.to_string(), FileStatus::Deleted);
            }
            continue;
        }

        match (staged, tracked) {
            (Some(staged_hash), _) => {
                if hash_bytes(&tree.read(path)?) != staged_hash {
                    unstaged.insert(path.to_string(), FileStatus::Modified);
                }
            }
            (None, Some(_)) if removed => untracked.push(path.to_string()),
            (None, Some(tracked_hash)) => {
                if hash_bytes(&tree.read(path)?) != tracked_hash {
                    unstaged.insert(path.to_string(), FileStatus::Modified);
                }
            }
            (None, None) => untracked.push(path.to_string()),
        }
    }

    Ok(Status {
        branches: state
            .branches
            .iter()
            .map(|(name, commit)| BranchEntry {
                name: name.clone(),
                commit: commit.clone(),
                current: *name == state.current_branch,
            })
            .collect(),
        staged: staging.additions.keys().cloned().collect(),
        removed: staging.removals.iter().cloned().collect(),
        unstaged: unstaged
            .into_iter()
            .map(|(path, status)| UnstagedChange { path, status })
            .collect(),
        untracked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::FileMap;
    use tempfile::tempdir;

    fn head_with(files: &[(&str, &[u8])]) -> Commit {
        let map: FileMap = files
            .iter()
            .map(|(p, c)| (p.to_string(), hash_bytes(c)))
            .collect();
        Commit::new("snapshot", Some(Commit::root().id), None, map).unwrap()
    }

    #[test]
    fn test_clean_tree() {
        let dir = tempdir().unwrap();
        let tree = WorkTree::new(dir.path());
        tree.write("a.txt", b"a").unwrap();

        let head = head_with(&[("a.txt", b"a")]);
        let state = RepoState::new("master", &head);

        let status = compute_status(&state, &head, &tree).unwrap();
        assert!(status.is_clean());
        assert_eq!(status.branches.len(), 1);
        assert!(status.branches[0].current);
    }

    #[test]
    fn test_reports_every_category() {
        let dir = tempdir().unwrap();
        let tree = WorkTree::new(dir.path());
        tree.write("modified.txt", b"new").unwrap();
        tree.write("staged.txt", b"changed after staging").unwrap();
        tree.write("fresh.txt", b"?").unwrap();
        tree.write("readded.txt", b"r").unwrap();

        let head = head_with(&[
            ("modified.txt", b"old"),
            ("missing.txt", b"m"),
            ("readded.txt", b"r"),
        ]);
        let mut state = RepoState::new("master", &head);
        state.branches.insert("feature".into(), head.id.clone());
        state.staging.stage_addition("staged.txt", hash_bytes(b"staged"));
        state.staging.stage_addition("gone.txt", hash_bytes(b"gone"));
        state.staging.stage_removal("readded.txt");

        let status = compute_status(&state, &head, &tree).unwrap();

        assert_eq!(status.staged, vec!["gone.txt", "staged.txt"]);
        assert_eq!(status.removed, vec!["readded.txt"]);
        assert_eq!(
            status.unstaged,
            vec![
                UnstagedChange { path: "gone.txt".into(), status: FileStatus::Deleted },
                UnstagedChange { path: "missing.txt".into(), status: FileStatus::Deleted },
                UnstagedChange { path: "modified.txt".into(), status: FileStatus::Modified },
                UnstagedChange { path: "staged.txt".into(), status: FileStatus::Modified },
            ]
        );
        assert_eq!(status.untracked, vec!["fresh.txt", "readded.txt"]);
        assert_eq!(
            status.branches.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(),
            vec!["feature", "master"]
        );
    }
}
