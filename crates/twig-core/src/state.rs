//! Repository state record.
//!
//! The single mutable record of a repository: branch pointers, the
//! current branch, the staging area and the commit indexes. Stored as
//! `.twig/state.json`, loaded whole at the start of an operation and
//! written back whole at the end.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::commit::Commit;
use crate::error::{TwigError, TwigResult};
use crate::fsutil::atomic_write;
use crate::staging::StagingArea;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoState {
    /// Branch name -> commit id.
    pub branches: BTreeMap<String, String>,
    pub current_branch: String,
    pub staging: StagingArea,
    /// Every commit id ever created in this repository.
    pub commits: BTreeSet<String>,
    /// Commit message -> ids of commits carrying it.
    pub messages: BTreeMap<String, BTreeSet<String>>,
}

impl RepoState {
    /// Fresh state with a single branch pointing at `root`.
    pub fn new(branch: &str, root: &Commit) -> Self {
        let mut state = Self {
            branches: BTreeMap::from([(branch.to_string(), root.id.clone())]),
            current_branch: branch.to_string(),
            staging: StagingArea::default(),
            commits: BTreeSet::new(),
            messages: BTreeMap::new(),
        };
        state.index_commit(root);
        state
    }

    pub fn load(path: &Path) -> TwigResult<Self> {
        if !path.exists() {
            return Err(TwigError::NotARepo);
        }
        let data = fs::read_to_string(path)?;
        let state: RepoState = serde_json::from_str(&data)?;
        if !state.branches.contains_key(&state.current_branch) {
            return Err(TwigError::Corrupt {
                what: "repository state".to_string(),
                reason: format!("current branch {} has no pointer", state.current_branch),
            });
        }
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> TwigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
    }

    /// Commit id the current branch points at.
    pub fn head(&self) -> &str {
        self.branches
            .get(&self.current_branch)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Commit id a branch points at.
    pub fn branch_head(&self, name: &str) -> TwigResult<&str> {
        self.branches
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| TwigError::BranchNotFound(name.to_string()))
    }

    /// Point the current branch at `id`.
    pub fn move_head(&mut self, id: &str) {
        self.branches
            .insert(self.current_branch.clone(), id.to_string());
    }

    /// Record a freshly created commit: advance the current branch,
    /// index it, and clear the staging area.
    pub fn record_commit(&mut self, commit: &Commit) {
        self.move_head(&commit.id);
        self.index_commit(commit);
        self.staging.clear();
    }

    fn index_commit(&mut self, commit: &Commit) {
        self.commits.insert(commit.id.clone());
        self.messages
            .entry(commit.message.clone())
            .or_default()
            .insert(commit.id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::FileMap;
    use tempfile::tempdir;

    #[test]
    fn test_new_points_branch_at_root() {
        let root = Commit::root();
        let state = RepoState::new("master", &root);

        assert_eq!(state.head(), root.id);
        assert!(state.commits.contains(&root.id));
        assert!(state.messages[&root.message].contains(&root.id));
    }

    #[test]
    fn test_record_commit_advances_and_clears_staging() {
        let root = Commit::root();
        let mut state = RepoState::new("master", &root);
        state.staging.stage_addition("a.txt", "h".into());

        let commit = Commit::new("add a", Some(root.id.clone()), None, FileMap::new()).unwrap();
        state.record_commit(&commit);

        assert_eq!(state.head(), commit.id);
        assert!(state.staging.is_empty());
        assert_eq!(state.commits.len(), 2);
        assert!(state.messages["add a"].contains(&commit.id));
    }

    #[test]
    fn test_branch_head_unknown() {
        let state = RepoState::new("master", &Commit::root());
        assert!(matches!(
            state.branch_head("nope"),
            Err(TwigError::BranchNotFound(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = RepoState::new("master", &Commit::root());
        state.staging.stage_removal("gone.txt");
        state.save(&path).unwrap();

        assert_eq!(RepoState::load(&path).unwrap(), state);
    }

    #[test]
    fn test_load_missing_is_not_a_repo() {
        let dir = tempdir().unwrap();
        let result = RepoState::load(&dir.path().join("state.json"));
        assert!(matches!(result, Err(TwigError::NotARepo)));
    }
}
