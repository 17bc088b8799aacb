//! Repository — the main entry point for twig operations.
//!
//! Every operation follows the same shape: load the state record, check
//! preconditions, touch the working tree and stores, then write the
//! state record back whole. Nothing is written before the operation's
//! preconditions have passed.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::commit::{Commit, CommitStore, FileMap};
use crate::config::RepoConfig;
use crate::error::{TwigError, TwigResult};
use crate::hash::hash_bytes;
use crate::merge::{self, MergeAction, MergeOutcome};
use crate::object::ContentStore;
use crate::staging::{StagedContents, StagingArea};
use crate::state::RepoState;
use crate::status::{self, Status};
use crate::worktree::WorkTree;
use crate::CONTROL_DIR;

const STATE_FILE: &str = "state.json";
const CONFIG_FILE: &str = "config.json";

/// Result of staging a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum StageOutcome {
    /// Content differs from the current commit and is now staged.
    Staged { hash: String },
    /// Content matches the current commit; any pending change was dropped.
    MatchesHead,
}

/// A twig repository.
pub struct Repository {
    /// Path to the `.twig/` directory.
    twig_dir: PathBuf,
    config: RepoConfig,
    blobs: ContentStore,
    commits: CommitStore,
    staged: StagedContents,
    worktree: WorkTree,
}

impl Repository {
    /// Initialize a new repository in `root` with default settings.
    pub fn init(root: &Path) -> TwigResult<Self> {
        Self::init_with_config(root, RepoConfig::default())
    }

    /// Initialize a new repository: control layout, config, the root
    /// commit and the default branch pointing at it.
    pub fn init_with_config(root: &Path, config: RepoConfig) -> TwigResult<Self> {
        let twig_dir = root.join(CONTROL_DIR);
        if twig_dir.exists() {
            return Err(TwigError::AlreadyInitialized);
        }
        validate_branch_name(&config.default_branch)?;

        fs::create_dir_all(twig_dir.join("blobs"))?;
        fs::create_dir_all(twig_dir.join("commits"))?;
        fs::create_dir_all(twig_dir.join("staging"))?;
        config.save(&twig_dir.join(CONFIG_FILE))?;

        let repo = Self::open(root)?;
        let root_commit = Commit::root();
        repo.commits.persist(&root_commit)?;
        repo.save_state(&RepoState::new(&config.default_branch, &root_commit))?;

        info!(
            root = %root.display(),
            branch = %config.default_branch,
            commit = %root_commit.id,
            "initialized repository"
        );
        Ok(repo)
    }

    /// Open an existing repository rooted at `root`.
    pub fn open(root: &Path) -> TwigResult<Self> {
        let twig_dir = root.join(CONTROL_DIR);
        if !twig_dir.is_dir() {
            return Err(TwigError::NotARepo);
        }
        let config = RepoConfig::load(&twig_dir.join(CONFIG_FILE))?;

        Ok(Self {
            blobs: ContentStore::new(&twig_dir.join("blobs")),
            commits: CommitStore::new(&twig_dir.join("commits")),
            staged: StagedContents::new(&twig_dir.join("staging")),
            worktree: WorkTree::new(root),
            config,
            twig_dir,
        })
    }

    pub fn root(&self) -> &Path {
        self.worktree.root()
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn commit_store(&self) -> &CommitStore {
        &self.commits
    }

    pub fn content_store(&self) -> &ContentStore {
        &self.blobs
    }

    pub fn current_branch(&self) -> TwigResult<String> {
        Ok(self.load_state()?.current_branch)
    }

    /// Branch name -> commit id.
    pub fn branches(&self) -> TwigResult<BTreeMap<String, String>> {
        Ok(self.load_state()?.branches)
    }

    /// The commit the current branch points at.
    pub fn head(&self) -> TwigResult<Commit> {
        let state = self.load_state()?;
        self.head_commit(&state)
    }

    pub fn staging(&self) -> TwigResult<StagingArea> {
        Ok(self.load_state()?.staging)
    }

    /// Load a commit by full or abbreviated id.
    pub fn get_commit(&self, id: &str) -> TwigResult<Commit> {
        let state = self.load_state()?;
        self.commits.lookup(&resolve_prefix(&state.commits, id)?)
    }

    // -----------------------------------------------------------------------
    // Staging
    // -----------------------------------------------------------------------

    /// Stage the working copy of `path`.
    pub fn add(&self, path: &str) -> TwigResult<StageOutcome> {
        let contents = self.worktree.read(path)?;
        self.stage(path, &contents)
    }

    /// Stage `contents` as the new version of `path`.
    ///
    /// If the content equals what the current commit tracks, any pending
    /// addition or removal for the path is dropped instead.
    pub fn stage(&self, path: &str, contents: &[u8]) -> TwigResult<StageOutcome> {
        self.worktree.resolve(path)?;
        let mut state = self.load_state()?;
        let head = self.head_commit(&state)?;
        let outcome = self.stage_in(&mut state, &head, path, contents)?;
        self.save_state(&state)?;
        Ok(outcome)
    }

    /// Unstage `path`, and if the current commit tracks it, mark it for
    /// removal and delete it from the working tree.
    pub fn remove(&self, path: &str) -> TwigResult<()> {
        self.worktree.resolve(path)?;
        let mut state = self.load_state()?;
        let head = self.head_commit(&state)?;

        let was_staged = state.staging.unstage(path);
        let tracked = head.files.contains_key(path);
        if !was_staged && !tracked {
            return Err(TwigError::NothingToRemove(path.to_string()));
        }

        if tracked {
            state.staging.stage_removal(path);
            self.worktree.remove(path)?;
        }
        self.save_state(&state)?;
        debug!(path, was_staged, tracked, "removed path");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Commits
    // -----------------------------------------------------------------------

    /// Fold the staging area into a new commit on the current branch.
    pub fn commit(&self, message: &str) -> TwigResult<Commit> {
        if message.trim().is_empty() {
            return Err(TwigError::EmptyMessage);
        }
        let mut state = self.load_state()?;
        if state.staging.is_empty() {
            return Err(TwigError::NothingToCommit);
        }

        let commit = self.write_commit(&mut state, message, None)?;
        self.save_state(&state)?;
        self.staged.clear()?;

        info!(
            branch = %state.current_branch,
            commit = %commit.id,
            files = commit.files.len(),
            "created commit"
        );
        Ok(commit)
    }

    /// Ids of all commits with exactly this message.
    pub fn find_by_message(&self, message: &str) -> TwigResult<BTreeSet<String>> {
        let state = self.load_state()?;
        state
            .messages
            .get(message)
            .filter(|ids| !ids.is_empty())
            .cloned()
            .ok_or_else(|| TwigError::MessageNotFound(message.to_string()))
    }

    /// Expand an abbreviated commit id.
    ///
    /// An exact match wins. Otherwise the prefix must match exactly one
    /// known commit.
    pub fn resolve_abbreviated_hash(&self, prefix: &str) -> TwigResult<String> {
        let state = self.load_state()?;
        resolve_prefix(&state.commits, prefix)
    }

    /// First-parent history of the current branch, newest first.
    pub fn log(&self) -> TwigResult<Vec<Commit>> {
        let state = self.load_state()?;
        self.commits.first_parent_history(state.head())
    }

    /// Every commit ever created, newest first.
    pub fn global_log(&self) -> TwigResult<Vec<Commit>> {
        let state = self.load_state()?;
        let mut commits = state
            .commits
            .iter()
            .map(|id| self.commits.lookup(id))
            .collect::<TwigResult<Vec<_>>>()?;
        commits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(commits)
    }

    /// Parent ids of a merge commit, abbreviated to the configured length.
    /// Empty for ordinary commits.
    pub fn merge_parents<'a>(&self, commit: &'a Commit) -> Vec<&'a str> {
        if !commit.is_merge() {
            return Vec::new();
        }
        let len = self.config.short_id_len;
        commit.parents().map(|id| &id[..len.min(id.len())]).collect()
    }

    pub fn status(&self) -> TwigResult<Status> {
        let state = self.load_state()?;
        let head = self.head_commit(&state)?;
        status::compute_status(&state, &head, &self.worktree)
    }

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    /// Create a branch pointing at the current commit.
    pub fn branch(&self, name: &str) -> TwigResult<()> {
        validate_branch_name(name)?;
        let mut state = self.load_state()?;
        if state.branches.contains_key(name) {
            return Err(TwigError::BranchExists(name.to_string()));
        }
        let head = state.head().to_string();
        state.branches.insert(name.to_string(), head.clone());
        self.save_state(&state)?;
        info!(branch = name, commit = %head, "created branch");
        Ok(())
    }

    pub fn delete_branch(&self, name: &str) -> TwigResult<()> {
        let mut state = self.load_state()?;
        if !state.branches.contains_key(name) {
            return Err(TwigError::BranchNotFound(name.to_string()));
        }
        if state.current_branch == name {
            return Err(TwigError::RemoveCurrentBranch);
        }
        state.branches.remove(name);
        self.save_state(&state)?;
        info!(branch = name, "deleted branch");
        Ok(())
    }

    /// Switch to another branch, replacing the working tree with its
    /// commit's files.
    pub fn checkout_branch(&self, name: &str) -> TwigResult<()> {
        let mut state = self.load_state()?;
        let target_id = state.branch_head(name)?.to_string();
        if state.current_branch == name {
            return Err(TwigError::AlreadyOnBranch);
        }
        let head = self.head_commit(&state)?;
        let target = self.commits.lookup(&target_id)?;
        self.check_untracked(&state, &head, &target)?;

        self.switch_tree(&head, &target)?;
        state.staging.clear();
        state.current_branch = name.to_string();
        self.save_state(&state)?;
        self.staged.clear()?;

        info!(branch = name, commit = %target.id, "checked out branch");
        Ok(())
    }

    /// Restore one file from a commit (the current one when `commit` is
    /// `None`) into the working tree. Staging is untouched.
    pub fn checkout_path(&self, commit: Option<&str>, path: &str) -> TwigResult<()> {
        self.worktree.resolve(path)?;
        let state = self.load_state()?;
        let id = match commit {
            Some(prefix) => resolve_prefix(&state.commits, prefix)?,
            None => state.head().to_string(),
        };
        let source = self.commits.lookup(&id)?;
        let blob = source
            .blob_for(path)
            .ok_or_else(|| TwigError::FileNotInCommit(path.to_string()))?;

        let data = self.blobs.get(blob)?;
        self.worktree.write(path, &data)?;
        debug!(path, commit = %source.id, "checked out file");
        Ok(())
    }

    /// Move the current branch to an arbitrary commit and make the working
    /// tree match it.
    pub fn reset(&self, commit: &str) -> TwigResult<Commit> {
        let mut state = self.load_state()?;
        let id = resolve_prefix(&state.commits, commit)?;
        let target = self.commits.lookup(&id)?;
        let head = self.head_commit(&state)?;
        self.check_untracked(&state, &head, &target)?;

        self.switch_tree(&head, &target)?;
        state.staging.clear();
        state.move_head(&target.id);
        self.save_state(&state)?;
        self.staged.clear()?;

        info!(branch = %state.current_branch, commit = %target.id, "reset branch");
        Ok(target)
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    /// Merge `branch` into the current branch.
    ///
    /// Fast-forwards when the current tip is an ancestor of the target.
    /// Otherwise applies a three-way merge against the split point and
    /// records a merge commit whose parents are the current and target
    /// tips. Conflicted files are written with markers and committed; the
    /// outcome reports them.
    pub fn merge(&self, branch: &str) -> TwigResult<MergeOutcome> {
        let mut state = self.load_state()?;
        if !state.staging.is_empty() {
            return Err(TwigError::UncommittedChanges);
        }
        let target_id = state.branch_head(branch)?.to_string();
        if state.current_branch == branch {
            return Err(TwigError::MergeWithSelf);
        }
        let head = self.head_commit(&state)?;
        let target = self.commits.lookup(&target_id)?;
        self.check_untracked(&state, &head, &target)?;

        let head_ancestry = merge::reachable(&self.commits, &head.id);
        if head_ancestry.contains(&target.id) {
            return Err(TwigError::AncestorMerge);
        }

        if merge::reachable(&self.commits, &target.id).contains(&head.id) {
            self.switch_tree(&head, &target)?;
            state.move_head(&target.id);
            self.save_state(&state)?;
            info!(
                branch = %state.current_branch,
                from = %head.id,
                to = %target.id,
                "fast-forwarded branch"
            );
            return Ok(MergeOutcome::FastForward { commit: target.id });
        }

        let split_point = merge::split_point_in(&self.commits, &head_ancestry, &target.id);
        let split_files = match &split_point {
            Some(id) => self.commits.lookup(id)?.files,
            None => {
                warn!(
                    current = %head.id,
                    target = %target.id,
                    "no common ancestor; merging against empty tree"
                );
                FileMap::new()
            }
        };

        let paths: BTreeSet<&String> = split_files
            .keys()
            .chain(head.files.keys())
            .chain(target.files.keys())
            .collect();

        let mut conflicts = Vec::new();
        for path in paths {
            let ours = head.blob_for(path);
            let theirs = target.blob_for(path);
            let action = merge::classify(split_files.get(path).map(String::as_str), ours, theirs);
            debug!(path = %path, ?action, "merge action");

            match action {
                MergeAction::KeepCurrent | MergeAction::LeaveAbsent => {}
                MergeAction::TakeTarget => {
                    let data = self.blob_or_empty(theirs)?;
                    self.worktree.write(path, &data)?;
                    self.stage_in(&mut state, &head, path, &data)?;
                }
                MergeAction::Remove => {
                    self.worktree.remove(path)?;
                    state.staging.stage_removal(path);
                }
                MergeAction::Conflict => {
                    let body = merge::conflict_content(
                        &self.blob_or_empty(ours)?,
                        &self.blob_or_empty(theirs)?,
                        &self.config.conflict_markers,
                    );
                    self.worktree.write(path, &body)?;
                    self.stage_in(&mut state, &head, path, &body)?;
                    warn!(path = %path, "merge conflict");
                    conflicts.push(path.clone());
                }
            }
        }

        let message = format!("Merged {branch} into {}.", state.current_branch);
        let commit = self.write_commit(&mut state, &message, Some(target.id.clone()))?;
        self.save_state(&state)?;
        self.staged.clear()?;

        let conflicted = !conflicts.is_empty();
        info!(
            branch = %state.current_branch,
            merged = branch,
            commit = %commit.id,
            conflicted,
            "merged branch"
        );
        Ok(MergeOutcome::Merged {
            commit: commit.id,
            split_point,
            conflicted,
            conflicts,
        })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn state_path(&self) -> PathBuf {
        self.twig_dir.join(STATE_FILE)
    }

    fn load_state(&self) -> TwigResult<RepoState> {
        RepoState::load(&self.state_path())
    }

    fn save_state(&self, state: &RepoState) -> TwigResult<()> {
        state.save(&self.state_path())
    }

    fn head_commit(&self, state: &RepoState) -> TwigResult<Commit> {
        self.commits.lookup(state.head())
    }

    fn blob_or_empty(&self, hash: Option<&str>) -> TwigResult<Vec<u8>> {
        match hash {
            Some(hash) => self.blobs.get(hash),
            None => Ok(Vec::new()),
        }
    }

    fn stage_in(
        &self,
        state: &mut RepoState,
        head: &Commit,
        path: &str,
        contents: &[u8],
    ) -> TwigResult<StageOutcome> {
        let hash = hash_bytes(contents);
        if head.blob_for(path) == Some(hash.as_str()) {
            state.staging.unstage(path);
            state.staging.removals.remove(path);
            debug!(path, "content matches current commit; nothing staged");
            return Ok(StageOutcome::MatchesHead);
        }

        self.staged.put(contents)?;
        state.staging.stage_addition(path, hash.clone());
        debug!(path, blob = %hash, "staged addition");
        Ok(StageOutcome::Staged { hash })
    }

    /// Build, persist and record a commit from the current commit plus the
    /// staging area. The caller saves the state and clears staged contents.
    fn write_commit(
        &self,
        state: &mut RepoState,
        message: &str,
        second_parent: Option<String>,
    ) -> TwigResult<Commit> {
        let head = self.head_commit(state)?;
        let mut files = head.files;

        for (path, hash) in &state.staging.additions {
            let data = self.staged.read(hash)?;
            self.blobs.add(&data)?;
            files.insert(path.clone(), hash.clone());
        }
        for path in &state.staging.removals {
            files.remove(path);
        }

        let commit = Commit::new(message, Some(head.id), second_parent, files)?;
        self.commits.persist(&commit)?;
        state.record_commit(&commit);
        Ok(commit)
    }

    /// Fail if a working file that is neither tracked nor staged would be
    /// overwritten by `target`.
    fn check_untracked(&self, state: &RepoState, head: &Commit, target: &Commit) -> TwigResult<()> {
        let in_the_way = target.files.keys().find(|path| {
            !head.files.contains_key(*path)
                && !state.staging.is_staged(path)
                && self.worktree.exists(path)
        });
        match in_the_way {
            Some(path) => {
                warn!(path = %path, commit = %target.id, "untracked file in the way");
                Err(TwigError::UntrackedFileInTheWay(path.clone()))
            }
            None => Ok(()),
        }
    }

    /// Make the working tree match `target`, deleting files tracked by
    /// `head` that `target` does not have.
    fn switch_tree(&self, head: &Commit, target: &Commit) -> TwigResult<()> {
        for (path, blob) in &target.files {
            let up_to_date =
                self.worktree.exists(path) && hash_bytes(&self.worktree.read(path)?) == *blob;
            if !up_to_date {
                let data = self.blobs.get(blob)?;
                self.worktree.write(path, &data)?;
            }
        }
        for path in head.files.keys() {
            if !target.files.contains_key(path) {
                self.worktree.remove(path)?;
            }
        }
        Ok(())
    }
}

fn validate_branch_name(name: &str) -> TwigResult<()> {
    if name.trim().is_empty() || name.trim() != name {
        return Err(TwigError::InvalidBranchName(name.to_string()));
    }
    Ok(())
}

/// Expand `prefix` against the set of known commit ids.
fn resolve_prefix(commits: &BTreeSet<String>, prefix: &str) -> TwigResult<String> {
    if prefix.is_empty() {
        return Err(TwigError::CommitNotFound(prefix.to_string()));
    }
    if commits.contains(prefix) {
        return Ok(prefix.to_string());
    }

    let mut matches: Vec<String> = commits
        .range(prefix.to_string()..)
        .take_while(|id| id.starts_with(prefix))
        .cloned()
        .collect();

    match matches.len() {
        0 => Err(TwigError::CommitNotFound(prefix.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(TwigError::AmbiguousPrefix {
            prefix: prefix.to_string(),
            matches,
        }),
    }
}
