//! Merge engine: split-point search and three-way classification.
//!
//! The split point of two tips is found by marking everything reachable
//! from the current tip, then walking the target's ancestry breadth-first
//! and taking the first marked commit. Breadth-first order puts nearer
//! ancestors first. Among candidates at the same depth, the one reached
//! first wins, with first-parent links explored before second-parent
//! links.
//!
//! Each path is then classified by comparing its blob hash at the split
//! point against both tips. The repository applies the resulting
//! [`MergeAction`]s to the working tree and staging area.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::commit::CommitStore;
use crate::config::ConflictMarkers;

/// What to do with a single path when merging target into current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeAction {
    /// Current side already has the right content.
    KeepCurrent,
    /// Write the target's content and stage it.
    TakeTarget,
    /// Delete the file and stage its removal.
    Remove,
    /// Absent on the current side and stays absent.
    LeaveAbsent,
    /// Both sides diverged; write conflict markers and stage the result.
    Conflict,
}

/// Result of a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MergeOutcome {
    /// Current branch moved to the target tip; no commit was created.
    FastForward { commit: String },
    /// A two-parent merge commit was created.
    Merged {
        commit: String,
        split_point: Option<String>,
        conflicted: bool,
        /// Paths written with conflict markers.
        conflicts: Vec<String>,
    },
}

impl MergeOutcome {
    pub fn is_fast_forward(&self) -> bool {
        matches!(self, MergeOutcome::FastForward { .. })
    }

    pub fn is_conflicted(&self) -> bool {
        matches!(self, MergeOutcome::Merged { conflicted: true, .. })
    }

    /// Commit the branch points at after the merge.
    pub fn commit(&self) -> &str {
        match self {
            MergeOutcome::FastForward { commit } | MergeOutcome::Merged { commit, .. } => commit,
        }
    }
}

/// Every commit reachable from `start`, including `start` itself.
///
/// Uses an explicit worklist so deep histories cannot overflow the
/// stack. Unreadable commits are skipped.
pub fn reachable(store: &CommitStore, start: &str) -> HashSet<String> {
    let mut marked = HashSet::new();
    let mut worklist = vec![start.to_string()];

    while let Some(id) = worklist.pop() {
        if marked.contains(&id) {
            continue;
        }
        let commit = match store.lookup(&id) {
            Ok(commit) => commit,
            Err(e) => {
                warn!(commit = %id, error = %e, "reachability walk skipped unreadable commit");
                continue;
            }
        };
        worklist.extend(
            commit
                .parents()
                .filter(|p| !marked.contains(*p))
                .map(str::to_string),
        );
        marked.insert(id);
    }
    marked
}

/// Nearest commit in `target`'s ancestry that is also in `marked`.
pub fn split_point_in(
    store: &CommitStore,
    marked: &HashSet<String>,
    target: &str,
) -> Option<String> {
    store
        .ancestors(target)
        .find(|(_, commit)| marked.contains(&commit.id))
        .map(|(depth, commit)| {
            debug!(split_point = %commit.id, depth, "selected split point");
            commit.id
        })
}

/// Lowest common ancestor of `current` and `target`.
pub fn split_point(store: &CommitStore, current: &str, target: &str) -> Option<String> {
    split_point_in(store, &reachable(store, current), target)
}

/// Decide how to merge one path given its blob hash at the split point,
/// the current tip and the target tip (`None` = absent).
pub fn classify(split: Option<&str>, current: Option<&str>, target: Option<&str>) -> MergeAction {
    if split == target && split != current {
        return if current.is_some() {
            MergeAction::KeepCurrent
        } else {
            MergeAction::LeaveAbsent
        };
    }
    if split == current && split != target {
        return if target.is_some() {
            MergeAction::TakeTarget
        } else {
            MergeAction::Remove
        };
    }
    if current == target {
        return if current.is_some() {
            MergeAction::KeepCurrent
        } else {
            MergeAction::LeaveAbsent
        };
    }
    MergeAction::Conflict
}

/// Conflict file body: current content, then target content, between
/// markers. An absent side contributes nothing.
pub fn conflict_content(current: &[u8], target: &[u8], markers: &ConflictMarkers) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        current.len()
            + target.len()
            + markers.ours.len()
            + markers.separator.len()
            + markers.theirs.len(),
    );
    out.extend_from_slice(markers.ours.as_bytes());
    out.extend_from_slice(current);
    out.extend_from_slice(markers.separator.as_bytes());
    out.extend_from_slice(target);
    out.extend_from_slice(markers.theirs.as_bytes());
    out
}
