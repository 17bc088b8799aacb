//! twig-core — Core library for twig, a local version control engine.
//!
//! twig records snapshots of a working tree as content-addressed commits,
//! links them into a DAG, tracks named branches, and merges divergent
//! histories with a three-way merge from their lowest common ancestor.

pub mod commit;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod hash;
pub mod ignore;
pub mod merge;
pub mod object;
pub mod repo;
pub mod staging;
pub mod state;
pub mod status;
pub mod worktree;

/// Name of the control directory at the working root.
pub const CONTROL_DIR: &str = ".twig";

pub use commit::{Commit, CommitStore};
pub use config::RepoConfig;
pub use error::{ErrorKind, TwigError, TwigResult};
pub use merge::MergeOutcome;
pub use repo::{Repository, StageOutcome};
pub use status::Status;
