//! Error types for twig operations.
//!
//! Every failure is terminal for the operation in flight. Variants are
//! grouped into an [`ErrorKind`] so callers can map them to exit codes
//! without matching on individual variants.

use std::io;

use thiserror::Error;

/// Coarse classification of a [`TwigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input.
    Validation,
    /// Unknown branch, commit, file or message.
    NotFound,
    /// An abbreviated id matched more than one commit.
    Ambiguous,
    /// An untracked working file blocks the operation.
    Conflict,
    /// The request is well-formed but makes no sense in the current state.
    InvalidOperation,
    /// Nothing staged, or staged changes block the operation.
    State,
    /// The control directory is missing or already present.
    Repository,
    /// I/O or serialization failure underneath the engine.
    Storage,
}

impl ErrorKind {
    /// Process exit status a command front end should use for this kind.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Validation => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::Ambiguous => 4,
            ErrorKind::Conflict => 5,
            ErrorKind::InvalidOperation => 6,
            ErrorKind::State => 7,
            ErrorKind::Repository => 8,
            ErrorKind::Storage => 9,
        }
    }
}

/// All possible twig errors.
#[derive(Debug, Error)]
pub enum TwigError {
    #[error("please enter a commit message")]
    EmptyMessage,

    #[error("a branch with that name already exists: {0}")]
    BranchExists(String),

    #[error("invalid branch name: '{0}'")]
    InvalidBranchName(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("file does not exist: {0}")]
    FileNotFound(String),

    #[error("a branch with that name does not exist: {0}")]
    BranchNotFound(String),

    #[error("no commit with that id exists: {0}")]
    CommitNotFound(String),

    #[error("blob not found: {0}")]
    BlobNotFound(String),

    #[error("file does not exist in that commit: {0}")]
    FileNotInCommit(String),

    #[error("found no commit with that message: {0}")]
    MessageNotFound(String),

    #[error("ambiguous commit id '{prefix}' matches {} commits", .matches.len())]
    AmbiguousPrefix { prefix: String, matches: Vec<String> },

    #[error("there is an untracked file in the way; delete it or add it first: {0}")]
    UntrackedFileInTheWay(String),

    #[error("cannot remove the current branch")]
    RemoveCurrentBranch,

    #[error("no need to checkout the current branch")]
    AlreadyOnBranch,

    #[error("cannot merge a branch with itself")]
    MergeWithSelf,

    #[error("given branch is an ancestor of the current branch")]
    AncestorMerge,

    #[error("no changes added to the commit")]
    NothingToCommit,

    #[error("no reason to remove the file: {0}")]
    NothingToRemove(String),

    #[error("you have uncommitted changes")]
    UncommittedChanges,

    #[error("not a twig repository (missing .twig/)")]
    NotARepo,

    #[error("a twig repository already exists in this directory")]
    AlreadyInitialized,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted {what}: {reason}")]
    Corrupt { what: String, reason: String },
}

impl TwigError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TwigError::EmptyMessage
            | TwigError::BranchExists(_)
            | TwigError::InvalidBranchName(_)
            | TwigError::InvalidPath(_) => ErrorKind::Validation,
            TwigError::FileNotFound(_)
            | TwigError::BranchNotFound(_)
            | TwigError::CommitNotFound(_)
            | TwigError::BlobNotFound(_)
            | TwigError::FileNotInCommit(_)
            | TwigError::MessageNotFound(_) => ErrorKind::NotFound,
            TwigError::AmbiguousPrefix { .. } => ErrorKind::Ambiguous,
            TwigError::UntrackedFileInTheWay(_) => ErrorKind::Conflict,
            TwigError::RemoveCurrentBranch
            | TwigError::AlreadyOnBranch
            | TwigError::MergeWithSelf
            | TwigError::AncestorMerge => ErrorKind::InvalidOperation,
            TwigError::NothingToCommit
            | TwigError::NothingToRemove(_)
            | TwigError::UncommittedChanges => ErrorKind::State,
            TwigError::NotARepo | TwigError::AlreadyInitialized => ErrorKind::Repository,
            TwigError::Io(_) | TwigError::Json(_) | TwigError::Corrupt { .. } => {
                ErrorKind::Storage
            }
        }
    }

    /// True if the error reports a missing entity.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Convenience alias for Results in twig.
pub type TwigResult<T> = Result<T, TwigError>;
