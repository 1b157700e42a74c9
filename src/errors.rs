use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum WorktreeError {
    RepositoryNotFound {
        path: String,
    },
    InvalidPath {
        path: String,
        message: String,
    },
    WorktreeNotFound {
        message: String,
    },
    MainWorktreeProtected {
        path: String,
    },
    BranchInUse {
        message: String,
    },
    UncommittedChanges {
        message: String,
    },
    WorktreeLocked {
        message: String,
    },
    WorktreeNotLocked {
        message: String,
    },
    NothingToCommit {
        message: String,
    },
    CommandFailed {
        operation: String,
        message: String,
    },
    Cancelled {
        operation: String,
    },
    IoError {
        operation: String,
        path: String,
        message: String,
    },
    IntrospectionError {
        operation: String,
        message: String,
    },
}

pub type WorktreeResult<T> = Result<T, WorktreeError>;

impl WorktreeError {
    pub fn git(operation: &str, error: impl ToString) -> Self {
        WorktreeError::CommandFailed {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }

    pub fn io(operation: &str, path: impl ToString, error: impl ToString) -> Self {
        WorktreeError::IoError {
            operation: operation.to_string(),
            path: path.to_string(),
            message: error.to_string(),
        }
    }

    pub fn introspection(operation: &str, error: impl ToString) -> Self {
        WorktreeError::IntrospectionError {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }

    pub fn invalid_path(path: impl ToString, message: impl ToString) -> Self {
        WorktreeError::InvalidPath {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    /// Outcomes a caller may answer by re-issuing a removal with `force = true`.
    pub fn is_force_retryable(&self) -> bool {
        matches!(
            self,
            Self::UncommittedChanges { .. } | Self::WorktreeLocked { .. }
        )
    }
}

impl fmt::Display for WorktreeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RepositoryNotFound { path } => {
                write!(f, "Not a git repository: {path}")
            }
            Self::InvalidPath { path, message } => {
                write!(f, "Invalid path '{path}': {message}")
            }
            Self::WorktreeNotFound { message } => {
                write!(f, "Worktree not found: {message}")
            }
            Self::MainWorktreeProtected { path } => {
                write!(
                    f,
                    "'{path}' is the main worktree and cannot be removed, locked or unlocked"
                )
            }
            Self::BranchInUse { message } => {
                write!(f, "Branch already checked out in another worktree: {message}")
            }
            Self::UncommittedChanges { message } => {
                write!(f, "Worktree has uncommitted changes: {message}")
            }
            Self::WorktreeLocked { message } => {
                write!(f, "Worktree is locked: {message}")
            }
            Self::WorktreeNotLocked { message } => {
                write!(f, "Worktree is not locked: {message}")
            }
            Self::NothingToCommit { message } => {
                write!(f, "Nothing to commit: {message}")
            }
            Self::CommandFailed { operation, message } => {
                write!(f, "Git operation '{operation}' failed: {message}")
            }
            Self::Cancelled { operation } => {
                write!(f, "Git operation '{operation}' was cancelled")
            }
            Self::IoError {
                operation,
                path,
                message,
            } => {
                write!(f, "I/O error during '{operation}' on '{path}': {message}")
            }
            Self::IntrospectionError { operation, message } => {
                write!(f, "Repository introspection '{operation}' failed: {message}")
            }
        }
    }
}

impl std::error::Error for WorktreeError {}

impl From<WorktreeError> for String {
    fn from(error: WorktreeError) -> Self {
        error.to_string()
    }
}
