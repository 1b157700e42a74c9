use crate::domains::git::{CancelToken, CommandRunner, WorktreeManager};
use crate::errors::{WorktreeError, WorktreeResult};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::PathBuf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Manage the linked worktrees of a git repository.
///
/// Every command prints a JSON value on stdout. Failures print a JSON error
/// object on stderr and exit with status 1, or 2 when the operation was
/// cancelled.
#[derive(Parser, Debug)]
#[command(name = "worktree-manager")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file (defaults to $WORKTREE_MANAGER_CONFIG, then the
    /// per-user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Resolve a path to its repository root
    Open { repo: String },
    /// Print whether a path is inside a repository
    Validate { repo: String },
    /// List the main worktree and all linked worktrees
    List { repo: String },
    /// Create a linked worktree
    Add {
        repo: String,
        path: String,
        branch: String,
        /// Create `branch` instead of checking out an existing one
        #[arg(long, short = 'b')]
        new_branch: bool,
    },
    /// Remove a linked worktree
    Remove {
        repo: String,
        path: String,
        /// Discard uncommitted changes and override a lock
        #[arg(long, short)]
        force: bool,
    },
    /// Protect a linked worktree from removal and pruning
    Lock {
        repo: String,
        path: String,
        /// Recorded alongside the lock
        #[arg(long)]
        reason: Option<String>,
    },
    /// Release a worktree lock
    Unlock { repo: String, path: String },
    /// Remove stale entries for worktrees whose directory is gone
    Prune { repo: String },
    /// List local branches, then remote-tracking ones
    Branches { repo: String },
    /// Switch a worktree to a branch no other worktree holds
    Checkout { worktree: String, branch: String },
    /// Show staged, unstaged and untracked files of a worktree
    Status { worktree: String },
    /// Print whether a worktree has uncommitted or untracked changes
    Dirty { worktree: String },
    /// Fetch all remotes
    Fetch { worktree: String },
    /// Pull the current branch from its upstream
    Pull { worktree: String },
    /// Push the current branch to its upstream
    Push { worktree: String },
    /// Commit the staged changes
    Commit {
        worktree: String,
        #[arg(long, short)]
        message: String,
    },
    /// Add a file to the index
    Stage { worktree: String, file: String },
    /// Move a staged file back to the working tree
    Unstage { worktree: String, file: String },
}

fn to_json<T: Serialize>(value: &T) -> WorktreeResult<Value> {
    serde_json::to_value(value).map_err(|e| WorktreeError::introspection("serialize result", e))
}

fn done() -> Value {
    json!({ "success": true })
}

/// Run one command against the manager and return its JSON result.
pub async fn dispatch<R: CommandRunner>(
    manager: &WorktreeManager<R>,
    command: Command,
    cancel: &CancelToken,
) -> WorktreeResult<Value> {
    log::debug!("Dispatching {command:?}");
    match command {
        Command::Open { repo } => to_json(&manager.open_repository(&repo).await?),
        Command::Validate { repo } => {
            Ok(json!({ "valid": manager.validate_repository(&repo).await? }))
        }
        Command::List { repo } => to_json(&manager.list_worktrees(&repo).await?),
        Command::Add {
            repo,
            path,
            branch,
            new_branch,
        } => to_json(
            &manager
                .add_worktree(&repo, &path, &branch, new_branch)
                .await?,
        ),
        Command::Remove { repo, path, force } => {
            manager.remove_worktree(&repo, &path, force).await?;
            Ok(done())
        }
        Command::Lock { repo, path, reason } => {
            manager
                .lock_worktree(&repo, &path, reason.as_deref())
                .await?;
            Ok(done())
        }
        Command::Unlock { repo, path } => {
            manager.unlock_worktree(&repo, &path).await?;
            Ok(done())
        }
        Command::Prune { repo } => Ok(json!({ "pruned": manager.prune_worktrees(&repo).await? })),
        Command::Branches { repo } => to_json(&manager.list_branches(&repo).await?),
        Command::Checkout { worktree, branch } => Ok(json!({
            "output": manager.checkout_branch(&worktree, &branch).await?
        })),
        Command::Status { worktree } => to_json(&manager.status(&worktree).await?),
        Command::Dirty { worktree } => Ok(json!({
            "dirty": manager.has_uncommitted_changes(&worktree).await?
        })),
        Command::Fetch { worktree } => Ok(json!({
            "output": manager.fetch(&worktree, Some(cancel)).await?
        })),
        Command::Pull { worktree } => Ok(json!({
            "output": manager.pull(&worktree, Some(cancel)).await?
        })),
        Command::Push { worktree } => Ok(json!({
            "output": manager.push(&worktree, Some(cancel)).await?
        })),
        Command::Commit { worktree, message } => Ok(json!({
            "output": manager.commit(&worktree, &message).await?
        })),
        Command::Stage { worktree, file } => {
            manager.stage(&worktree, &file).await?;
            Ok(done())
        }
        Command::Unstage { worktree, file } => {
            manager.unstage(&worktree, &file).await?;
            Ok(done())
        }
    }
}

/// JSON body written to stderr for a failed command.
pub fn error_json(error: &WorktreeError) -> Value {
    json!({
        "error": error,
        "message": error.to_string(),
    })
}

pub fn exit_code(error: &WorktreeError) -> i32 {
    match error {
        WorktreeError::Cancelled { .. } => 2,
        _ => 1,
    }
}
