//! Mutating git operations, run as `git` subprocesses with an explicit
//! working directory and a discrete argument vector.

use super::branches::is_valid_branch_name;
use super::command_runner::{
    CancelToken, CommandOutput, CommandRunner, RunOutcome, SystemCommandRunner,
};
use super::porcelain::classify_failure;
use super::safety::{CheckedMutation, MutationKind};
use crate::errors::{WorktreeError, WorktreeResult};
use std::io;
use std::path::Path;
use std::time::Duration;

/// Never prompt for credentials, and keep messages in the untranslated form
/// the classifier matches against.
const GIT_ENV: &[(&str, &str)] = &[("GIT_TERMINAL_PROMPT", "0"), ("LC_ALL", "C")];

pub struct GitExecutor<R: CommandRunner = SystemCommandRunner> {
    runner: R,
    program: String,
    network_timeout: Option<Duration>,
}

impl GitExecutor<SystemCommandRunner> {
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_runner(SystemCommandRunner, program)
    }
}

impl<R: CommandRunner> GitExecutor<R> {
    pub fn with_runner(runner: R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            network_timeout: None,
        }
    }

    pub fn with_network_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.network_timeout = timeout;
        self
    }

    async fn run_git(
        &self,
        operation: &str,
        cwd: &Path,
        args: &[&str],
        cancel: Option<&CancelToken>,
    ) -> WorktreeResult<CommandOutput> {
        log::debug!(
            "[GitExecutor] {operation}: {} {} (cwd: {})",
            self.program,
            args.join(" "),
            cwd.display()
        );

        let outcome = self
            .runner
            .run(&self.program, args, cwd, GIT_ENV, cancel)
            .await
            .map_err(|e| spawn_error(operation, &self.program, e))?;

        let output = match outcome {
            RunOutcome::Completed(output) => output,
            RunOutcome::Cancelled => {
                log::info!("[GitExecutor] {operation} cancelled in {}", cwd.display());
                return Err(WorktreeError::Cancelled {
                    operation: operation.to_string(),
                });
            }
        };

        if output.success() {
            return Ok(output);
        }

        let text = failure_text(&output);
        log::warn!(
            "[GitExecutor] {operation} failed (status {:?}) in {}: {}",
            output.status,
            cwd.display(),
            text.trim()
        );
        Err(classify_failure(operation, text))
    }

    /// Like [`run_git`](Self::run_git) but bounded by the configured network
    /// timeout; hitting it terminates the process and reports `Cancelled`.
    async fn run_network(
        &self,
        operation: &str,
        cwd: &Path,
        args: &[&str],
        cancel: Option<&CancelToken>,
    ) -> WorktreeResult<String> {
        let output = match self.network_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.run_git(operation, cwd, args, cancel)).await
                {
                    Ok(result) => result?,
                    Err(_) => {
                        log::warn!(
                            "[GitExecutor] {operation} timed out after {}s in {}",
                            limit.as_secs(),
                            cwd.display()
                        );
                        return Err(WorktreeError::Cancelled {
                            operation: operation.to_string(),
                        });
                    }
                }
            }
            None => self.run_git(operation, cwd, args, cancel).await?,
        };

        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            Ok(output.stderr.trim().to_string())
        } else {
            Ok(stdout.to_string())
        }
    }

    pub async fn add_worktree(
        &self,
        repo_root: &Path,
        target: &Path,
        branch: &str,
        create_branch: bool,
    ) -> WorktreeResult<String> {
        ensure_branch_name("worktree add", branch)?;
        let target = target.to_string_lossy();
        let args: Vec<&str> = if create_branch {
            vec!["worktree", "add", "-b", branch, &*target]
        } else {
            vec!["worktree", "add", &*target, branch]
        };

        log::info!(
            "[GitExecutor] Adding worktree {target} on branch {branch} (new branch: {create_branch})"
        );
        let output = self.run_git("worktree add", repo_root, &args, None).await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn remove_worktree(&self, mutation: &CheckedMutation) -> WorktreeResult<()> {
        if !matches!(mutation.kind(), MutationKind::Remove { .. }) {
            return Err(WorktreeError::git(
                "worktree remove",
                "mutation was not checked for removal",
            ));
        }

        let path = mutation.worktree_path().to_string_lossy();
        let mut args = vec!["worktree", "remove"];
        for _ in 0..mutation.force_level() {
            args.push("--force");
        }
        args.push(&*path);

        log::info!(
            "[GitExecutor] Removing worktree {path} (force level {})",
            mutation.force_level()
        );
        self.run_git("worktree remove", mutation.repo_root(), &args, None)
            .await?;
        Ok(())
    }

    pub async fn lock_worktree(
        &self,
        mutation: &CheckedMutation,
        reason: Option<&str>,
    ) -> WorktreeResult<()> {
        if mutation.kind() != MutationKind::Lock {
            return Err(WorktreeError::git(
                "worktree lock",
                "mutation was not checked for locking",
            ));
        }

        let path = mutation.worktree_path().to_string_lossy();
        let mut args = vec!["worktree", "lock"];
        if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
            args.push("--reason");
            args.push(reason);
        }
        args.push(&*path);

        log::info!("[GitExecutor] Locking worktree {path}");
        self.run_git("worktree lock", mutation.repo_root(), &args, None)
            .await?;
        Ok(())
    }

    pub async fn unlock_worktree(&self, mutation: &CheckedMutation) -> WorktreeResult<()> {
        if mutation.kind() != MutationKind::Unlock {
            return Err(WorktreeError::git(
                "worktree unlock",
                "mutation was not checked for unlocking",
            ));
        }

        let path = mutation.worktree_path().to_string_lossy();
        log::info!("[GitExecutor] Unlocking worktree {path}");
        self.run_git(
            "worktree unlock",
            mutation.repo_root(),
            &["worktree", "unlock", &*path],
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn prune_worktrees(&self, repo_root: &Path) -> WorktreeResult<()> {
        self.run_git("worktree prune", repo_root, &["worktree", "prune"], None)
            .await?;
        Ok(())
    }

    /// Raw `git worktree list --porcelain` output.
    pub async fn list_worktrees_porcelain(&self, repo_root: &Path) -> WorktreeResult<String> {
        let output = self
            .run_git(
                "worktree list",
                repo_root,
                &["worktree", "list", "--porcelain"],
                None,
            )
            .await?;
        Ok(output.stdout)
    }

    pub async fn fetch(
        &self,
        worktree: &Path,
        cancel: Option<&CancelToken>,
    ) -> WorktreeResult<String> {
        self.run_network("fetch", worktree, &["fetch", "--all"], cancel)
            .await
    }

    pub async fn pull(
        &self,
        worktree: &Path,
        cancel: Option<&CancelToken>,
    ) -> WorktreeResult<String> {
        self.run_network("pull", worktree, &["pull"], cancel).await
    }

    pub async fn push(
        &self,
        worktree: &Path,
        cancel: Option<&CancelToken>,
    ) -> WorktreeResult<String> {
        self.run_network("push", worktree, &["push"], cancel).await
    }

    pub async fn commit(&self, worktree: &Path, message: &str) -> WorktreeResult<String> {
        if message.trim().is_empty() {
            return Err(WorktreeError::git("commit", "commit message is empty"));
        }
        let output = self
            .run_git("commit", worktree, &["commit", "-m", message], None)
            .await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn stage(&self, worktree: &Path, file: &str) -> WorktreeResult<()> {
        self.run_git("stage", worktree, &["add", "--", file], None)
            .await?;
        Ok(())
    }

    pub async fn unstage(&self, worktree: &Path, file: &str) -> WorktreeResult<()> {
        self.run_git(
            "unstage",
            worktree,
            &["restore", "--staged", "--", file],
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn checkout(&self, worktree: &Path, branch: &str) -> WorktreeResult<String> {
        ensure_branch_name("checkout", branch)?;
        let output = self
            .run_git("checkout", worktree, &["checkout", branch, "--"], None)
            .await?;
        // git reports the switch on stderr.
        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            Ok(output.stderr.trim().to_string())
        } else {
            Ok(stdout.to_string())
        }
    }
}

fn ensure_branch_name(operation: &str, branch: &str) -> WorktreeResult<()> {
    if is_valid_branch_name(branch) {
        Ok(())
    } else {
        Err(WorktreeError::git(
            operation,
            format!("invalid branch name '{branch}'"),
        ))
    }
}

fn failure_text(output: &CommandOutput) -> &str {
    if output.stderr.trim().is_empty() {
        &output.stdout
    } else {
        &output.stderr
    }
}

fn spawn_error(operation: &str, program: &str, error: io::Error) -> WorktreeError {
    if error.kind() == io::ErrorKind::NotFound {
        WorktreeError::git(
            operation,
            format!("git executable '{program}' was not found"),
        )
    } else {
        WorktreeError::git(operation, format!("failed to run {program}: {error}"))
    }
}
