//! Entry point for every worktree operation.
//!
//! Paths arrive as raw strings and are validated on each call; nothing about
//! repository state is cached between calls. Reads go through git2 on the
//! blocking pool, writes through [`GitExecutor`] after the safety gate.

use super::branches;
use super::command_runner::{CancelToken, CommandRunner, SystemCommandRunner};
use super::executor::GitExecutor;
use super::porcelain::parse_worktree_list;
use super::repository::{self, normalize_target_path};
use super::safety::{MutationKind, MutationRequest, check_add, check_checkout};
use super::status;
use super::types::{BranchInfo, GitStatusResult, RepositoryInfo, Worktree};
use super::worktrees::{self, display_path};
use crate::config::ManagerConfig;
use crate::errors::{WorktreeError, WorktreeResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

async fn blocking<T, F>(operation: &'static str, work: F) -> WorktreeResult<T>
where
    F: FnOnce() -> WorktreeResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| WorktreeError::introspection(operation, format!("Task join error: {e}")))?
}

pub struct WorktreeManager<R: CommandRunner = SystemCommandRunner> {
    executor: GitExecutor<R>,
    config: ManagerConfig,
}

impl WorktreeManager<SystemCommandRunner> {
    pub fn new(config: ManagerConfig) -> Self {
        let executor = GitExecutor::new(config.resolved_git_program())
            .with_network_timeout(config.network_timeout());
        Self { executor, config }
    }
}

impl<R: CommandRunner> WorktreeManager<R> {
    pub fn with_executor(executor: GitExecutor<R>, config: ManagerConfig) -> Self {
        Self { executor, config }
    }

    pub async fn open_repository(&self, path: &str) -> WorktreeResult<RepositoryInfo> {
        let raw = path.to_string();
        blocking("open repository", move || repository::validate_repository(&raw)).await
    }

    /// `false` for paths that are not (inside) a repository; other failures
    /// are still reported as errors.
    pub async fn validate_repository(&self, path: &str) -> WorktreeResult<bool> {
        match self.open_repository(path).await {
            Ok(_) => Ok(true),
            Err(WorktreeError::InvalidPath { .. } | WorktreeError::RepositoryNotFound { .. }) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn repo_root(&self, path: &str) -> WorktreeResult<PathBuf> {
        Ok(PathBuf::from(self.open_repository(path).await?.path))
    }

    /// A worktree argument must be an existing directory; a subdirectory maps
    /// to the top of the worktree that contains it.
    async fn worktree_root(&self, path: &str) -> WorktreeResult<PathBuf> {
        let raw = path.to_string();
        blocking("resolve worktree", move || repository::resolve_worktree_root(&raw)).await
    }

    pub async fn list_worktrees(&self, repo_path: &str) -> WorktreeResult<Vec<Worktree>> {
        let root = self.repo_root(repo_path).await?;
        self.list_worktrees_at(&root).await
    }

    async fn list_worktrees_at(&self, root: &Path) -> WorktreeResult<Vec<Worktree>> {
        let path = root.to_path_buf();
        let listed = blocking("list worktrees", move || worktrees::list_worktrees(&path)).await;
        self.listing_or_fallback(root, listed).await
    }

    /// Keep a git2 listing, or fall back to git's own listing when
    /// introspection could not read the repository.
    async fn listing_or_fallback(
        &self,
        root: &Path,
        listed: WorktreeResult<Vec<Worktree>>,
    ) -> WorktreeResult<Vec<Worktree>> {
        match listed {
            Err(WorktreeError::IntrospectionError { operation, message }) => {
                log::warn!(
                    "Worktree introspection failed for {} ({operation}: {message}), falling back to porcelain listing",
                    root.display()
                );
                self.list_worktrees_porcelain(root).await
            }
            other => other,
        }
    }

    async fn list_worktrees_porcelain(&self, root: &Path) -> WorktreeResult<Vec<Worktree>> {
        let output = self.executor.list_worktrees_porcelain(root).await?;
        let mut listed = parse_worktree_list(&output);
        for wt in &mut listed {
            wt.path = display_path(Path::new(&wt.path));
        }
        Ok(listed)
    }

    pub async fn add_worktree(
        &self,
        repo_path: &str,
        worktree_path: &str,
        branch: &str,
        create_branch: bool,
    ) -> WorktreeResult<Worktree> {
        let root = self.repo_root(repo_path).await?;
        let target = normalize_target_path(worktree_path)?;

        let existing = self.list_worktrees_at(&root).await?;
        check_add(&existing, &target, branch)?;

        self.executor
            .add_worktree(&root, &target, branch, create_branch)
            .await?;

        let wanted = display_path(&target);
        let refreshed = self.list_worktrees_at(&root).await?;
        Ok(refreshed
            .into_iter()
            .find(|wt| wt.path == wanted)
            .unwrap_or_else(|| {
                log::warn!("New worktree {wanted} missing from listing after add");
                Worktree {
                    branch: Some(branch.to_string()),
                    ..Worktree::linked(wanted.clone())
                }
            }))
    }

    /// Remove a linked worktree. Without `force`, locked or dirty worktrees
    /// are refused before git runs and the directory is left untouched.
    pub async fn remove_worktree(
        &self,
        repo_path: &str,
        worktree_path: &str,
        force: bool,
    ) -> WorktreeResult<()> {
        let root = self.repo_root(repo_path).await?;
        let target = normalize_target_path(worktree_path)?;
        let listed = self.list_worktrees_at(&root).await?;

        let recurse = self.config.dirty_check.recurse_untracked_dirs;
        let request = MutationRequest::new(root, target, MutationKind::Remove { force });
        let checked = blocking("check removal", move || {
            request.check(&listed, |path| {
                status::has_uncommitted_changes(path, recurse)
            })
        })
        .await?;

        self.executor.remove_worktree(&checked).await
    }

    pub async fn lock_worktree(
        &self,
        repo_path: &str,
        worktree_path: &str,
        reason: Option<&str>,
    ) -> WorktreeResult<()> {
        let root = self.repo_root(repo_path).await?;
        let target = normalize_target_path(worktree_path)?;
        let listed = self.list_worktrees_at(&root).await?;
        let checked =
            MutationRequest::new(root, target, MutationKind::Lock).check(&listed, |_| Ok(false))?;
        self.executor.lock_worktree(&checked, reason).await
    }

    pub async fn unlock_worktree(&self, repo_path: &str, worktree_path: &str) -> WorktreeResult<()> {
        let root = self.repo_root(repo_path).await?;
        let target = normalize_target_path(worktree_path)?;
        let listed = self.list_worktrees_at(&root).await?;
        let checked = MutationRequest::new(root, target, MutationKind::Unlock)
            .check(&listed, |_| Ok(false))?;
        self.executor.unlock_worktree(&checked).await
    }

    /// Drop administrative entries of worktrees whose directory is gone.
    /// Returns the paths that were pruned.
    pub async fn prune_worktrees(&self, repo_path: &str) -> WorktreeResult<Vec<String>> {
        let root = self.repo_root(repo_path).await?;
        let before = self.list_worktrees_at(&root).await?;

        self.executor.prune_worktrees(&root).await?;

        let after: HashSet<String> = self
            .list_worktrees_at(&root)
            .await?
            .into_iter()
            .map(|wt| wt.path)
            .collect();
        let pruned: Vec<String> = before
            .into_iter()
            .map(|wt| wt.path)
            .filter(|path| !after.contains(path))
            .collect();

        log::info!("Pruned {} worktree(s) in {}", pruned.len(), root.display());
        Ok(pruned)
    }

    pub async fn list_branches(&self, repo_path: &str) -> WorktreeResult<Vec<BranchInfo>> {
        let root = self.repo_root(repo_path).await?;
        blocking("list branches", move || branches::list_branches(&root)).await
    }

    /// Switch the worktree to `branch`. A branch checked out in another
    /// worktree is refused without running git.
    pub async fn checkout_branch(&self, worktree_path: &str, branch: &str) -> WorktreeResult<String> {
        let worktree = self.worktree_root(worktree_path).await?;
        let listed = self.list_worktrees_at(&worktree).await?;
        check_checkout(&listed, &worktree, branch)?;
        self.executor.checkout(&worktree, branch).await
    }

    pub async fn status(&self, worktree_path: &str) -> WorktreeResult<GitStatusResult> {
        let worktree = self.worktree_root(worktree_path).await?;
        let recurse = self.config.status.recurse_untracked_dirs;
        blocking("status", move || status::status(&worktree, recurse)).await
    }

    pub async fn has_uncommitted_changes(&self, worktree_path: &str) -> WorktreeResult<bool> {
        let worktree = self.worktree_root(worktree_path).await?;
        let recurse = self.config.dirty_check.recurse_untracked_dirs;
        blocking("check uncommitted changes", move || {
            status::has_uncommitted_changes(&worktree, recurse)
        })
        .await
    }

    pub async fn fetch(
        &self,
        worktree_path: &str,
        cancel: Option<&CancelToken>,
    ) -> WorktreeResult<String> {
        let worktree = self.worktree_root(worktree_path).await?;
        self.executor.fetch(&worktree, cancel).await
    }

    pub async fn pull(
        &self,
        worktree_path: &str,
        cancel: Option<&CancelToken>,
    ) -> WorktreeResult<String> {
        let worktree = self.worktree_root(worktree_path).await?;
        self.executor.pull(&worktree, cancel).await
    }

    pub async fn push(
        &self,
        worktree_path: &str,
        cancel: Option<&CancelToken>,
    ) -> WorktreeResult<String> {
        let worktree = self.worktree_root(worktree_path).await?;
        self.executor.push(&worktree, cancel).await
    }

    pub async fn commit(&self, worktree_path: &str, message: &str) -> WorktreeResult<String> {
        let worktree = self.worktree_root(worktree_path).await?;
        self.executor.commit(&worktree, message).await
    }

    pub async fn stage(&self, worktree_path: &str, file: &str) -> WorktreeResult<()> {
        let worktree = self.worktree_root(worktree_path).await?;
        self.executor.stage(&worktree, require_file(file)?).await
    }

    pub async fn unstage(&self, worktree_path: &str, file: &str) -> WorktreeResult<()> {
        let worktree = self.worktree_root(worktree_path).await?;
        self.executor.unstage(&worktree, require_file(file)?).await
    }
}

fn require_file(file: &str) -> WorktreeResult<&str> {
    if file.trim().is_empty() {
        Err(WorktreeError::invalid_path(file, "file path cannot be empty"))
    } else {
        Ok(file)
    }
}
