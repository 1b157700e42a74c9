use super::repository::{introspection_error, open_main_repository};
use super::types::Worktree;
use crate::errors::WorktreeResult;
use crate::utils::path_utils::safe_canonicalize;
use git2::{ErrorCode, Oid, Repository, WorktreeLockStatus};
use std::fs;
use std::path::{Path, PathBuf};

/// Branch short name and commit id of a repository's HEAD.
///
/// A detached HEAD yields no branch; an unborn branch yields its name but no
/// commit id.
pub(crate) fn head_state(repo: &Repository) -> (Option<String>, Option<String>) {
    match repo.head() {
        Ok(head) => {
            let commit = head.target().map(|oid| oid.to_string());
            let branch = if head.is_branch() {
                head.shorthand().map(String::from)
            } else {
                None
            };
            (branch, commit)
        }
        Err(e) if e.code() == ErrorCode::UnbornBranch => (unborn_branch_name(repo), None),
        Err(e) => {
            log::debug!("Could not resolve HEAD for {}: {e}", repo.path().display());
            (None, None)
        }
    }
}

fn unborn_branch_name(repo: &Repository) -> Option<String> {
    let head = repo.find_reference("HEAD").ok()?;
    head.symbolic_target()?
        .strip_prefix("refs/heads/")
        .map(String::from)
}

/// HEAD of a linked worktree read from its administrative directory, for
/// entries whose working directory is gone.
fn admin_head_state(repo: &Repository, name: &str) -> (Option<String>, Option<String>) {
    let head_file = repo.path().join("worktrees").join(name).join("HEAD");
    let content = match fs::read_to_string(&head_file) {
        Ok(content) => content,
        Err(e) => {
            log::debug!("Could not read {}: {e}", head_file.display());
            return (None, None);
        }
    };

    let content = content.trim();
    match content.strip_prefix("ref: ") {
        Some(reference) => (
            reference.strip_prefix("refs/heads/").map(String::from),
            repo.refname_to_id(reference).ok().map(|oid| oid.to_string()),
        ),
        None => (None, Oid::from_str(content).ok().map(|oid| oid.to_string())),
    }
}

/// Canonical string form used for every path this layer reports.
pub(crate) fn display_path(path: &Path) -> String {
    let resolved = safe_canonicalize(path)
        .unwrap_or_else(|_| path.components().collect::<PathBuf>());
    resolved.to_string_lossy().to_string()
}

pub fn list_worktrees(repo_path: &Path) -> WorktreeResult<Vec<Worktree>> {
    let repo = open_main_repository(repo_path)?;
    let mut worktrees = Vec::new();

    // The main worktree is the repository itself, not an entry of repo.worktrees().
    let main_path = match repo.workdir() {
        Some(workdir) if !repo.is_bare() => workdir,
        _ => repo.path(),
    };
    let (branch, head) = head_state(&repo);
    worktrees.push(Worktree {
        path: display_path(main_path),
        branch,
        head,
        is_main: true,
        is_locked: false,
        lock_reason: None,
        is_prunable: false,
    });

    let names = repo
        .worktrees()
        .map_err(|e| introspection_error("list worktrees", e))?;
    for name in names.iter().flatten() {
        let wt = match repo.find_worktree(name) {
            Ok(wt) => wt,
            Err(e) => {
                log::warn!("Skipping unreadable worktree entry '{name}': {e}");
                continue;
            }
        };

        let (is_locked, lock_reason) = match wt.is_locked() {
            Ok(WorktreeLockStatus::Locked(reason)) => (
                true,
                reason
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty()),
            ),
            Ok(WorktreeLockStatus::Unlocked) => (false, None),
            Err(e) => {
                log::warn!("Could not read lock state of worktree '{name}': {e}");
                (false, None)
            }
        };

        let is_valid = wt.validate().is_ok();
        let (branch, head) = if is_valid {
            match Repository::open_from_worktree(&wt) {
                Ok(wt_repo) => head_state(&wt_repo),
                Err(e) => {
                    log::debug!("Could not open worktree '{name}': {e}");
                    (None, None)
                }
            }
        } else {
            admin_head_state(&repo, name)
        };

        worktrees.push(Worktree {
            path: display_path(wt.path()),
            branch,
            head,
            is_main: false,
            is_locked,
            lock_reason,
            is_prunable: !is_valid && !is_locked,
        });
    }

    log::debug!(
        "Found {} worktree(s) for {}",
        worktrees.len(),
        repo_path.display()
    );
    Ok(worktrees)
}
