use super::repository::{introspection_error, open_worktree_repository};
use super::types::BranchInfo;
use super::worktrees::head_state;
use crate::errors::WorktreeResult;
use git2::{BranchType, ReferenceType};
use std::path::Path;

/// Local branches followed by remote-tracking branches, each sorted by name.
///
/// `is_current` is relative to the worktree at `repo_path`. Symbolic remote
/// refs such as `origin/HEAD` are skipped.
pub fn list_branches(repo_path: &Path) -> WorktreeResult<Vec<BranchInfo>> {
    log::info!("Listing branches for repo: {}", repo_path.display());

    let repo = open_worktree_repository(repo_path)?;
    let (current_branch, _) = head_state(&repo);

    let mut local = Vec::new();
    let mut remote = Vec::new();

    let branches = repo
        .branches(None)
        .map_err(|e| introspection_error("list branches", e))?;
    for entry in branches {
        let (branch, branch_type) = entry.map_err(|e| introspection_error("read branch", e))?;
        if branch.get().kind() == Some(ReferenceType::Symbolic) {
            continue;
        }
        let Some(name) = branch
            .name()
            .map_err(|e| introspection_error("read branch name", e))?
        else {
            log::debug!("Skipping branch with non UTF-8 name");
            continue;
        };

        let is_remote = branch_type == BranchType::Remote;
        let info = BranchInfo {
            name: name.to_string(),
            is_remote,
            is_current: !is_remote && current_branch.as_deref() == Some(name),
        };
        if is_remote {
            remote.push(info);
        } else {
            local.push(info);
        }
    }

    local.sort_by(|a, b| a.name.cmp(&b.name));
    remote.sort_by(|a, b| a.name.cmp(&b.name));
    local.extend(remote);

    log::debug!("Found {} branches", local.len());
    Ok(local)
}

/// Branch names git accepts, without a leading `-` that would read as an option.
pub fn is_valid_branch_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('-') && git2::Branch::name_is_valid(name).unwrap_or(false)
}
