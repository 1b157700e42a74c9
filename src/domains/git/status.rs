use super::repository::{introspection_error, open_worktree_repository};
use super::types::{FileStatus, FileStatusKind, GitStatusResult};
use super::worktrees::head_state;
use crate::errors::WorktreeResult;
use git2::{BranchType, Repository, StatusEntry, StatusOptions};
use std::path::Path;

pub fn status(worktree_path: &Path, recurse_untracked_dirs: bool) -> WorktreeResult<GitStatusResult> {
    let repo = open_worktree_repository(worktree_path)?;
    let (branch, _) = head_state(&repo);

    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(recurse_untracked_dirs)
        .include_ignored(false)
        .renames_head_to_index(true);

    let statuses = repo
        .statuses(Some(&mut opts))
        .map_err(|e| introspection_error("status", e))?;

    let mut files = Vec::new();
    for entry in statuses.iter() {
        push_entry_statuses(&entry, &mut files);
    }

    let (ahead, behind) = ahead_behind(&repo).unwrap_or((0, 0));

    Ok(GitStatusResult {
        branch,
        files,
        ahead,
        behind,
    })
}

/// True when the worktree has staged, unstaged or untracked changes.
///
/// Ignored files never count. With `recurse_untracked_dirs` off, an untracked
/// directory is reported as a single entry instead of being walked.
pub fn has_uncommitted_changes(
    worktree_path: &Path,
    recurse_untracked_dirs: bool,
) -> WorktreeResult<bool> {
    let repo = open_worktree_repository(worktree_path)?;

    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(recurse_untracked_dirs)
        .include_ignored(false);

    let statuses = repo
        .statuses(Some(&mut opts))
        .map_err(|e| introspection_error("status", e))?;
    Ok(!statuses.is_empty())
}

fn push_entry_statuses(entry: &StatusEntry<'_>, files: &mut Vec<FileStatus>) {
    let status = entry.status();
    let path = String::from_utf8_lossy(entry.path_bytes()).to_string();

    if status.is_conflicted() {
        files.push(FileStatus {
            path,
            status: FileStatusKind::Conflicted,
            staged: false,
        });
        return;
    }

    let staged = if status.is_index_new() {
        Some(FileStatusKind::Added)
    } else if status.is_index_modified() {
        Some(FileStatusKind::Modified)
    } else if status.is_index_deleted() {
        Some(FileStatusKind::Deleted)
    } else if status.is_index_renamed() {
        Some(FileStatusKind::Renamed)
    } else if status.is_index_typechange() {
        Some(FileStatusKind::Typechange)
    } else {
        None
    };

    if let Some(kind) = staged {
        let staged_path = if kind == FileStatusKind::Renamed {
            entry
                .head_to_index()
                .and_then(|delta| delta.new_file().path().map(|p| p.to_string_lossy().to_string()))
                .unwrap_or_else(|| path.clone())
        } else {
            path.clone()
        };
        files.push(FileStatus {
            path: staged_path,
            status: kind,
            staged: true,
        });
    }

    let unstaged = if status.is_wt_new() {
        Some(FileStatusKind::Untracked)
    } else if status.is_wt_modified() {
        Some(FileStatusKind::Modified)
    } else if status.is_wt_deleted() {
        Some(FileStatusKind::Deleted)
    } else if status.is_wt_renamed() {
        Some(FileStatusKind::Renamed)
    } else if status.is_wt_typechange() {
        Some(FileStatusKind::Typechange)
    } else {
        None
    };

    if let Some(kind) = unstaged {
        let unstaged_path = if kind == FileStatusKind::Renamed {
            entry
                .index_to_workdir()
                .and_then(|delta| delta.new_file().path().map(|p| p.to_string_lossy().to_string()))
                .unwrap_or(path)
        } else {
            path
        };
        files.push(FileStatus {
            path: unstaged_path,
            status: kind,
            staged: false,
        });
    }
}

/// Commits ahead of and behind the configured upstream of the current branch.
fn ahead_behind(repo: &Repository) -> Option<(u32, u32)> {
    let head = repo.head().ok()?;
    if !head.is_branch() {
        return None;
    }
    let local_oid = head.target()?;
    let branch = repo.find_branch(head.shorthand()?, BranchType::Local).ok()?;
    let upstream = branch.upstream().ok()?;
    let upstream_oid = upstream.get().target()?;

    let (ahead, behind) = repo.graph_ahead_behind(local_oid, upstream_oid).ok()?;
    Some((
        u32::try_from(ahead).unwrap_or(u32::MAX),
        u32::try_from(behind).unwrap_or(u32::MAX),
    ))
}
