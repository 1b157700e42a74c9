use super::types::RepositoryInfo;
use crate::errors::{WorktreeError, WorktreeResult};
use crate::utils::path_utils::{normalize_path, safe_canonicalize};
use git2::{ErrorCode, Repository};
use std::path::{Path, PathBuf};

pub(crate) fn introspection_error(operation: &str, error: git2::Error) -> WorktreeError {
    WorktreeError::introspection(operation, error.message())
}

/// Trim and check that a caller-supplied path is absolute.
///
/// Paths are never resolved against the process working directory, which is
/// shared across concurrently running operations.
pub fn require_absolute(raw: &str) -> WorktreeResult<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WorktreeError::invalid_path(raw, "path cannot be empty"));
    }
    let candidate = PathBuf::from(trimmed);
    if !candidate.is_absolute() {
        return Err(WorktreeError::invalid_path(
            trimmed,
            "path must be an absolute path",
        ));
    }
    Ok(candidate)
}

fn canonicalize_existing(candidate: &Path) -> WorktreeResult<PathBuf> {
    if !candidate.exists() {
        return Err(WorktreeError::invalid_path(
            candidate.display(),
            "path does not exist",
        ));
    }
    safe_canonicalize(candidate)
        .map_err(|e| WorktreeError::io("canonicalize", candidate.display(), e))
}

fn discover(canonical: &Path) -> WorktreeResult<Repository> {
    Repository::discover(canonical).map_err(|e| match e.code() {
        ErrorCode::NotFound => WorktreeError::RepositoryNotFound {
            path: canonical.display().to_string(),
        },
        _ => introspection_error("discover repository", e),
    })
}

/// Resolve `raw` to the root of the repository that contains it.
///
/// Non-bare repositories resolve to the main working directory, bare ones to
/// the git directory itself. A path inside a linked worktree resolves to the
/// repository that owns the worktree.
pub fn validate_repository(raw: &str) -> WorktreeResult<RepositoryInfo> {
    let candidate = require_absolute(raw)?;
    let canonical = canonicalize_existing(&candidate)?;

    let mut repo = discover(&canonical)?;
    if repo.is_worktree() {
        let common = repo.commondir().to_path_buf();
        repo = Repository::open(&common)
            .map_err(|e| introspection_error("open main repository", e))?;
    }

    let is_bare = repo.is_bare();
    let root = match repo.workdir() {
        Some(workdir) if !is_bare => workdir.to_path_buf(),
        _ => repo.path().to_path_buf(),
    };
    let root = safe_canonicalize(&root)
        .map_err(|e| WorktreeError::io("canonicalize", root.display(), e))?;

    let name = root
        .file_name()
        .and_then(|s| s.to_str())
        .map(String::from)
        .unwrap_or_else(|| "Unknown".to_string());

    log::debug!(
        "Validated repository {} (bare: {is_bare}) from {}",
        root.display(),
        canonical.display()
    );

    Ok(RepositoryInfo {
        path: root.to_string_lossy().to_string(),
        name,
        is_bare,
    })
}

/// Validates that a worktree path exists and is a directory, returning its
/// canonical form.
pub fn validate_worktree_path(raw: &str) -> WorktreeResult<PathBuf> {
    let candidate = require_absolute(raw)?;
    let canonical = canonicalize_existing(&candidate)?;
    if !canonical.is_dir() {
        return Err(WorktreeError::invalid_path(
            canonical.display(),
            "worktree path is not a directory",
        ));
    }
    Ok(canonical)
}

/// Top of the working tree that contains `raw`, which may be a linked
/// worktree rather than the main one.
pub fn resolve_worktree_root(raw: &str) -> WorktreeResult<PathBuf> {
    let dir = validate_worktree_path(raw)?;
    let repo = discover(&dir)?;
    let workdir = repo.workdir().ok_or_else(|| {
        WorktreeError::invalid_path(dir.display(), "bare repository has no working tree")
    })?;
    safe_canonicalize(workdir).map_err(|e| WorktreeError::io("canonicalize", workdir.display(), e))
}

/// Canonical form of a path that may no longer (or not yet) exist, such as a
/// pruned worktree or the destination of a new one.
pub fn normalize_target_path(raw: &str) -> WorktreeResult<PathBuf> {
    let candidate = require_absolute(raw)?;
    normalize_path(&candidate).map_err(|e| WorktreeError::io("normalize", candidate.display(), e))
}

/// Open the repository owning `path`, hopping from a linked worktree to the
/// main repository through the common directory.
pub(crate) fn open_main_repository(path: &Path) -> WorktreeResult<Repository> {
    let repo = Repository::open(path).map_err(|e| match e.code() {
        ErrorCode::NotFound => WorktreeError::RepositoryNotFound {
            path: path.display().to_string(),
        },
        _ => introspection_error("open repository", e),
    })?;

    if repo.is_worktree() {
        let common = repo.commondir().to_path_buf();
        return Repository::open(&common)
            .map_err(|e| introspection_error("open main repository", e));
    }

    Ok(repo)
}

pub(crate) fn open_worktree_repository(path: &Path) -> WorktreeResult<Repository> {
    Repository::open(path).map_err(|e| match e.code() {
        ErrorCode::NotFound => WorktreeError::RepositoryNotFound {
            path: path.display().to_string(),
        },
        _ => introspection_error("open worktree", e),
    })
}
