//! Pre-flight checks that run against freshly read repository state before
//! any mutating git command is spawned.
//!
//! Destructive worktree mutations go through a two-state flow: a
//! [`MutationRequest`] can only become a [`CheckedMutation`] by passing
//! [`MutationRequest::check`], and the executor only accepts the checked form.

use super::types::Worktree;
use crate::errors::{WorktreeError, WorktreeResult};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Remove { force: bool },
    Lock,
    Unlock,
}

/// A requested mutation that has not been checked yet.
#[derive(Debug, Clone)]
pub struct MutationRequest {
    repo_root: PathBuf,
    target: PathBuf,
    kind: MutationKind,
}

/// A mutation that passed the gate. Fields are private so this can only be
/// produced by [`MutationRequest::check`].
#[derive(Debug, Clone)]
pub struct CheckedMutation {
    repo_root: PathBuf,
    worktree: Worktree,
    kind: MutationKind,
    force_level: u8,
}

impl MutationRequest {
    pub fn new(repo_root: PathBuf, target: PathBuf, kind: MutationKind) -> Self {
        Self {
            repo_root,
            target,
            kind,
        }
    }

    /// Validate against the current worktree listing.
    ///
    /// `is_dirty` is consulted only for a non-forced removal of a worktree
    /// whose directory still exists.
    pub fn check<F>(self, worktrees: &[Worktree], is_dirty: F) -> WorktreeResult<CheckedMutation>
    where
        F: FnOnce(&Path) -> WorktreeResult<bool>,
    {
        let worktree = find_worktree(worktrees, &self.target)
            .cloned()
            .ok_or_else(|| WorktreeError::WorktreeNotFound {
                message: format!(
                    "'{}' is not a worktree of '{}'",
                    self.target.display(),
                    self.repo_root.display()
                ),
            })?;

        if worktree.is_main {
            return Err(WorktreeError::MainWorktreeProtected {
                path: worktree.path.clone(),
            });
        }

        let force_level = match self.kind {
            MutationKind::Remove { force: false } => {
                if worktree.is_locked {
                    return Err(WorktreeError::WorktreeLocked {
                        message: match &worktree.lock_reason {
                            Some(reason) => format!("'{}' is locked: {reason}", worktree.path),
                            None => format!("'{}' is locked", worktree.path),
                        },
                    });
                }
                let path = Path::new(&worktree.path);
                if path.exists() && is_dirty(path)? {
                    return Err(WorktreeError::UncommittedChanges {
                        message: format!(
                            "'{}' has uncommitted or untracked changes; retry with force to discard them",
                            worktree.path
                        ),
                    });
                }
                0
            }
            // git needs the flag twice to remove a locked worktree.
            MutationKind::Remove { force: true } if worktree.is_locked => 2,
            MutationKind::Remove { force: true } => 1,
            MutationKind::Lock | MutationKind::Unlock => 0,
        };

        log::debug!(
            "Safety gate passed for {:?} on {} (force level {force_level})",
            self.kind,
            worktree.path
        );

        Ok(CheckedMutation {
            repo_root: self.repo_root,
            worktree,
            kind: self.kind,
            force_level,
        })
    }
}

impl CheckedMutation {
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn worktree_path(&self) -> &Path {
        Path::new(&self.worktree.path)
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    /// How many `--force` flags the removal needs.
    pub fn force_level(&self) -> u8 {
        self.force_level
    }
}

fn find_worktree<'a>(worktrees: &'a [Worktree], target: &Path) -> Option<&'a Worktree> {
    worktrees.iter().find(|wt| Path::new(&wt.path) == target)
}

fn branch_holder<'a>(
    worktrees: &'a [Worktree],
    branch: &str,
    except: Option<&Path>,
) -> Option<&'a Worktree> {
    worktrees.iter().find(|wt| {
        wt.branch.as_deref() == Some(branch) && except.is_none_or(|p| Path::new(&wt.path) != p)
    })
}

fn branch_in_use(branch: &str, holder: &Worktree) -> WorktreeError {
    WorktreeError::BranchInUse {
        message: format!("'{branch}' is already checked out at '{}'", holder.path),
    }
}

/// Refuse to add a worktree on a branch that is checked out elsewhere, or on
/// top of an existing non-empty directory.
pub fn check_add(worktrees: &[Worktree], target: &Path, branch: &str) -> WorktreeResult<()> {
    if let Some(holder) = branch_holder(worktrees, branch, None) {
        return Err(branch_in_use(branch, holder));
    }

    if find_worktree(worktrees, target).is_some() {
        return Err(WorktreeError::invalid_path(
            target.display(),
            "a worktree already exists at this path",
        ));
    }

    if target.is_file() {
        return Err(WorktreeError::invalid_path(
            target.display(),
            "a file already exists at this path",
        ));
    }

    if target.is_dir() {
        let mut entries = std::fs::read_dir(target)
            .map_err(|e| WorktreeError::io("read directory", target.display(), e))?;
        if entries.next().is_some() {
            return Err(WorktreeError::invalid_path(
                target.display(),
                "destination directory already exists and is not empty",
            ));
        }
    }

    Ok(())
}

/// Refuse to check out a local branch that another worktree already holds.
pub fn check_checkout(
    worktrees: &[Worktree],
    current: &Path,
    branch: &str,
) -> WorktreeResult<()> {
    match branch_holder(worktrees, branch, Some(current)) {
        Some(holder) => Err(branch_in_use(branch, holder)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn listing() -> Vec<Worktree> {
        let mut main = Worktree::linked("/repo");
        main.is_main = true;
        main.branch = Some("main".to_string());

        let mut feature = Worktree::linked("/repo-feature");
        feature.branch = Some("feature".to_string());

        let mut locked = Worktree::linked("/repo-locked");
        locked.branch = Some("locked".to_string());
        locked.is_locked = true;
        locked.lock_reason = Some("on usb drive".to_string());

        vec![main, feature, locked]
    }

    fn request(target: &str, kind: MutationKind) -> MutationRequest {
        MutationRequest::new(PathBuf::from("/repo"), PathBuf::from(target), kind)
    }

    fn never_dirty(_: &Path) -> WorktreeResult<bool> {
        Ok(false)
    }

    #[test]
    fn unknown_target_is_worktree_not_found() {
        let err = request("/elsewhere", MutationKind::Lock)
            .check(&listing(), never_dirty)
            .unwrap_err();
        assert!(matches!(err, WorktreeError::WorktreeNotFound { .. }));
    }

    #[test]
    fn main_worktree_is_protected_for_every_mutation() {
        for kind in [
            MutationKind::Remove { force: true },
            MutationKind::Remove { force: false },
            MutationKind::Lock,
            MutationKind::Unlock,
        ] {
            let err = request("/repo", kind)
                .check(&listing(), never_dirty)
                .unwrap_err();
            assert!(
                matches!(err, WorktreeError::MainWorktreeProtected { .. }),
                "{kind:?}: {err:?}"
            );
        }
    }

    #[test]
    fn non_forced_removal_of_dirty_worktree_is_refused() {
        let tmp = TempDir::new().unwrap();
        let mut worktrees = listing();
        worktrees[1].path = tmp.path().to_string_lossy().to_string();

        let err = MutationRequest::new(
            PathBuf::from("/repo"),
            tmp.path().to_path_buf(),
            MutationKind::Remove { force: false },
        )
        .check(&worktrees, |_| Ok(true))
        .unwrap_err();
        assert!(matches!(err, WorktreeError::UncommittedChanges { .. }));
        assert!(err.is_force_retryable());
    }

    #[test]
    fn forced_removal_skips_the_dirty_probe() {
        let checked = request("/repo-feature", MutationKind::Remove { force: true })
            .check(&listing(), |_| panic!("probe must not run for forced removal"))
            .unwrap();
        assert_eq!(checked.force_level(), 1);
        assert_eq!(checked.worktree_path(), Path::new("/repo-feature"));
    }

    #[test]
    fn probe_is_skipped_when_directory_is_gone() {
        let checked = request("/repo-feature", MutationKind::Remove { force: false })
            .check(&listing(), |_| panic!("missing directory cannot be dirty"))
            .unwrap();
        assert_eq!(checked.force_level(), 0);
    }

    #[test]
    fn locked_worktree_needs_force_and_then_double_force() {
        let err = request("/repo-locked", MutationKind::Remove { force: false })
            .check(&listing(), never_dirty)
            .unwrap_err();
        assert!(matches!(err, WorktreeError::WorktreeLocked { .. }));
        assert!(err.to_string().contains("on usb drive"));

        let checked = request("/repo-locked", MutationKind::Remove { force: true })
            .check(&listing(), never_dirty)
            .unwrap();
        assert_eq!(checked.force_level(), 2);
    }

    #[test]
    fn lock_and_unlock_only_check_existence() {
        let checked = request("/repo-locked", MutationKind::Lock)
            .check(&listing(), |_| panic!("no probe for lock"))
            .unwrap();
        assert_eq!(checked.kind(), MutationKind::Lock);
        assert!(
            request("/repo-feature", MutationKind::Unlock)
                .check(&listing(), never_dirty)
                .is_ok()
        );
    }

    #[test]
    fn add_refuses_branch_checked_out_elsewhere() {
        let tmp = TempDir::new().unwrap();
        let err = check_add(&listing(), &tmp.path().join("new"), "feature").unwrap_err();
        assert!(matches!(err, WorktreeError::BranchInUse { .. }));
        assert!(err.to_string().contains("/repo-feature"));
    }

    #[test]
    fn add_refuses_non_empty_destination() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("keep.txt"), "x").unwrap();
        let err = check_add(&listing(), tmp.path(), "fresh").unwrap_err();
        assert!(matches!(err, WorktreeError::InvalidPath { .. }));

        let empty = tmp.path().join("empty");
        std::fs::create_dir(&empty).unwrap();
        assert!(check_add(&listing(), &empty, "fresh").is_ok());
    }

    #[test]
    fn checkout_ignores_the_worktree_itself() {
        let worktrees = listing();
        assert!(check_checkout(&worktrees, Path::new("/repo-feature"), "feature").is_ok());
        let err = check_checkout(&worktrees, Path::new("/repo-feature"), "main").unwrap_err();
        assert!(matches!(err, WorktreeError::BranchInUse { .. }));
        assert!(check_checkout(&worktrees, Path::new("/repo-feature"), "unused").is_ok());
    }
}
