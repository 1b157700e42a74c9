//! Parsing of `git` text output.
//!
//! Two concerns live here and nowhere else: turning the record-oriented
//! `git worktree list --porcelain` listing into [`Worktree`] values, and
//! classifying a failed command's stderr into a [`WorktreeError`]. Lines and
//! messages that are not recognised are tolerated so that newer git releases
//! that add fields keep working.

use super::types::Worktree;
use crate::errors::WorktreeError;

/// Parse `git worktree list --porcelain` output.
///
/// Records are separated by blank lines and start with `worktree <path>`.
/// Git always lists the main worktree first, so the first record is marked
/// as main.
pub fn parse_worktree_list(output: &str) -> Vec<Worktree> {
    let mut worktrees = Vec::new();
    let mut current: Option<Worktree> = None;

    for line in output.lines() {
        let line = line.trim_end_matches('\r');

        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(done) = current.take() {
                worktrees.push(done);
            }
            let mut record = Worktree::linked(path);
            record.is_main = worktrees.is_empty();
            current = Some(record);
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };

        let (keyword, rest) = match line.split_once(' ') {
            Some((keyword, rest)) => (keyword, Some(rest.trim())),
            None => (line, None),
        };

        match keyword {
            "HEAD" => record.head = rest.map(String::from),
            "branch" => {
                record.branch = rest.map(|reference| {
                    reference
                        .strip_prefix("refs/heads/")
                        .unwrap_or(reference)
                        .to_string()
                });
            }
            "detached" => record.branch = None,
            "locked" => {
                record.is_locked = true;
                record.lock_reason = rest.filter(|r| !r.is_empty()).map(String::from);
            }
            "prunable" => record.is_prunable = true,
            _ => {}
        }
    }

    if let Some(done) = current {
        worktrees.push(done);
    }

    worktrees
}

struct Rule {
    needles: &'static [&'static str],
    build: fn(String) -> WorktreeError,
}

// Ordered: the first matching rule wins. "is not locked" must precede the
// locked rule, which would otherwise match "locked" in both.
const RULES: &[Rule] = &[
    Rule {
        needles: &[
            "is already checked out at",
            "is already used by worktree",
            "already checked out",
        ],
        build: |message| WorktreeError::BranchInUse { message },
    },
    Rule {
        needles: &["is not locked"],
        build: |message| WorktreeError::WorktreeNotLocked { message },
    },
    Rule {
        needles: &["is already locked", "cannot remove a locked", "is locked"],
        build: |message| WorktreeError::WorktreeLocked { message },
    },
    Rule {
        needles: &["is a main working tree", "main working tree cannot be"],
        build: |message| WorktreeError::MainWorktreeProtected {
            path: first_quoted(&message).unwrap_or(message),
        },
    },
    Rule {
        needles: &[
            "contains modified or untracked files",
            "uncommitted changes",
            "local changes to the following files would be overwritten",
            "untracked working tree files would be overwritten",
        ],
        build: |message| WorktreeError::UncommittedChanges { message },
    },
    Rule {
        needles: &[
            "nothing to commit",
            "nothing added to commit",
            "no changes added to commit",
        ],
        build: |message| WorktreeError::NothingToCommit { message },
    },
    Rule {
        needles: &[
            "is not a working tree",
            "not a working tree",
            "worktree not found",
        ],
        build: |message| WorktreeError::WorktreeNotFound { message },
    },
    Rule {
        needles: &["not a git repository"],
        build: |message| WorktreeError::RepositoryNotFound {
            path: first_quoted(&message).unwrap_or(message),
        },
    },
];

fn first_quoted(message: &str) -> Option<String> {
    let start = message.find('\'')? + 1;
    let len = message[start..].find('\'')?;
    Some(message[start..start + len].to_string())
}

/// Map the output of a failed git invocation to a domain error.
///
/// The raw text is kept verbatim inside the returned error for display;
/// nothing downstream parses it again.
pub fn classify_failure(operation: &str, output: &str) -> WorktreeError {
    let message = output.trim().to_string();
    let normalized = message.to_lowercase();

    for rule in RULES {
        if rule.needles.iter().any(|needle| normalized.contains(needle)) {
            return (rule.build)(message);
        }
    }

    WorktreeError::CommandFailed {
        operation: operation.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
worktree /repo
HEAD 1111111111111111111111111111111111111111
branch refs/heads/main

worktree /repo-locked
HEAD 2222222222222222222222222222222222222222
branch refs/heads/feature/locked
locked moving to external disk

worktree /repo-detached
HEAD 3333333333333333333333333333333333333333
detached
frobnicate some-future-field
";

    #[test]
    fn parses_records_with_lock_reason_and_detached_head() {
        let worktrees = parse_worktree_list(LISTING);
        assert_eq!(worktrees.len(), 3);

        let main = &worktrees[0];
        assert!(main.is_main);
        assert_eq!(main.path, "/repo");
        assert_eq!(main.branch.as_deref(), Some("main"));

        let locked = &worktrees[1];
        assert!(!locked.is_main);
        assert!(locked.is_locked);
        assert_eq!(locked.lock_reason.as_deref(), Some("moving to external disk"));
        assert_eq!(locked.branch.as_deref(), Some("feature/locked"));

        let detached = &worktrees[2];
        assert_eq!(detached.branch, None);
        assert_eq!(
            detached.head.as_deref(),
            Some("3333333333333333333333333333333333333333")
        );
        assert!(!detached.is_locked);
    }

    #[test]
    fn bare_locked_line_sets_flag_without_reason() {
        let worktrees = parse_worktree_list("worktree /a\n\nworktree /b\nlocked\nprunable gitdir file points to non-existent location\n");
        assert_eq!(worktrees.len(), 2);
        assert!(worktrees[1].is_locked);
        assert_eq!(worktrees[1].lock_reason, None);
        assert!(worktrees[1].is_prunable);
    }

    #[test]
    fn final_record_is_flushed_without_trailing_blank_line() {
        let worktrees = parse_worktree_list("worktree /only\nHEAD abc\nbranch refs/heads/dev");
        assert_eq!(worktrees.len(), 1);
        assert_eq!(worktrees[0].branch.as_deref(), Some("dev"));
    }

    #[test]
    fn lines_before_first_record_and_crlf_are_tolerated() {
        let worktrees = parse_worktree_list("garbage\r\nworktree /x\r\nbranch refs/heads/y\r\n");
        assert_eq!(worktrees.len(), 1);
        assert_eq!(worktrees[0].path, "/x");
        assert_eq!(worktrees[0].branch.as_deref(), Some("y"));
    }

    #[test]
    fn empty_output_yields_no_worktrees() {
        assert!(parse_worktree_list("").is_empty());
    }

    #[test]
    fn classifies_branch_in_use_for_old_and_new_git() {
        let old = classify_failure(
            "add worktree",
            "fatal: 'feature' is already checked out at '/repo-feature'\n",
        );
        assert!(matches!(old, WorktreeError::BranchInUse { .. }));

        let new = classify_failure(
            "checkout",
            "fatal: 'feature' is already used by worktree at '/repo-feature'",
        );
        assert!(matches!(new, WorktreeError::BranchInUse { .. }));
    }

    #[test]
    fn distinguishes_locked_from_not_locked() {
        let locked = classify_failure(
            "lock worktree",
            "fatal: '/repo-feature' is already locked, reason: busy",
        );
        assert!(matches!(locked, WorktreeError::WorktreeLocked { .. }));

        let unlocked = classify_failure("unlock worktree", "fatal: '/repo-feature' is not locked");
        assert!(matches!(unlocked, WorktreeError::WorktreeNotLocked { .. }));

        let remove = classify_failure(
            "remove worktree",
            "fatal: cannot remove a locked working tree, lock reason: busy\nuse 'remove -f -f' to override or unlock first",
        );
        assert!(matches!(remove, WorktreeError::WorktreeLocked { .. }));
    }

    #[test]
    fn classifies_dirty_worktree_removal() {
        let err = classify_failure(
            "remove worktree",
            "fatal: '/repo-feature' contains modified or untracked files, use --force to delete it",
        );
        assert!(matches!(err, WorktreeError::UncommittedChanges { .. }));
    }

    #[test]
    fn unrelated_mentions_of_untracked_are_not_misclassified() {
        let err = classify_failure(
            "stage",
            "fatal: pathspec 'untracked-notes.txt' did not match any files",
        );
        assert!(matches!(err, WorktreeError::CommandFailed { .. }), "{err:?}");
    }

    #[test]
    fn classifies_nothing_to_commit_from_stdout_text() {
        let err = classify_failure(
            "commit",
            "On branch main\nnothing to commit, working tree clean\n",
        );
        assert!(matches!(err, WorktreeError::NothingToCommit { .. }));
    }

    #[test]
    fn remote_not_found_is_not_a_missing_worktree() {
        let err = classify_failure(
            "fetch",
            "remote: Repository not found.\nfatal: repository 'https://example.com/x.git/' not found",
        );
        assert!(matches!(err, WorktreeError::CommandFailed { .. }), "{err:?}");
    }

    #[test]
    fn classifies_missing_worktree_and_repository() {
        assert!(matches!(
            classify_failure("lock worktree", "fatal: '/tmp/nope' is not a working tree"),
            WorktreeError::WorktreeNotFound { .. }
        ));
        assert!(matches!(
            classify_failure(
                "status",
                "fatal: not a git repository (or any of the parent directories): .git"
            ),
            WorktreeError::RepositoryNotFound { .. }
        ));
    }

    #[test]
    fn main_worktree_refusal_extracts_path() {
        let err = classify_failure("remove worktree", "fatal: '/repo' is a main working tree");
        assert_eq!(
            err,
            WorktreeError::MainWorktreeProtected {
                path: "/repo".to_string()
            }
        );
    }

    #[test]
    fn unknown_failure_keeps_raw_stderr() {
        let err = classify_failure("add worktree", "  fatal: invalid reference: nope\n");
        assert_eq!(
            err,
            WorktreeError::CommandFailed {
                operation: "add worktree".to_string(),
                message: "fatal: invalid reference: nope".to_string(),
            }
        );
    }
}
