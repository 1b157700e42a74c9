//! Throwaway repositories driven by the real `git` binary, and a scripted
//! runner for tests that must not spawn anything.

use crate::config::ManagerConfig;
use crate::domains::git::command_runner::{CancelToken, CommandOutput, CommandRunner, RunOutcome};
use crate::domains::git::WorktreeManager;
use crate::utils::path_utils::safe_canonicalize;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn s(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

pub fn manager() -> WorktreeManager {
    WorktreeManager::new(ManagerConfig::default())
}

/// A repository at `<tmp>/repo` on branch `main` with one commit.
/// Sibling directories of `repo` are free for linked worktrees.
pub struct TestRepo {
    _tmp: TempDir,
    base: PathBuf,
    pub root: PathBuf,
}

impl TestRepo {
    pub fn new() -> Self {
        let repo = Self::unborn();
        fs::write(repo.root.join("README.md"), "# Test Repository\n").unwrap();
        git(&repo.root, &["add", "README.md"]);
        git(&repo.root, &["commit", "-m", "Initial commit"]);
        repo
    }

    /// Initialized on `main` but without any commit.
    pub fn unborn() -> Self {
        let tmp = TempDir::new().unwrap();
        let base = safe_canonicalize(tmp.path()).unwrap();
        let root = base.join("repo");
        fs::create_dir(&root).unwrap();

        git(&root, &["init"]);
        git(&root, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&root, &["config", "user.name", "Test User"]);
        git(&root, &["config", "user.email", "test@example.com"]);
        git(&root, &["config", "commit.gpgsign", "false"]);

        Self {
            _tmp: tmp,
            base,
            root,
        }
    }

    pub fn root_str(&self) -> String {
        s(&self.root)
    }

    pub fn sibling(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }

    /// Linked worktree at `<tmp>/<name>` on a new branch.
    pub fn add_worktree(&self, name: &str, branch: &str) -> PathBuf {
        let path = self.sibling(name);
        git(&self.root, &["worktree", "add", "-b", branch, &s(&path)]);
        path
    }

    /// Bare repository at `<tmp>/origin.git` registered as `origin`, with
    /// `main` pushed and tracked.
    pub fn with_origin(&self) -> PathBuf {
        let remote = self.sibling("origin.git");
        git(&self.base, &["init", "--bare", &s(&remote)]);
        git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&self.root, &["remote", "add", "origin", &s(&remote)]);
        git(&self.root, &["push", "-u", "origin", "main"]);
        remote
    }
}

/// Records every invocation and answers from a queue of canned outcomes.
#[derive(Default, Clone)]
pub struct MockRunner {
    calls: Arc<Mutex<Vec<CommandLog>>>,
    responses: Arc<Mutex<VecDeque<io::Result<RunOutcome>>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLog {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl MockRunner {
    pub fn push_response(&self, response: io::Result<RunOutcome>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn push_output(&self, status: i32, stdout: &str, stderr: &str) {
        self.push_response(Ok(RunOutcome::Completed(CommandOutput {
            status: Some(status),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        })));
    }

    pub fn calls(&self) -> Vec<CommandLog> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        current_dir: &Path,
        env: &[(&str, &str)],
        _cancel: Option<&CancelToken>,
    ) -> io::Result<RunOutcome> {
        self.calls.lock().unwrap().push(CommandLog {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: current_dir.to_path_buf(),
            env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no response configured")
    }
}
