use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A process killed by a signal has no exit code and is not a success.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(CommandOutput),
    /// The process was terminated before it finished; its output is discarded.
    Cancelled,
}

/// Cooperative cancellation shared between a caller and a running command.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns once the flag flips.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        current_dir: &Path,
        env: &[(&str, &str)],
        cancel: Option<&CancelToken>,
    ) -> io::Result<RunOutcome>;
}

/// Runs commands as real child processes without a shell.
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        current_dir: &Path,
        env: &[(&str, &str)],
        cancel: Option<&CancelToken>,
    ) -> io::Result<RunOutcome> {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Ok(RunOutcome::Cancelled);
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(current_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let child = cmd.spawn()?;

        // Dropping the wait future drops the child, and kill_on_drop terminates it.
        let output = match cancel {
            Some(token) => {
                tokio::select! {
                    result = child.wait_with_output() => result?,
                    _ = token.cancelled() => return Ok(RunOutcome::Cancelled),
                }
            }
            None => child.wait_with_output().await?,
        };

        Ok(RunOutcome::Completed(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }))
    }
}
