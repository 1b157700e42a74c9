pub mod branches;
pub mod command_runner;
pub mod executor;
pub mod manager;
pub mod porcelain;
pub mod repository;
pub mod safety;
pub mod status;
pub mod types;
pub mod worktrees;

#[cfg(test)]
mod tests;

pub use command_runner::{CancelToken, CommandRunner, SystemCommandRunner};
pub use executor::GitExecutor;
pub use manager::WorktreeManager;
pub use types::*;
