pub mod cli;
pub mod config;
pub mod domains;
pub mod errors;
pub mod utils;

pub use config::ManagerConfig;
pub use domains::git::{CancelToken, WorktreeManager};
pub use errors::{WorktreeError, WorktreeResult};
