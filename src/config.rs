use crate::errors::{WorktreeError, WorktreeResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "WORKTREE_MANAGER_CONFIG";
pub const GIT_PROGRAM_ENV: &str = "WORKTREE_MANAGER_GIT";
const CONFIG_DIR_NAME: &str = "worktree-manager";
const CONFIG_FILE_NAME: &str = "config.toml";

fn default_git_program() -> String {
    "git".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StatusScanConfig {
    #[serde(default = "default_true")]
    pub recurse_untracked_dirs: bool,
}

impl Default for StatusScanConfig {
    fn default() -> Self {
        Self {
            recurse_untracked_dirs: true,
        }
    }
}

/// Settings for the dirty-worktree probe run before removals.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct DirtyCheckConfig {
    #[serde(default)]
    pub recurse_untracked_dirs: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    #[serde(default = "default_git_program")]
    pub git_program: String,
    /// fetch/pull/push running longer than this are terminated.
    #[serde(default)]
    pub network_timeout_secs: Option<u64>,
    #[serde(default)]
    pub status: StatusScanConfig,
    #[serde(default)]
    pub dirty_check: DirtyCheckConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            git_program: default_git_program(),
            network_timeout_secs: None,
            status: StatusScanConfig::default(),
            dirty_check: DirtyCheckConfig::default(),
        }
    }
}

impl ManagerConfig {
    /// Load from an explicit file, `$WORKTREE_MANAGER_CONFIG`, or the per-user
    /// config directory, in that order, then apply env overrides.
    pub fn load(explicit: Option<&Path>) -> WorktreeResult<Self> {
        Self::load_with(explicit, |key| std::env::var(key).ok(), dirs::config_dir())
    }

    pub fn load_with<F>(
        explicit: Option<&Path>,
        env: F,
        config_dir: Option<PathBuf>,
    ) -> WorktreeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |value: String| Some(value).filter(|v| !v.trim().is_empty());

        let requested = explicit
            .map(Path::to_path_buf)
            .or_else(|| env(CONFIG_PATH_ENV).and_then(non_empty).map(PathBuf::from));

        let mut config = match requested {
            Some(path) => Self::from_file(&path)?,
            None => {
                let default_path =
                    config_dir.map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
                match default_path {
                    Some(path) if path.is_file() => Self::from_file(&path)?,
                    _ => {
                        log::debug!("No config file found, using defaults");
                        Self::default()
                    }
                }
            }
        };

        if let Some(program) = env(GIT_PROGRAM_ENV).and_then(non_empty) {
            log::debug!("Overriding git program from {GIT_PROGRAM_ENV}: {program}");
            config.git_program = program;
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> WorktreeResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WorktreeError::io("read config", path.display(), e))?;
        let config = toml::from_str(&contents).map_err(|e| {
            WorktreeError::invalid_path(path.display(), format!("malformed config: {e}"))
        })?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Absolute path of the git executable when it can be found on PATH,
    /// otherwise the configured value unchanged.
    pub fn resolved_git_program(&self) -> String {
        match which::which(&self.git_program) {
            Ok(path) => path.to_string_lossy().to_string(),
            Err(e) => {
                log::warn!(
                    "Could not resolve git program '{}' on PATH: {e}",
                    self.git_program
                );
                self.git_program.clone()
            }
        }
    }

    pub fn network_timeout(&self) -> Option<Duration> {
        self.network_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
