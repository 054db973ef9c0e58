//! Resolution of the directory pair a CLI invocation operates on.
//!
//! Each directory is picked independently: command-line flag first, then
//! environment variable, then the home-relative default. Validation is not
//! done here; that is `RootSpace::new`'s job.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::BaseDirs;

/// Environment variable overriding the namespace root directory.
pub const ROOT_PATH_ENV: &str = "NSCTL_ROOT_PATH";

/// Environment variable overriding the symlink directory.
pub const SYMLINK_PATH_ENV: &str = "NSCTL_SYMLINK_PATH";

/// Directory name used under `$HOME` when no root is configured.
pub const DEFAULT_ROOT_DIR_NAME: &str = ".ns";

/// Unvalidated root/symlink directory pair for one invocation.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Namespace root, `~/.ns` unless overridden.
    pub root_path: PathBuf,
    /// Where active namespace files are exposed, `~` unless overridden.
    pub symlink_path: PathBuf,
}

impl Paths {
    pub fn resolve(root_flag: Option<PathBuf>, symlink_flag: Option<PathBuf>) -> Result<Self> {
        let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
        let home = base_dirs.home_dir();

        let root_path = root_flag
            .or_else(|| env_path(ROOT_PATH_ENV))
            .unwrap_or_else(|| home.join(DEFAULT_ROOT_DIR_NAME));
        let symlink_path = symlink_flag
            .or_else(|| env_path(SYMLINK_PATH_ENV))
            .unwrap_or_else(|| home.to_path_buf());

        Ok(Self {
            root_path,
            symlink_path,
        })
    }
}

/// A non-empty environment variable, as a path.
fn env_path(var: &str) -> Option<PathBuf> {
    match env::var_os(var) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
