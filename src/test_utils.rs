//! Test utilities shared across test modules.
//!
//! Builds the `<tmp>/.ns` root plus `<tmp>/workspace` symlink directory pair
//! the filesystem tests run against.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::rootspace::RootSpace;

/// Paths for a root/symlink directory pair inside `temp_dir`.
///
/// Only the symlink directory is created; `RootSpace::new` is expected to
/// create the root itself.
pub fn setup_dirs(temp_dir: &TempDir) -> (PathBuf, PathBuf) {
    let root = temp_dir.path().join(".ns");
    let workspace = temp_dir.path().join("workspace");
    fs::create_dir_all(&workspace).unwrap();
    (root, workspace)
}

/// A validated root space over a fresh directory pair.
pub fn setup_root_space(temp_dir: &TempDir) -> RootSpace {
    let (root, workspace) = setup_dirs(temp_dir);
    RootSpace::new(root, workspace).unwrap()
}
