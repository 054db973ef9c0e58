//! The namespace root and its validation rules.
//!
//! A [`RootSpace`] binds two directories together: the root that holds one
//! subdirectory per namespace, and the symlink directory where the active
//! namespace's files are exposed. All validation happens up front in the
//! constructor; afterwards the struct is read-only and every query goes back
//! to the filesystem.

use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::fs_utils::{self, EntryStatus};

/// Basename of the marker symlink that records the active namespace.
pub const CURRENT_NS_SYMLINK_NAME: &str = ".current_ns";

/// Mode for directories this tool creates: owner rwx, group/other read.
pub const NS_DIR_MODE: u32 = 0o744;

#[derive(Debug, Error)]
pub enum RootSpaceError {
    #[error("path {} does not exist", .path.display())]
    Missing { path: PathBuf },

    #[error("path {} is not a directory", .path.display())]
    NotDirectory { path: PathBuf },

    #[error("path {} is not readable", .path.display())]
    NotReadable { path: PathBuf },

    #[error("path {} is not writable", .path.display())]
    NotWritable { path: PathBuf },

    #[error("cannot create {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A validated pair of namespace root and symlink directory.
#[derive(Debug)]
pub struct RootSpace {
    path: PathBuf,
    symlink_path: PathBuf,
    current_ns_path: PathBuf,
}

impl RootSpace {
    /// Validate the root/symlink directory pair.
    ///
    /// The root is created (mode 0744) when absent, provided its parent is
    /// writable; it must end up a readable directory. The symlink directory
    /// is never created here: it must already exist as a writable directory.
    pub fn new(
        path: impl Into<PathBuf>,
        symlink_path: impl Into<PathBuf>,
    ) -> Result<Self, RootSpaceError> {
        let path = path.into();
        let symlink_path = symlink_path.into();

        if !path.exists() {
            // A relative single-component path has an empty parent.
            let parent = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            if !fs_utils::writable(parent) {
                return Err(RootSpaceError::NotWritable { path });
            }
            DirBuilder::new()
                .mode(NS_DIR_MODE)
                .create(&path)
                .map_err(|source| RootSpaceError::Create {
                    path: path.clone(),
                    source,
                })?;
        }

        if !path.is_dir() {
            return Err(RootSpaceError::NotDirectory { path });
        }
        if !fs_utils::readable(&path) {
            return Err(RootSpaceError::NotReadable { path });
        }

        if !symlink_path.exists() {
            return Err(RootSpaceError::Missing { path: symlink_path });
        }
        if !symlink_path.is_dir() {
            return Err(RootSpaceError::NotDirectory { path: symlink_path });
        }
        if !fs_utils::writable(&symlink_path) {
            return Err(RootSpaceError::NotWritable { path: symlink_path });
        }

        let current_ns_path = symlink_path.join(CURRENT_NS_SYMLINK_NAME);
        Ok(Self {
            path,
            symlink_path,
            current_ns_path,
        })
    }

    /// The namespace root directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directory active namespace files are linked into.
    pub fn symlink_path(&self) -> &Path {
        &self.symlink_path
    }

    /// Full path of the `.current_ns` marker symlink.
    pub fn current_ns_path(&self) -> &Path {
        &self.current_ns_path
    }

    /// Paths of all namespace directories, sorted by name.
    ///
    /// Recomputed from a fresh directory listing on every call. Plain files
    /// and symlinked directories under the root are not namespaces.
    pub fn namespaces(&self) -> Result<Vec<PathBuf>, RootSpaceError> {
        let read_err = |source| RootSpaceError::Read {
            path: self.path.clone(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.path).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let path = entry.path();
            if path.is_dir() && !path.is_symlink() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Name of the namespace the marker currently points to, if any.
    ///
    /// Reads the marker symlink's target and takes its final component; the
    /// target directory is not checked for existence, so a dangling marker
    /// still reports a name.
    pub fn current_ns_name(&self) -> Option<String> {
        match EntryStatus::detect(&self.current_ns_path) {
            EntryStatus::Symlink { target } | EntryStatus::BrokenSymlink { target } => target
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            _ => None,
        }
    }
}
