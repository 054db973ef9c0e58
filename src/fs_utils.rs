//! Filesystem primitives shared by the rootspace and namespace layers.
//!
//! Everything here observes or edits a single directory entry at a time:
//! symlink-aware status detection, symlink creation, backup naming, and
//! POSIX access(2) permission probes.

use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

/// What currently occupies a path, without following symlinks.
#[derive(Debug)]
pub enum EntryStatus {
    Missing,
    RegularFile,
    Directory,
    Symlink { target: PathBuf },
    BrokenSymlink { target: PathBuf },
}

impl EntryStatus {
    pub fn detect(path: &Path) -> Self {
        // read_link succeeds only for symlinks; path.exists() follows them,
        // so a dangling link reports Missing there.
        if let Ok(target) = fs::read_link(path) {
            if path.exists() {
                Self::Symlink { target }
            } else {
                Self::BrokenSymlink { target }
            }
        } else if path.exists() {
            if path.is_dir() {
                Self::Directory
            } else {
                Self::RegularFile
            }
        } else {
            Self::Missing
        }
    }

    /// True when the entry is a symlink whose literal target equals `expected`.
    ///
    /// Dangling links count: ownership of a link is decided by where it
    /// points, not by whether the target still exists. No canonicalization.
    pub fn points_to(&self, expected: &Path) -> bool {
        matches!(
            self,
            Self::Symlink { target } | Self::BrokenSymlink { target } if target == expected
        )
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, Self::Symlink { .. } | Self::BrokenSymlink { .. })
    }
}

/// Create a symlink at `link` pointing to `target`.
///
/// The parent of `link` must already exist; this never creates directories.
pub fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    symlink(target, link)
}

/// Name of the backup that shelters whatever `target` held before namespace
/// `ns_name` claimed the path: `<basename>.<ns_name>.bak`, same directory.
///
/// Built by OsString concatenation so non-UTF-8 basenames survive.
pub fn backup_path(target: &Path, ns_name: &str) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(ns_name);
    name.push(".bak");
    target.with_file_name(name)
}

fn access(path: &Path, mode: libc::c_int) -> bool {
    let Ok(cpath) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: cpath is a valid NUL-terminated C string for the call.
    unsafe { libc::access(cpath.as_ptr(), mode) == 0 }
}

/// access(2) R_OK check, honoring the real uid/gid like `test -r`.
pub fn readable(path: &Path) -> bool {
    access(path, libc::R_OK)
}

/// access(2) W_OK check.
pub fn writable(path: &Path) -> bool {
    access(path, libc::W_OK)
}
