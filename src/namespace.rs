//! Namespace lifecycle and the activate/deactivate swap algorithm.
//!
//! A namespace is a directory under the root; activating it exposes each of
//! its entries as an identically-named symlink in the symlink directory,
//! displacing whatever real files were there into `<name>.<ns>.bak` backups.
//! Deactivation unwinds exactly that: drop our symlinks, put the backups
//! back. The `.current_ns` marker enforces that at most one namespace is
//! active, and every decision is re-derived from the filesystem so that
//! re-running an interrupted operation converges.

use std::ffi::{OsStr, OsString};
use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

use crate::fs_utils::{self, EntryStatus};
use crate::ignore::{IgnoreList, NSIGNORE_FILE};
use crate::rootspace::{CURRENT_NS_SYMLINK_NAME, NS_DIR_MODE, RootSpace};

#[derive(Debug, Error)]
pub enum NamespaceError {
    #[error("invalid namespace name '{name}'")]
    InvalidName { name: String },

    #[error("namespace '{name}' does not exist")]
    DoesNotExist { name: String },

    /// `name` is the namespace holding the marker, not the one that asked.
    #[error("namespace '{name}' is already active")]
    AlreadyActive { name: String },

    #[error("marker {} is not a symlink, refusing to touch it", .path.display())]
    MarkerObstructed { path: PathBuf },

    #[error("cannot create {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot remove {}: {source}", .path.display())]
    Remove {
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

    #[error("cannot update marker {}: {source}", .path.display())]
    Marker {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One named namespace inside a [`RootSpace`].
///
/// Holds only the name and derived path; whether the namespace exists or is
/// active is asked of the filesystem every time.
#[derive(Debug)]
pub struct Namespace<'a> {
    root: &'a RootSpace,
    name: String,
    path: PathBuf,
}

impl<'a> Namespace<'a> {
    /// Bind `name` inside the root space.
    ///
    /// The name must work as a single directory component: non-empty, no
    /// `/`, not `.` or `..`, and not the marker basename.
    pub fn new(root: &'a RootSpace, name: &str) -> Result<Self, NamespaceError> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name == CURRENT_NS_SYMLINK_NAME
            || name.contains('/')
        {
            return Err(NamespaceError::InvalidName {
                name: name.to_string(),
            });
        }

        let path = root.path().join(name);
        Ok(Self {
            root,
            name: name.to_string(),
            path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the namespace directory exists.
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Whether the marker symlink points at this namespace.
    pub fn active(&self) -> bool {
        EntryStatus::detect(self.root.current_ns_path()).points_to(&self.path)
    }

    /// Create the namespace directory, mode 0744.
    ///
    /// Fails if anything already occupies the path.
    pub fn create(&self) -> Result<(), NamespaceError> {
        DirBuilder::new()
            .mode(NS_DIR_MODE)
            .create(&self.path)
            .map_err(|source| NamespaceError::Create {
                path: self.path.clone(),
                source,
            })
    }

    /// Remove the namespace directory. A no-op when nothing is at the path;
    /// never recursive, so a non-empty namespace fails with the OS error.
    pub fn remove(&self) -> Result<(), NamespaceError> {
        if fs::symlink_metadata(&self.path).is_err() {
            return Ok(());
        }
        fs::remove_dir(&self.path).map_err(|source| NamespaceError::Remove {
            path: self.path.clone(),
            source,
        })
    }

    /// Make this the active namespace.
    ///
    /// Claims the marker first: if another namespace holds it, nothing else
    /// is touched. With the marker ours, every non-ignored entry of the
    /// namespace is exposed in the symlink directory, displacing real files
    /// into backups. Individual entries that cannot be swapped are logged
    /// and skipped so one bad file cannot wedge the switch; re-running
    /// activation picks up whatever was missed.
    pub fn activate(&self) -> Result<(), NamespaceError> {
        if !self.exists() {
            return Err(NamespaceError::DoesNotExist {
                name: self.name.clone(),
            });
        }

        self.claim_marker()?;

        for name in self.sources()? {
            if let Err(err) = self.link_source(&name) {
                warn!("skipping {}: {err}", self.path.join(&name).display());
            }
        }
        Ok(())
    }

    /// Undo activation: drop our symlinks, restore backups, clear the marker.
    ///
    /// Runs the file sweep before the marker update so an interruption
    /// leaves the marker in place, signalling that cleanup is still owed.
    /// Safe to call when inactive, and still clears a marker that points at
    /// a namespace directory which has since been deleted.
    pub fn deactivate(&self) -> Result<(), NamespaceError> {
        if self.exists() {
            for name in self.sources()? {
                if let Err(err) = self.unlink_source(&name) {
                    warn!(
                        "skipping {}: {err}",
                        self.root.symlink_path().join(&name).display()
                    );
                }
            }
        }
        self.release_marker()
    }

    /// Take the marker or bail. The one step of activation that is fatal.
    fn claim_marker(&self) -> Result<(), NamespaceError> {
        let marker = self.root.current_ns_path();
        match EntryStatus::detect(marker) {
            // Already ours: re-entry after an interrupted run.
            status if status.points_to(&self.path) => Ok(()),
            EntryStatus::Missing => fs_utils::make_symlink(&self.path, marker).map_err(|source| {
                NamespaceError::Marker {
                    path: marker.to_path_buf(),
                    source,
                }
            }),
            EntryStatus::Symlink { target } | EntryStatus::BrokenSymlink { target } => {
                // Dangling counts too: holding the marker is what "active"
                // means, whether or not the directory survived.
                let name = target
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| target.display().to_string());
                Err(NamespaceError::AlreadyActive { name })
            }
            EntryStatus::RegularFile | EntryStatus::Directory => {
                Err(NamespaceError::MarkerObstructed {
                    path: marker.to_path_buf(),
                })
            }
        }
    }

    /// Remove the marker only if it is ours. Another namespace's marker is
    /// never touched.
    fn release_marker(&self) -> Result<(), NamespaceError> {
        let marker = self.root.current_ns_path();
        if EntryStatus::detect(marker).points_to(&self.path) {
            fs::remove_file(marker).map_err(|source| NamespaceError::Marker {
                path: marker.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Basenames eligible for linking: the namespace directory's entries
    /// minus the marker basename and the `.nsignore` set, sorted. Loaded
    /// fresh so edits to `.nsignore` take effect on the next sweep.
    fn sources(&self) -> Result<Vec<OsString>, NamespaceError> {
        let ignore = IgnoreList::load(&self.path).map_err(|source| NamespaceError::Read {
            path: self.path.join(NSIGNORE_FILE),
            source,
        })?;

        let read_err = |source| NamespaceError::Read {
            path: self.path.clone(),
            source,
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let name = entry.file_name();
            if name == CURRENT_NS_SYMLINK_NAME || ignore.contains(&name) {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Expose one namespace entry in the symlink directory.
    fn link_source(&self, name: &OsStr) -> io::Result<()> {
        let source = self.path.join(name);
        let target = self.root.symlink_path().join(name);
        let backup = fs_utils::backup_path(&target, &self.name);

        match EntryStatus::detect(&target) {
            // Already ours, including a link whose source was deleted.
            status if status.points_to(&source) => Ok(()),
            EntryStatus::Missing => {
                debug!("linking {} -> {}", target.display(), source.display());
                fs_utils::make_symlink(&source, &target)
            }
            EntryStatus::Symlink { .. } | EntryStatus::BrokenSymlink { .. } => {
                warn!(
                    "{} is a symlink to somewhere else, leaving it alone",
                    target.display()
                );
                Ok(())
            }
            EntryStatus::RegularFile | EntryStatus::Directory => {
                if fs::symlink_metadata(&backup).is_ok() {
                    // An earlier backup is never discarded or overwritten.
                    warn!(
                        "backup {} already exists, skipping {}",
                        backup.display(),
                        target.display()
                    );
                    return Ok(());
                }
                debug!("backing up {} -> {}", target.display(), backup.display());
                fs::rename(&target, &backup)?;
                fs_utils::make_symlink(&source, &target)
            }
        }
    }

    /// Withdraw one entry: unlink our symlink, restore the backup when the
    /// path is free again.
    fn unlink_source(&self, name: &OsStr) -> io::Result<()> {
        let source = self.path.join(name);
        let target = self.root.symlink_path().join(name);
        let backup = fs_utils::backup_path(&target, &self.name);

        if EntryStatus::detect(&target).points_to(&source) {
            debug!("unlinking {}", target.display());
            fs::remove_file(&target)?;
        }

        if fs::symlink_metadata(&backup).is_ok() {
            if fs::symlink_metadata(&target).is_ok() {
                // The path was re-occupied behind our back. The backup stays
                // on disk rather than clobbering whatever is there now.
                warn!(
                    "{} is occupied, leaving backup {} in place",
                    target.display(),
                    backup.display()
                );
            } else {
                debug!("restoring {} -> {}", backup.display(), target.display());
                fs::rename(&backup, &target)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_root_space;
    use std::os::unix::fs::{PermissionsExt, symlink};
    use tempfile::TempDir;

    fn namespace<'a>(space: &'a RootSpace, name: &str) -> Namespace<'a> {
        Namespace::new(space, name).unwrap()
    }

    fn entry_count(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_name_validation() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);

        for bad in ["", ".", "..", "a/b", ".current_ns"] {
            let err = Namespace::new(&space, bad).unwrap_err();
            assert!(matches!(err, NamespaceError::InvalidName { .. }), "{bad:?}");
        }
        for good in ["work", "test0", ".dotted", "with space"] {
            assert!(Namespace::new(&space, good).is_ok(), "{good:?}");
        }
    }

    #[test]
    fn test_create_exists_remove() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "work");

        assert!(!ns.exists());
        ns.create().unwrap();
        assert!(ns.exists());
        assert_eq!(space.namespaces().unwrap(), vec![ns.path().to_path_buf()]);

        let mode = fs::metadata(ns.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o744);

        let err = ns.create().unwrap_err();
        assert!(matches!(err, NamespaceError::Create { .. }));

        ns.remove().unwrap();
        assert!(!ns.exists());
        // Removing an absent namespace is a no-op.
        ns.remove().unwrap();
    }

    #[test]
    fn test_remove_non_empty_fails() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "work");
        ns.create().unwrap();
        fs::write(ns.path().join("rc"), "x").unwrap();

        let err = ns.remove().unwrap_err();
        assert!(matches!(err, NamespaceError::Remove { .. }));
        assert!(ns.exists());
    }

    #[test]
    fn test_activate_links_and_sets_marker() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "work");
        ns.create().unwrap();
        fs::write(ns.path().join("rc"), "ns content").unwrap();

        ns.activate().unwrap();

        assert!(ns.active());
        assert_eq!(space.current_ns_name(), Some("work".to_string()));
        assert_eq!(
            fs::read_link(space.current_ns_path()).unwrap(),
            ns.path().to_path_buf()
        );

        let linked = space.symlink_path().join("rc");
        assert_eq!(fs::read_link(&linked).unwrap(), ns.path().join("rc"));
        assert_eq!(fs::read_to_string(&linked).unwrap(), "ns content");
    }

    #[test]
    fn test_activate_links_directories() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "work");
        ns.create().unwrap();
        fs::create_dir(ns.path().join("conf.d")).unwrap();
        fs::write(ns.path().join("conf.d").join("a"), "x").unwrap();

        ns.activate().unwrap();

        let linked = space.symlink_path().join("conf.d");
        assert_eq!(fs::read_link(&linked).unwrap(), ns.path().join("conf.d"));
        assert!(linked.join("a").exists());
    }

    #[test]
    fn test_activate_missing_namespace_fails() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "ghost");

        let err = ns.activate().unwrap_err();
        assert!(matches!(err, NamespaceError::DoesNotExist { .. }));
        assert!(!space.current_ns_path().exists());
    }

    #[test]
    fn test_create_remove_activate_sequence_fails() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "work");

        ns.create().unwrap();
        ns.remove().unwrap();
        assert!(matches!(
            ns.activate().unwrap_err(),
            NamespaceError::DoesNotExist { .. }
        ));
    }

    #[test]
    fn test_mutual_exclusion() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let one = namespace(&space, "one");
        let two = namespace(&space, "two");
        one.create().unwrap();
        two.create().unwrap();
        fs::write(two.path().join("rc"), "two").unwrap();

        one.activate().unwrap();
        let err = two.activate().unwrap_err();

        // The error names the holder of the marker.
        assert!(matches!(err, NamespaceError::AlreadyActive { ref name } if name == "one"));
        assert!(one.active());
        assert!(!two.active());
        // The refused activation must not have touched any files.
        assert!(!space.symlink_path().join("rc").exists());
    }

    #[test]
    fn test_dangling_marker_blocks_activation() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "real");
        ns.create().unwrap();

        symlink(space.path().join("ghost"), space.current_ns_path()).unwrap();

        let err = ns.activate().unwrap_err();
        assert!(matches!(err, NamespaceError::AlreadyActive { ref name } if name == "ghost"));
    }

    #[test]
    fn test_obstructed_marker_blocks_activation() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "work");
        ns.create().unwrap();
        fs::write(ns.path().join("rc"), "x").unwrap();

        fs::write(space.current_ns_path(), "not a symlink").unwrap();

        let err = ns.activate().unwrap_err();
        assert!(matches!(err, NamespaceError::MarkerObstructed { .. }));
        assert!(!space.symlink_path().join("rc").exists());
        assert_eq!(
            fs::read_to_string(space.current_ns_path()).unwrap(),
            "not a symlink"
        );
    }

    #[test]
    fn test_reactivate_repairs_deleted_link() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "work");
        ns.create().unwrap();
        fs::write(ns.path().join("a"), "a").unwrap();
        fs::write(ns.path().join("b"), "b").unwrap();

        ns.activate().unwrap();
        fs::remove_file(space.symlink_path().join("a")).unwrap();

        ns.activate().unwrap();
        assert!(space.symlink_path().join("a").exists());
        assert!(space.symlink_path().join("b").exists());
    }

    #[test]
    fn test_displacement_backup_and_restore() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "test");
        ns.create().unwrap();
        fs::write(ns.path().join("rc"), "namespace").unwrap();

        let target = space.symlink_path().join("rc");
        fs::write(&target, "original").unwrap();

        ns.activate().unwrap();
        let backup = space.symlink_path().join("rc.test.bak");
        assert_eq!(fs::read_to_string(&target).unwrap(), "namespace");
        assert!(fs::symlink_metadata(&target).unwrap().is_symlink());
        assert_eq!(fs::read_to_string(&backup).unwrap(), "original");

        ns.deactivate().unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "original");
        assert!(!fs::symlink_metadata(&target).unwrap().is_symlink());
        assert!(!backup.exists());
        assert!(!space.current_ns_path().exists());
    }

    #[test]
    fn test_backup_collision_skips_entry() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "test");
        ns.create().unwrap();
        fs::write(ns.path().join("rc"), "namespace").unwrap();

        let target = space.symlink_path().join("rc");
        let backup = space.symlink_path().join("rc.test.bak");
        fs::write(&target, "current").unwrap();
        fs::write(&backup, "old backup").unwrap();

        // Activation succeeds but the colliding entry is left untouched.
        ns.activate().unwrap();
        assert!(ns.active());
        assert!(!fs::symlink_metadata(&target).unwrap().is_symlink());
        assert_eq!(fs::read_to_string(&target).unwrap(), "current");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "old backup");
    }

    #[test]
    fn test_restore_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "test");
        ns.create().unwrap();
        fs::write(ns.path().join("rc"), "namespace").unwrap();

        let target = space.symlink_path().join("rc");
        fs::write(&target, "original").unwrap();
        ns.activate().unwrap();

        // Someone replaced our symlink with a fresh real file.
        fs::remove_file(&target).unwrap();
        fs::write(&target, "newer").unwrap();

        ns.deactivate().unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "newer");
        let backup = space.symlink_path().join("rc.test.bak");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "original");
        assert!(!space.current_ns_path().exists());
    }

    #[test]
    fn test_foreign_symlink_left_alone() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "test");
        ns.create().unwrap();
        fs::write(ns.path().join("rc"), "namespace").unwrap();

        let elsewhere = temp_dir.path().join("elsewhere");
        fs::write(&elsewhere, "foreign").unwrap();
        let target = space.symlink_path().join("rc");
        symlink(&elsewhere, &target).unwrap();

        ns.activate().unwrap();
        assert_eq!(fs::read_link(&target).unwrap(), elsewhere);
        assert!(!space.symlink_path().join("rc.test.bak").exists());

        ns.deactivate().unwrap();
        assert_eq!(fs::read_link(&target).unwrap(), elsewhere);
    }

    #[test]
    fn test_empty_namespace_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "empty");
        ns.create().unwrap();

        ns.activate().unwrap();
        // Only the marker appears.
        assert_eq!(entry_count(space.symlink_path()), 1);
        assert!(space.current_ns_path().exists());

        ns.deactivate().unwrap();
        assert_eq!(entry_count(space.symlink_path()), 0);
        assert_eq!(entry_count(ns.path()), 0);
    }

    #[test]
    fn test_sequential_namespace_loop() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let names = [
            "test", "test1", "test2", "test3", "test4", "test5", "test6", "test7", "test8",
            "test9", "test0",
        ];

        for name in names {
            let ns = namespace(&space, name);
            ns.create().unwrap();
            fs::write(ns.path().join("rc"), name).unwrap();

            ns.activate().unwrap();
            assert!(ns.active());
            assert_eq!(
                fs::read_to_string(space.symlink_path().join("rc")).unwrap(),
                name
            );

            ns.deactivate().unwrap();
            assert!(!ns.active());

            fs::remove_file(ns.path().join("rc")).unwrap();
            ns.remove().unwrap();
        }

        assert!(space.namespaces().unwrap().is_empty());
        assert_eq!(entry_count(space.symlink_path()), 0);
    }

    #[test]
    fn test_ignore_applies_to_both_sweeps() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "test");
        ns.create().unwrap();
        fs::write(ns.path().join("a"), "a").unwrap();
        fs::write(ns.path().join("b"), "b").unwrap();
        fs::write(ns.path().join(".nsignore"), "a\n").unwrap();

        ns.activate().unwrap();
        assert!(!space.symlink_path().join("a").exists());
        assert!(space.symlink_path().join("b").exists());
        // Not listed in itself, so the ignore file gets linked like any entry.
        assert!(space.symlink_path().join(".nsignore").exists());

        ns.deactivate().unwrap();
        assert_eq!(entry_count(space.symlink_path()), 0);
        // The namespace still owns all three entries.
        assert_eq!(entry_count(ns.path()), 3);
    }

    #[test]
    fn test_deactivate_inactive_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let one = namespace(&space, "one");
        let two = namespace(&space, "two");
        one.create().unwrap();
        two.create().unwrap();
        fs::write(one.path().join("rc"), "one").unwrap();
        fs::write(two.path().join("rc"), "two").unwrap();

        one.activate().unwrap();
        two.deactivate().unwrap();

        // Another namespace's marker and links survive.
        assert!(one.active());
        assert_eq!(
            fs::read_link(space.symlink_path().join("rc")).unwrap(),
            one.path().join("rc")
        );
    }

    #[test]
    fn test_deactivate_clears_dangling_marker() {
        let temp_dir = TempDir::new().unwrap();
        let space = setup_root_space(&temp_dir);
        let ns = namespace(&space, "gone");
        ns.create().unwrap();
        ns.activate().unwrap();

        fs::remove_dir(ns.path()).unwrap();
        assert!(!ns.exists());

        ns.deactivate().unwrap();
        assert!(!space.current_ns_path().exists());
        assert_eq!(space.current_ns_name(), None);
    }
}
