//! Per-namespace ignore file handling.
//!
//! A namespace may carry a `.nsignore` file listing basenames, one per line,
//! that activation and deactivation leave alone.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;

/// Basename of the optional per-namespace ignore file.
pub const NSIGNORE_FILE: &str = ".nsignore";

/// The set of basenames a namespace excludes from linking.
///
/// Loaded fresh for every activate/deactivate sweep; never cached across
/// operations.
#[derive(Debug, Default)]
pub struct IgnoreList {
    entries: HashSet<String>,
}

impl IgnoreList {
    /// Read `dir/.nsignore`: one basename per line, trailing whitespace
    /// stripped, blank lines skipped. A missing file yields an empty list;
    /// any other read failure is propagated.
    pub fn load(dir: &Path) -> io::Result<Self> {
        let path = dir.join(NSIGNORE_FILE);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        };

        let entries = contents
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self { entries })
    }

    /// Whether `name` is excluded. Non-UTF-8 names never match: the file
    /// format is line-oriented text, so only UTF-8 basenames can be listed.
    pub fn contains(&self, name: &OsStr) -> bool {
        name.to_str().is_some_and(|name| self.entries.contains(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
