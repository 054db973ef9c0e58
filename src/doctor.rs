//! Environment diagnostics behind `nsctl doctor`.
//!
//! Runs on the unvalidated directory pair so a broken setup, the very thing
//! being diagnosed, can still be inspected. Checks cover the root and
//! symlink directories, the marker symlink, per-namespace ignore files, and
//! leftover backups.

use std::env;
use std::fs;

use anstyle::AnsiColor;

use crate::fs_utils::{self, EntryStatus};
use crate::ignore::IgnoreList;
use crate::paths::{Paths, ROOT_PATH_ENV, SYMLINK_PATH_ENV};
use crate::rootspace::CURRENT_NS_SYMLINK_NAME;
use crate::ui::Ui;

pub fn run_doctor(paths: &Paths, ui: &Ui) {
    ui.section("nsctl doctor");
    ui.newline();

    check_step(ui, "Root directory", || check_root(paths, ui));
    check_step(ui, "Symlink directory", || check_symlink_dir(paths, ui));
    check_step(ui, "Marker", || check_marker(paths, ui));
    check_step(ui, "Namespaces", || check_namespaces(paths, ui));
    check_step(ui, "Backups", || check_backups(paths, ui));
    check_step(ui, "Environment", || check_environment(ui));
}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F)
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {name}...")));
    if !check_fn() {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
}

fn check_root(paths: &Paths, ui: &Ui) -> bool {
    let root = &paths.root_path;
    if !root.exists() {
        ui.println(format!(
            "  {} Root missing: {} (created on first use)",
            ui.icon_warn(),
            root.display()
        ));
        return true;
    }
    if !root.is_dir() {
        ui.println(format!(
            "  {} Root is not a directory: {}",
            ui.icon_err(),
            root.display()
        ));
        return false;
    }
    ui.println(format!(
        "  {} Root exists: {}",
        ui.icon_ok(),
        root.display()
    ));
    if !fs_utils::readable(root) {
        ui.println(format!("  {} Root is not readable", ui.icon_err()));
        return false;
    }

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            ui.println(format!("  {} Cannot list root: {}", ui.icon_err(), e));
            return false;
        }
    };

    let mut count = 0usize;
    let mut skipped = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() && !path.is_symlink() {
            count += 1;
        } else {
            skipped.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    ui.println(format!("  {} {} namespace(s)", ui.icon_info(), count));
    skipped.sort();
    for name in &skipped {
        ui.println(format!(
            "  {} {} is not a namespace (not a real directory)",
            ui.icon_warn(),
            name
        ));
    }
    true
}

fn check_symlink_dir(paths: &Paths, ui: &Ui) -> bool {
    let dir = &paths.symlink_path;
    if !dir.exists() {
        ui.println(format!(
            "  {} Missing: {} (never created automatically)",
            ui.icon_err(),
            dir.display()
        ));
        return false;
    }
    if !dir.is_dir() {
        ui.println(format!(
            "  {} Not a directory: {}",
            ui.icon_err(),
            dir.display()
        ));
        return false;
    }
    ui.println(format!("  {} Exists: {}", ui.icon_ok(), dir.display()));
    if !fs_utils::writable(dir) {
        ui.println(format!("  {} Not writable", ui.icon_err()));
        return false;
    }
    true
}

fn check_marker(paths: &Paths, ui: &Ui) -> bool {
    let marker = paths.symlink_path.join(CURRENT_NS_SYMLINK_NAME);
    match EntryStatus::detect(&marker) {
        EntryStatus::Missing => {
            ui.println(format!("  {} No namespace is active", ui.icon_info()));
            true
        }
        EntryStatus::Symlink { target } => {
            ui.println(format!(
                "  {} Marker points to: {}",
                ui.icon_ok(),
                target.display()
            ));
            if !target.starts_with(&paths.root_path) {
                ui.println(format!(
                    "  {} Marker target is outside the root {}",
                    ui.icon_warn(),
                    paths.root_path.display()
                ));
            }
            true
        }
        EntryStatus::BrokenSymlink { target } => {
            ui.println(format!(
                "  {} Marker is dangling: {}",
                ui.icon_err(),
                target.display()
            ));
            ui.println(format!(
                "  {} Run 'nsctl deactivate' to clear it",
                ui.icon_info()
            ));
            false
        }
        EntryStatus::RegularFile | EntryStatus::Directory => {
            ui.println(format!(
                "  {} {} is not a symlink; activation is blocked until it is moved away",
                ui.icon_err(),
                marker.display()
            ));
            false
        }
    }
}

fn check_namespaces(paths: &Paths, ui: &Ui) -> bool {
    let entries = match fs::read_dir(&paths.root_path) {
        Ok(entries) => entries,
        // Already reported under the root check.
        Err(_) => return true,
    };

    let mut namespaces: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && !path.is_symlink())
        .collect();
    namespaces.sort();

    if namespaces.is_empty() {
        ui.println(format!("  {} No namespaces found", ui.icon_warn()));
        return true;
    }

    let mut all_valid = true;
    for path in &namespaces {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        match IgnoreList::load(path) {
            Ok(list) if list.is_empty() => {
                ui.println(format!("    {} {}", ui.icon_ok(), name));
            }
            Ok(list) => {
                ui.println(format!(
                    "    {} {} ({} ignored entries)",
                    ui.icon_ok(),
                    name,
                    list.len()
                ));
            }
            Err(e) => {
                ui.println(format!(
                    "    {} {} (unreadable .nsignore: {})",
                    ui.icon_err(),
                    name,
                    e
                ));
                all_valid = false;
            }
        }
    }
    all_valid
}

fn check_backups(paths: &Paths, ui: &Ui) -> bool {
    let entries = match fs::read_dir(&paths.symlink_path) {
        Ok(entries) => entries,
        // Already reported under the symlink directory check.
        Err(_) => return true,
    };

    let marker = paths.symlink_path.join(CURRENT_NS_SYMLINK_NAME);
    let active = match EntryStatus::detect(&marker) {
        EntryStatus::Symlink { target } | EntryStatus::BrokenSymlink { target } => target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        _ => None,
    };

    let mut names: Vec<String> = entries
        .flatten()
        .filter_map(|entry| entry.file_name().to_str().map(String::from))
        .filter(|name| name.ends_with(".bak"))
        .collect();
    names.sort();

    if names.is_empty() {
        ui.println(format!("  {} No backup files", ui.icon_ok()));
        return true;
    }

    for name in &names {
        let stem = name.strip_suffix(".bak").unwrap_or(name);
        match stem.rsplit_once('.') {
            Some((base, ns)) if Some(ns) == active.as_deref() => {
                ui.println(format!(
                    "  {} {} shelters '{}' for the active namespace",
                    ui.icon_ok(),
                    name,
                    base
                ));
            }
            Some((_, ns)) => {
                ui.println(format!(
                    "  {} {} is stale: namespace '{}' is not active",
                    ui.icon_warn(),
                    name,
                    ns
                ));
            }
            None => {
                ui.println(format!(
                    "  {} {} does not follow <name>.<namespace>.bak",
                    ui.icon_info(),
                    name
                ));
            }
        }
    }
    true
}

fn check_environment(ui: &Ui) -> bool {
    for (var, fallback) in [(ROOT_PATH_ENV, "~/.ns"), (SYMLINK_PATH_ENV, "~")] {
        match env::var(var) {
            Ok(value) if !value.is_empty() => {
                ui.println(format!("  {} {} set to: {}", ui.icon_info(), var, value));
            }
            _ => {
                ui.println(format!(
                    "  {} {} not set (default {})",
                    ui.icon_info(),
                    var,
                    fallback
                ));
            }
        }
    }
    true
}
