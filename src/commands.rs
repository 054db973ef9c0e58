//! Handlers for the CLI subcommands.
//!
//! One function per subcommand, coordinating:
//! - `crate::rootspace` / `crate::namespace` for the actual switching logic.
//! - `crate::ui` for output and prompts.
//! - `crate::doctor` for diagnostics.
//!
//! Validation errors from the lower layers pass through as typed errors so
//! `main` can prefix them by kind.

use std::fs;
use std::path::Path;

use anstyle::AnsiColor;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::doctor::run_doctor;
use crate::fs_utils::EntryStatus;
use crate::namespace::Namespace;
use crate::paths::Paths;
use crate::rootspace::RootSpace;
use crate::ui::Ui;

/// One row of `list --json` output.
#[derive(Serialize)]
struct NamespaceRecord {
    name: String,
    path: String,
    active: bool,
}

/// List namespaces, as a table or as JSON for scripting.
pub fn list(space: &RootSpace, ui: &Ui, json: bool) -> Result<()> {
    let paths = space.namespaces()?;
    let current = space.current_ns_name();

    if json {
        let records: Vec<NamespaceRecord> = paths
            .iter()
            .map(|path| {
                let name = display_name(path);
                NamespaceRecord {
                    active: Some(name.as_str()) == current.as_deref(),
                    path: path.display().to_string(),
                    name,
                }
            })
            .collect();
        ui.println(serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if paths.is_empty() {
        ui.warn("No namespaces found.");
        ui.newline();
        ui.println("Create one with:");
        ui.println(format!("  {} create <name>", ui.bold("nsctl")));
        return Ok(());
    }

    let mut table = ui.simple_table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("Namespace"),
        ui.header_cell("Path"),
        ui.header_cell("Modified"),
        ui.header_cell("Status"),
    ]);

    for path in &paths {
        let name = display_name(path);
        let is_active = Some(name.as_str()) == current.as_deref();
        let icon = if is_active { ui.icon_ok() } else { " " };
        let status_cell = if is_active {
            ui.colored_cell("active", AnsiColor::Green)
        } else {
            ui.cell("-")
        };

        table.add_row(vec![
            ui.cell(icon),
            ui.cell(name),
            ui.cell(path.display().to_string()),
            ui.cell(modified_at(path)),
            status_cell,
        ]);
    }

    ui.section("Namespaces");
    ui.println(table.to_string());
    Ok(())
}

/// Show the active namespace and the state of the marker symlink.
pub fn current(space: &RootSpace, ui: &Ui) -> Result<()> {
    ui.section("Current Namespace");
    ui.newline();

    let mut table = ui.simple_table();
    match space.current_ns_name() {
        Some(name) => {
            table.add_row(vec![ui.cell("Active namespace:"), ui.header_cell(name)]);
        }
        None => {
            table.add_row(vec![ui.cell("Active namespace:"), ui.cell("(none)")]);
        }
    }

    let marker_cell = match EntryStatus::detect(space.current_ns_path()) {
        EntryStatus::Missing => ui.cell("absent"),
        EntryStatus::Symlink { target } => ui.cell(format!("symlink → {}", target.display())),
        EntryStatus::BrokenSymlink { target } => ui.colored_cell(
            format!("broken symlink → {}", target.display()),
            AnsiColor::Red,
        ),
        EntryStatus::RegularFile | EntryStatus::Directory => {
            ui.colored_cell("obstructed (not a symlink)", AnsiColor::Yellow)
        }
    };
    table.add_row(vec![ui.cell("Marker:"), marker_cell]);

    table.add_row(vec![
        ui.cell("Root:"),
        ui.cell(space.path().display().to_string()),
    ]);
    table.add_row(vec![
        ui.cell("Symlink dir:"),
        ui.cell(space.symlink_path().display().to_string()),
    ]);

    ui.println(table.to_string());
    Ok(())
}

/// Create a new, empty namespace.
pub fn create(space: &RootSpace, name: &str, ui: &Ui) -> Result<()> {
    let ns = Namespace::new(space, name)?;
    if ns.exists() {
        bail!(
            "Namespace '{}' already exists.\nHint: Pick a different name, or remove it first with 'nsctl remove {}'.",
            name,
            name
        );
    }
    ns.create()?;

    ui.ok(format!("Created namespace '{}'", name));
    ui.newline();
    ui.println("To activate it:");
    ui.println(format!("  nsctl activate {}", name));
    Ok(())
}

/// Remove a namespace directory.
pub fn remove(space: &RootSpace, name: &str, ui: &Ui, force: bool) -> Result<()> {
    let ns = Namespace::new(space, name)?;

    if !ns.exists() {
        ui.warn(format!("Namespace '{}' does not exist.", name));
        return Ok(());
    }

    if ns.active() {
        bail!(
            "Cannot remove '{}' while it is active.\nHint: Run 'nsctl deactivate' first.",
            name
        );
    }

    if !force {
        let confirm = inquire::Confirm::new(&format!("Remove namespace '{}'?", name))
            .with_default(false)
            .with_help_message("Only empty namespace directories can be removed")
            .prompt()
            .context("Confirmation cancelled")?;

        if !confirm {
            ui.warn("Removal cancelled.");
            return Ok(());
        }
    }

    ns.remove()?;
    ui.ok(format!("Removed namespace '{}'", name));
    Ok(())
}

/// Activate a namespace.
pub fn activate(space: &RootSpace, name: &str, ui: &Ui) -> Result<()> {
    let ns = Namespace::new(space, name)?;
    let spinner = ui.spinner(format!("Activating namespace '{}'...", name));

    match ns.activate() {
        Ok(()) => {
            ui.spinner_finish_ok(&spinner, format!("Active namespace: {}", name));
            Ok(())
        }
        Err(e) => {
            ui.spinner_finish_err(&spinner, format!("Failed to activate '{}'", name));
            Err(e.into())
        }
    }
}

/// Deactivate every namespace, continuing past individual failures.
pub fn deactivate_all(space: &RootSpace, ui: &Ui) -> Result<()> {
    let paths = space.namespaces()?;
    if paths.is_empty() && space.current_ns_name().is_none() {
        ui.info("No namespaces to deactivate.");
        return Ok(());
    }

    ui.section("Deactivating namespaces");
    let mut failures = 0usize;

    for path in &paths {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            ui.println(format!(
                "  {} {} (unusable name)",
                ui.icon_err(),
                path.display()
            ));
            failures += 1;
            continue;
        };

        match Namespace::new(space, name).and_then(|ns| ns.deactivate()) {
            Ok(()) => ui.println(format!("  {} {}", ui.icon_ok(), name)),
            Err(e) => {
                ui.println(format!("  {} {}: {}", ui.icon_err(), name, e));
                failures += 1;
            }
        }
    }

    // A marker can outlive its namespace directory; the loop above only
    // visits directories that still exist.
    if let Some(name) = space.current_ns_name() {
        match Namespace::new(space, &name) {
            Ok(ns) if !ns.exists() && ns.active() => match ns.deactivate() {
                Ok(()) => {
                    ui.println(format!(
                        "  {} {} (cleared dangling marker)",
                        ui.icon_ok(),
                        name
                    ));
                }
                Err(e) => {
                    ui.println(format!("  {} {}: {}", ui.icon_err(), name, e));
                    failures += 1;
                }
            },
            _ => {}
        }
    }

    ui.newline();
    if failures > 0 {
        bail!("{} namespace(s) could not be fully deactivated", failures);
    }
    ui.ok("All namespaces deactivated");
    Ok(())
}

/// Run diagnostics on the configured directories.
pub fn doctor(paths: &Paths, ui: &Ui) -> Result<()> {
    run_doctor(paths, ui);
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn modified_at(path: &Path) -> String {
    match fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(time) => {
            let local: DateTime<Local> = time.into();
            local.format("%Y-%m-%d %H:%M").to_string()
        }
        Err(_) => "?".to_string(),
    }
}
