//! CLI output formatting for one-shot commands.
//!
//! Long-running `watch` mode reports through `tracing`; the `sync` and
//! `rename` commands end with a human-readable report on stdout.
//!
//! # Output Format
//!
//! ## Sync
//!
//! ```text
//! 001 oil-paintings → json-files/oil-paintings.json
//!     3 images, updated (1 added, 1 updated, 0 removed)
//!     Renamed: Harbor Dusk.JPG → harbor-dusk.jpg
//!     Skipped: Sunset.jpg (sunset.jpg already exists)
//! 002 drips → json-files/drips.json
//!     5 images, unchanged
//! 003 ghost → json-files/ghost.json
//!     Error: cannot access gallery directory assets/images/ghost: ...
//!
//! Synced 2 of 3 galleries, 1 catalog changed
//! ```
//!
//! ## Rename
//!
//! ```text
//! assets/images/oil-paintings
//!     Harbor Dusk.JPG → harbor-dusk.jpg
//!     Skipped: Sunset.jpg (sunset.jpg already exists)
//!
//! Renamed 1, skipped 1, errors 0
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::naming::RenameOutcome;
use crate::scan::RenameRecord;
use crate::sync::PassReport;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Display `path` relative to `root` when it lives below it.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// One line per rename record, `None` for records with nothing to show.
fn rename_line(record: &RenameRecord, dry_run: bool) -> Option<String> {
    let raw = &record.raw;
    Some(match &record.result {
        Ok(RenameOutcome::Unchanged) => return None,
        Ok(RenameOutcome::Renamed { to }) => format!("Renamed: {raw} → {to}"),
        Ok(RenameOutcome::WouldRename { to }) if dry_run => {
            format!("Would rename: {raw} → {to}")
        }
        Ok(RenameOutcome::WouldRename { to }) => format!("Renamed: {raw} → {to}"),
        Ok(RenameOutcome::Conflict { existing }) => {
            format!("Skipped: {raw} ({existing} already exists)")
        }
        Ok(RenameOutcome::Unusable { canonical }) => {
            format!("Skipped: {raw} (canonical name \"{canonical}\" is unusable)")
        }
        Err(e) => format!("Error: {e}"),
    })
}

// ============================================================================
// Sync
// ============================================================================

pub fn format_pass_report(report: &PassReport, root: &Path, dry_run: bool) -> Vec<String> {
    let mut lines = Vec::new();

    for (i, gallery) in report.galleries.iter().enumerate() {
        lines.push(format!(
            "{} {} → {}",
            format_index(i + 1),
            gallery.folder,
            display_path(&gallery.catalog_path, root)
        ));

        match &gallery.result {
            Ok(sync) => {
                let images = plural(sync.entries.len(), "image");
                let status = if !sync.changed {
                    format!("{images}, unchanged")
                } else {
                    let verb = if dry_run { "would update" } else { "updated" };
                    format!(
                        "{images}, {verb} ({} added, {} updated, {} removed)",
                        sync.diff.added.len(),
                        sync.diff.updated.len(),
                        sync.diff.removed.len()
                    )
                };
                lines.push(format!("{}{}", indent(1), status));
            }
            Err(e) => lines.push(format!("{}Error: {e}", indent(1))),
        }

        for record in &gallery.renames {
            if let Some(line) = rename_line(record, dry_run) {
                lines.push(format!("{}{}", indent(1), line));
            }
        }
    }

    let changed = report.galleries.iter().filter(|g| g.changed()).count();
    lines.push(String::new());
    lines.push(format!(
        "Synced {} of {} galleries, {} changed",
        report.galleries.len() - report.failed_count(),
        report.galleries.len(),
        plural(changed, "catalog")
    ));
    lines
}

pub fn print_pass_report(report: &PassReport, root: &Path, dry_run: bool) {
    for line in format_pass_report(report, root, dry_run) {
        println!("{line}");
    }
}

// ============================================================================
// Rename
// ============================================================================

/// Totals of a bulk rename run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenameCounts {
    pub renamed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl RenameCounts {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a RenameRecord>) -> Self {
        let mut counts = Self::default();
        for record in records {
            match &record.result {
                Ok(RenameOutcome::Renamed { .. } | RenameOutcome::WouldRename { .. }) => {
                    counts.renamed += 1
                }
                Ok(RenameOutcome::Conflict { .. } | RenameOutcome::Unusable { .. }) => {
                    counts.skipped += 1
                }
                Ok(RenameOutcome::Unchanged) => {}
                Err(_) => counts.errors += 1,
            }
        }
        counts
    }
}

/// `dirs` pairs each directory with the records of normalizing it (or the
/// error that prevented listing it).
pub fn format_rename_report(
    dirs: &[(&Path, Result<Vec<RenameRecord>, String>)],
    root: &Path,
    dry_run: bool,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut counts = RenameCounts::default();

    for (dir, result) in dirs {
        let records = match result {
            Ok(records) if records.is_empty() => continue,
            Ok(records) => records,
            Err(e) => {
                lines.push(display_path(dir, root));
                lines.push(format!("{}Error: {e}", indent(1)));
                counts.errors += 1;
                continue;
            }
        };
        lines.push(display_path(dir, root));
        for record in records {
            if let Some(line) = rename_line(record, dry_run) {
                let line = line
                    .strip_prefix("Renamed: ")
                    .map(String::from)
                    .unwrap_or(line);
                lines.push(format!("{}{}", indent(1), line));
            }
        }
        let tally = RenameCounts::tally(records);
        counts.renamed += tally.renamed;
        counts.skipped += tally.skipped;
        counts.errors += tally.errors;
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    let verb = if dry_run { "Would rename" } else { "Renamed" };
    lines.push(format!(
        "{verb} {}, skipped {}, errors {}",
        counts.renamed, counts.skipped, counts.errors
    ));
    lines
}

pub fn print_rename_report(
    dirs: &[(&Path, Result<Vec<RenameRecord>, String>)],
    root: &Path,
    dry_run: bool,
) {
    for line in format_rename_report(dirs, root, dry_run) {
        println!("{line}");
    }
}
