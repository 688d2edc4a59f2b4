//! Filename canonicalization and collision-safe renaming.
//!
//! Every image in a gallery directory is stored under a canonical name:
//! lowercase, whitespace runs collapsed into a single dash, and nothing
//! outside `[a-z0-9._-]`. The canonical name is what ends up in the catalog's
//! `src` field, so the web layer never has to escape anything.
//!
//! ```text
//! "My Photo #1.JPG"   →  "my-photo-1.jpg"
//! "Dusk  over_Bay.png" →  "dusk-over_bay.png"
//! ```
//!
//! ## Renaming on disk
//!
//! [`rename_to_canonical`] moves a file to its canonical name, but never over
//! another file. The check has to work on both case-sensitive and
//! case-insensitive filesystems:
//!
//! - If the directory listing already holds an entry spelled exactly like the
//!   canonical name, that is a different file: conflict.
//! - Otherwise, if the canonical path "exists" but the raw name lowercases to
//!   the canonical name, the hit is the file itself seen through a
//!   case-insensitive filesystem: rename.
//! - Otherwise an existing canonical path is a different file: conflict.
//!
//! ## Display titles
//!
//! [`fallback_title`] derives a human title from a filename for images with
//! no embedded title: `my-photo_1.jpg` → "My Photo 1".

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NamingError {
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Canonicalize a filename.
///
/// Rules, applied in order:
/// 1. lowercase
/// 2. each run of whitespace becomes a single `-`
/// 3. every character outside `[a-z0-9._-]` is dropped
///
/// Total over any input and idempotent.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();

    let mut dashed = String::with_capacity(lowered.len());
    let mut in_whitespace = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                dashed.push('-');
            }
            in_whitespace = true;
        } else {
            dashed.push(c);
            in_whitespace = false;
        }
    }

    dashed
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '_'))
        .collect()
}

/// Hidden and system entries (leading dot) are never processed.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Title derived from a filename when the image carries none.
///
/// Strips the extension, turns `-` and `_` into spaces and uppercases the
/// first letter of every word.
pub fn fallback_title(filename: &str) -> String {
    let stem = match filename.rfind('.') {
        Some(pos) if pos > 0 => &filename[..pos],
        _ => filename,
    };
    let spaced = stem.replace(['-', '_'], " ");

    let mut title = String::with_capacity(spaced.len());
    let mut at_word_start = true;
    for c in spaced.chars() {
        if at_word_start && c.is_alphanumeric() {
            title.extend(c.to_uppercase());
        } else {
            title.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }
    title
}

/// What happened when a file was brought to its canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// Already canonical.
    Unchanged,
    /// Renamed on disk.
    Renamed { to: String },
    /// Dry run: the rename that would have been performed.
    WouldRename { to: String },
    /// A different file already holds the canonical name; nothing touched.
    Conflict { existing: String },
    /// Canonical form is empty or would hide the file.
    Unusable { canonical: String },
}

impl RenameOutcome {
    /// The name the file carries after this outcome is applied.
    pub fn effective_name<'a>(&'a self, raw: &'a str) -> &'a str {
        match self {
            RenameOutcome::Renamed { to } | RenameOutcome::WouldRename { to } => to,
            _ => raw,
        }
    }
}

/// Move `dir/raw` to its canonical name, never overwriting another file.
///
/// `names` is the caller's view of the directory listing. It is used for the
/// exact-spelling collision check and is updated to reflect the rename (also
/// in dry-run mode, so later files in the same listing see the planned name).
pub fn rename_to_canonical(
    dir: &Path,
    raw: &str,
    names: &mut BTreeSet<String>,
    dry_run: bool,
) -> Result<RenameOutcome, NamingError> {
    let canonical = normalize(raw);
    if canonical == raw {
        return Ok(RenameOutcome::Unchanged);
    }
    if canonical.is_empty() || is_hidden(&canonical) {
        return Ok(RenameOutcome::Unusable { canonical });
    }

    let from = dir.join(raw);
    let to = dir.join(&canonical);

    let case_only = raw.to_lowercase() == canonical;
    let taken = names.contains(&canonical) || (to.exists() && !case_only);
    if taken {
        return Ok(RenameOutcome::Conflict {
            existing: canonical,
        });
    }

    if dry_run {
        names.remove(raw);
        names.insert(canonical.clone());
        return Ok(RenameOutcome::WouldRename { to: canonical });
    }

    fs::rename(&from, &to).map_err(|source| NamingError::Rename {
        from: from.clone(),
        to: to.clone(),
        source,
    })?;
    names.remove(raw);
    names.insert(canonical.clone());
    Ok(RenameOutcome::Renamed { to: canonical })
}
