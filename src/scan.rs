//! Gallery directory listing and filename normalization.
//!
//! First step of every pass for a gallery. Lists the gallery directory (top
//! level only, regular files, hidden entries skipped, sorted by name), brings
//! every image to its canonical filename and returns the images sorted by
//! that canonical name as [`ImageFile`]s.
//!
//! Renaming happens here, before anything reads metadata or derives a `src`,
//! so every later step of the pass sees the post-rename name. A file whose
//! rename was skipped (conflict, unusable canonical name, I/O failure) is
//! still processed, under its original name.
//!
//! ## Dry run
//!
//! With `dry_run` nothing is renamed. Each [`ImageFile`] then carries the
//! original on-disk path (to read metadata from) and the planned canonical
//! name (to derive `src` from), so the logged catalog matches what a real
//! pass would write.

use crate::naming::{self, NamingError, RenameOutcome};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot access gallery directory {dir}: {source}")]
    Io {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("cannot list gallery directory {dir}: {source}")]
    Walk {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl ScanError {
    /// True when the directory simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScanError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Extensions (lowercase) of files treated as gallery images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Which files a normalization run touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameScope {
    /// Only gallery images (sync passes).
    Images,
    /// Every non-hidden file (bulk `rename` command).
    AllFiles,
}

/// An image in a gallery, as seen by the rest of the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Path to read the file from.
    pub path: PathBuf,
    /// Canonical file name; the last segment of `src`.
    pub file_name: String,
}

/// A file whose name was (or would have been) touched.
#[derive(Debug)]
pub struct RenameRecord {
    pub raw: String,
    pub result: Result<RenameOutcome, NamingError>,
}

/// Result of scanning one gallery directory.
#[derive(Debug, Default)]
pub struct GalleryScan {
    pub images: Vec<ImageFile>,
    pub renames: Vec<RenameRecord>,
}

pub fn is_image_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// List, normalize and collect the images of one gallery directory.
pub fn scan_gallery(dir: &Path, dry_run: bool) -> Result<GalleryScan, ScanError> {
    let names = collect_file_names(dir)?;
    let (renames, resolved) = normalize_names(dir, names, RenameScope::Images, dry_run);

    let mut images: Vec<ImageFile> = resolved
        .into_iter()
        .filter(|(_, effective)| is_image_name(effective))
        .map(|(on_disk, effective)| ImageFile {
            path: dir.join(on_disk),
            file_name: effective,
        })
        .collect();
    // Renames can change the order; the next listing sees canonical names.
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(GalleryScan { images, renames })
}

/// Bring every file in `dir` within `scope` to its canonical name.
pub fn normalize_directory(
    dir: &Path,
    scope: RenameScope,
    dry_run: bool,
) -> Result<Vec<RenameRecord>, ScanError> {
    let names = collect_file_names(dir)?;
    Ok(normalize_names(dir, names, scope, dry_run).0)
}

/// Rename in listing order. Returns the non-trivial outcomes plus, for every
/// file, `(name on disk, effective canonical name)`.
fn normalize_names(
    dir: &Path,
    names: Vec<String>,
    scope: RenameScope,
    dry_run: bool,
) -> (Vec<RenameRecord>, Vec<(String, String)>) {
    let mut current: BTreeSet<String> = names.iter().cloned().collect();
    let mut records = Vec::new();
    let mut resolved = Vec::with_capacity(names.len());

    for raw in names {
        let in_scope = match scope {
            RenameScope::Images => is_image_name(&raw),
            RenameScope::AllFiles => true,
        };
        if !in_scope {
            resolved.push((raw.clone(), raw));
            continue;
        }

        let result = naming::rename_to_canonical(dir, &raw, &mut current, dry_run);
        let effective = match &result {
            Ok(outcome) => outcome.effective_name(&raw).to_string(),
            Err(_) => raw.clone(),
        };
        let on_disk = if dry_run { raw.clone() } else { effective.clone() };
        log_rename(dir, &raw, &result);
        resolved.push((on_disk, effective));
        if !matches!(result, Ok(RenameOutcome::Unchanged)) {
            records.push(RenameRecord { raw, result });
        }
    }

    (records, resolved)
}

fn log_rename(dir: &Path, raw: &str, result: &Result<RenameOutcome, NamingError>) {
    let dir = dir.display();
    match result {
        Ok(RenameOutcome::Unchanged) => {}
        Ok(RenameOutcome::Renamed { to }) => info!(%dir, from = raw, to = %to, "renamed"),
        Ok(RenameOutcome::WouldRename { to }) => {
            info!(%dir, from = raw, to = %to, "[dry run] would rename")
        }
        Ok(RenameOutcome::Conflict { existing }) => {
            warn!(%dir, file = raw, existing = %existing, "rename skipped, target already exists")
        }
        Ok(RenameOutcome::Unusable { canonical }) => {
            warn!(%dir, file = raw, canonical = %canonical, "rename skipped, canonical name unusable")
        }
        Err(e) => error!(%dir, file = raw, "{e}"),
    }
}

/// Sorted names of the regular, non-hidden files directly inside `dir`.
fn collect_file_names(dir: &Path) -> Result<Vec<String>, ScanError> {
    let meta = std::fs::metadata(dir).map_err(|source| ScanError::Io {
        dir: dir.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(ScanError::NotADirectory(dir.to_path_buf()));
    }

    let mut names = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|source| ScanError::Walk {
            dir: dir.to_path_buf(),
            source,
        })?;
        let Some(name) = entry.file_name().to_str() else {
            warn!(file = %entry.path().display(), "skipping file with non UTF-8 name");
            continue;
        };
        if naming::is_hidden(name) || !entry.path().is_file() {
            continue;
        }
        names.push(name.to_string());
    }

    Ok(names)
}
