//! One synchronization pass over every configured gallery.
//!
//! For each gallery, in configuration order:
//!
//! 1. list and normalize the directory ([`crate::scan`])
//! 2. load the prior catalog
//! 3. reconcile ([`crate::catalog::reconcile`])
//! 4. write the catalog when it changed
//!
//! A gallery that fails (unreadable directory, catalog I/O) is logged and
//! reported; the remaining galleries still run. Publishing is not part of a
//! pass; the orchestrator decides on it from the returned [`PassReport`].
//!
//! A pass is blocking filesystem work. Async callers run it on the blocking
//! pool.

use crate::catalog::{self, CatalogDiff, CatalogEntry, CatalogError};
use crate::config::GalleryConfig;
use crate::metadata::MetadataReader;
use crate::scan::{self, ImageFile, RenameRecord, ScanError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("catalog {path}: {source}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: CatalogError,
    },
    #[error("no configured gallery directory could be read")]
    NoReadableGalleries,
}

/// Everything a pass needs besides the metadata reader.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub galleries: Vec<GalleryConfig>,
    pub web_root: String,
    /// Compute and log only: no renames, no catalog writes.
    pub dry_run: bool,
}

/// Successful reconciliation of one gallery.
#[derive(Debug, Clone)]
pub struct GallerySync {
    pub entries: Vec<CatalogEntry>,
    pub changed: bool,
    pub diff: CatalogDiff,
    /// Whether the catalog file was written during this pass.
    pub written: bool,
}

#[derive(Debug)]
pub struct GalleryReport {
    pub folder: String,
    pub catalog_path: PathBuf,
    pub renames: Vec<RenameRecord>,
    pub result: Result<GallerySync, SyncError>,
}

impl GalleryReport {
    pub fn changed(&self) -> bool {
        self.result.as_ref().is_ok_and(|s| s.changed)
    }

    /// The catalog file name, as used in publish summaries.
    pub fn catalog_name(&self) -> String {
        self.catalog_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.folder.clone())
    }
}

#[derive(Debug, Default)]
pub struct PassReport {
    pub galleries: Vec<GalleryReport>,
}

impl PassReport {
    /// Whether any catalog changed.
    pub fn changed(&self) -> bool {
        self.galleries.iter().any(GalleryReport::changed)
    }

    /// Galleries whose directory could be listed.
    pub fn readable_count(&self) -> usize {
        self.galleries
            .iter()
            .filter(|g| !matches!(g.result, Err(SyncError::Scan(_))))
            .count()
    }

    /// Number of galleries that failed for any reason.
    pub fn failed_count(&self) -> usize {
        self.galleries.iter().filter(|g| g.result.is_err()).count()
    }

    /// Comma-separated names of the changed catalogs.
    pub fn summary(&self) -> String {
        self.galleries
            .iter()
            .filter(|g| g.changed())
            .map(GalleryReport::catalog_name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Run one pass over all galleries. `minted_at` (milliseconds since the
/// epoch) goes into ids minted during the pass.
pub fn run_pass(settings: &SyncSettings, reader: &dyn MetadataReader, minted_at: i64) -> PassReport {
    let galleries = settings
        .galleries
        .iter()
        .map(|gallery| sync_gallery(gallery, settings, reader, minted_at))
        .collect();
    PassReport { galleries }
}

fn sync_gallery(
    gallery: &GalleryConfig,
    settings: &SyncSettings,
    reader: &dyn MetadataReader,
    minted_at: i64,
) -> GalleryReport {
    let (renames, result) = match scan::scan_gallery(&gallery.directory, settings.dry_run) {
        Ok(scanned) => {
            let result = reconcile_and_write(gallery, &scanned.images, settings, reader, minted_at);
            (scanned.renames, result)
        }
        Err(e) => (Vec::new(), Err(e.into())),
    };

    if let Err(e) = &result {
        error!(gallery = %gallery.folder, "{e}");
    }
    GalleryReport {
        folder: gallery.folder.clone(),
        catalog_path: gallery.catalog_path.clone(),
        renames,
        result,
    }
}

fn reconcile_and_write(
    gallery: &GalleryConfig,
    images: &[ImageFile],
    settings: &SyncSettings,
    reader: &dyn MetadataReader,
    minted_at: i64,
) -> Result<GallerySync, SyncError> {
    let catalog_err = |source| SyncError::Catalog {
        path: gallery.catalog_path.clone(),
        source,
    };

    let prior = catalog::load(&gallery.catalog_path).map_err(catalog_err)?;
    let rec = catalog::reconcile(
        gallery,
        images,
        &prior,
        reader,
        &settings.web_root,
        minted_at,
    );

    let written = rec.changed && !settings.dry_run;
    if written {
        catalog::save(&gallery.catalog_path, &rec.entries).map_err(catalog_err)?;
    }
    log_outcome(gallery, &rec.diff, rec.changed, settings.dry_run, rec.entries.len());

    Ok(GallerySync {
        entries: rec.entries,
        changed: rec.changed,
        diff: rec.diff,
        written,
    })
}

fn log_outcome(gallery: &GalleryConfig, diff: &CatalogDiff, changed: bool, dry_run: bool, total: usize) {
    let catalog = gallery.catalog_path.display();
    if !changed {
        debug!(gallery = %gallery.folder, %catalog, "catalog up to date");
        return;
    }
    let (added, updated, removed) = (diff.added.len(), diff.updated.len(), diff.removed.len());
    if dry_run {
        info!(gallery = %gallery.folder, %catalog, added, updated, removed, total, "[dry run] would write catalog");
    } else {
        info!(gallery = %gallery.folder, %catalog, added, updated, removed, total, "catalog updated");
    }
    for src in &diff.added {
        debug!(%src, "added");
    }
    for src in &diff.updated {
        debug!(%src, "updated");
    }
    for src in &diff.removed {
        debug!(%src, "removed");
    }
}
