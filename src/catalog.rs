//! Per-gallery JSON catalogs and their reconciliation against the directory.
//!
//! A catalog is the JSON array the website renders a gallery from. Each
//! element describes one image:
//!
//! ```json
//! {
//!   "id": "oil-1712345678901-0",
//!   "title": "Harbor At Dusk",
//!   "src": "assets/images/oil-paintings/harbor-at-dusk.jpg",
//!   "description": "",
//!   "medium": "Oil on canvas",
//!   "dimensions": "24 x 36 in"
//! }
//! ```
//!
//! ## Identity
//!
//! An entry is joined to the file it describes by `src` only. The `id` is
//! minted once (`{id_prefix}-{timestamp_ms}-{ordinal}`) and then carried
//! forward unchanged for as long as a file with the same `src` exists, even
//! when every other field is edited.
//!
//! ## Field values
//!
//! For each descriptive field the freshly extracted value wins when it is
//! non-empty. Otherwise the previously stored value is kept, so hand edits
//! to the JSON survive images that carry no metadata. A brand-new entry
//! without metadata gets a title derived from its filename and empty
//! strings elsewhere.
//!
//! ## Writes
//!
//! [`save`] is atomic: the JSON goes to a temp file next to the catalog and
//! is then renamed over it, so the web server never serves a half-written
//! catalog.

use crate::config::GalleryConfig;
use crate::metadata::{self, MetadataReader};
use crate::naming;
use crate::scan::ImageFile;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot replace catalog: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// One image as the website sees it. Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub medium: String,
    #[serde(default)]
    pub dimensions: String,
}

/// The catalog found on disk before a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorCatalog {
    /// No catalog file yet.
    Missing,
    /// A file exists but is not a catalog; it will be rewritten.
    Unreadable,
    Present(Vec<CatalogEntry>),
}

impl PriorCatalog {
    pub fn entries(&self) -> &[CatalogEntry] {
        match self {
            PriorCatalog::Present(entries) => entries,
            PriorCatalog::Missing | PriorCatalog::Unreadable => &[],
        }
    }
}

/// `src` values that entered, changed in, or left a catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDiff {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

impl CatalogDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Outcome of reconciling one gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub entries: Vec<CatalogEntry>,
    /// Whether the catalog on disk must be (re)written.
    pub changed: bool,
    pub diff: CatalogDiff,
}

/// Load the catalog at `path`.
///
/// A missing file and a file that does not parse as a catalog are reported,
/// not treated as errors; any other I/O failure is.
pub fn load(path: &Path) -> Result<PriorCatalog, CatalogError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PriorCatalog::Missing),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_str(&content) {
        Ok(entries) => Ok(PriorCatalog::Present(entries)),
        Err(e) => {
            warn!(catalog = %path.display(), "catalog unreadable, it will be rewritten: {e}");
            Ok(PriorCatalog::Unreadable)
        }
    }
}

/// Atomically write `entries` to `path` as pretty-printed JSON.
pub fn save(path: &Path, entries: &[CatalogEntry]) -> Result<(), CatalogError> {
    write_atomic(path, |file| {
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, entries)?;
        out.flush()?;
        Ok(())
    })
}

/// Run `write` against a temp file next to `path`, then rename it over
/// `path`. On any failure the temp file is removed and `path` is untouched.
fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut File) -> Result<(), CatalogError>,
) -> Result<(), CatalogError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// `<web_root><folder>/<file_name>`. A separator is added when a non-empty
/// root lacks its trailing slash.
pub fn src_for(web_root: &str, folder: &str, file_name: &str) -> String {
    if web_root.is_empty() || web_root.ends_with('/') {
        format!("{web_root}{folder}/{file_name}")
    } else {
        format!("{web_root}/{folder}/{file_name}")
    }
}

/// Build the catalog a gallery should have, given its current images.
///
/// `images` must be in listing order; the catalog follows it. Metadata is
/// read in parallel. `minted_at` is the timestamp embedded in ids minted
/// during this pass.
pub fn reconcile(
    gallery: &GalleryConfig,
    images: &[ImageFile],
    prior: &PriorCatalog,
    reader: &dyn MetadataReader,
    web_root: &str,
    minted_at: i64,
) -> Reconciliation {
    let extracted: Vec<_> = images
        .par_iter()
        .map(|image| metadata::extract(reader, &image.path))
        .collect();

    let prior_entries = prior.entries();
    let by_src: HashMap<&str, &CatalogEntry> = prior_entries
        .iter()
        .map(|entry| (entry.src.as_str(), entry))
        .collect();

    let mut diff = CatalogDiff::default();
    let entries: Vec<CatalogEntry> = images
        .iter()
        .zip(extracted)
        .enumerate()
        .map(|(ordinal, (image, meta))| {
            let src = src_for(web_root, &gallery.folder, &image.file_name);
            let previous = by_src.get(src.as_str()).copied();
            let mut title = pick(meta.title, previous.map(|p| p.title.as_str()));
            if title.is_empty() {
                title = naming::fallback_title(&image.file_name);
            }
            let entry = CatalogEntry {
                id: previous
                    .map(|p| p.id.clone())
                    .unwrap_or_else(|| format!("{}-{minted_at}-{ordinal}", gallery.id_prefix)),
                title,
                src,
                description: pick(meta.description, previous.map(|p| p.description.as_str())),
                medium: pick(meta.medium, previous.map(|p| p.medium.as_str())),
                dimensions: pick(meta.dimensions, previous.map(|p| p.dimensions.as_str())),
            };

            match previous {
                None => diff.added.push(entry.src.clone()),
                Some(p) if *p != entry => diff.updated.push(entry.src.clone()),
                Some(_) => {}
            }
            entry
        })
        .collect();

    let current: HashSet<&str> = entries.iter().map(|e| e.src.as_str()).collect();
    diff.removed = prior_entries
        .iter()
        .filter(|p| !current.contains(p.src.as_str()))
        .map(|p| p.src.clone())
        .collect();

    // Entries are matched by `src`, so order alone is not a change.
    let changed = match prior {
        PriorCatalog::Missing | PriorCatalog::Unreadable => true,
        PriorCatalog::Present(prior_entries) => {
            !diff.is_empty() || prior_entries.len() != entries.len()
        }
    };

    Reconciliation {
        entries,
        changed,
        diff,
    }
}

/// Freshly extracted value when present, else the stored one.
fn pick(fresh: String, stored: Option<&str>) -> String {
    if fresh.is_empty() {
        stored.unwrap_or_default().to_string()
    } else {
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ImageMetadata;
    use crate::test_helpers::{ScriptedReader, gallery_config};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const WEB_ROOT: &str = "assets/images/";

    fn images(names: &[&str]) -> Vec<ImageFile> {
        names
            .iter()
            .map(|n| ImageFile {
                path: PathBuf::from("/gallery").join(n),
                file_name: n.to_string(),
            })
            .collect()
    }

    fn entry(id: &str, title: &str, src: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.into(),
            title: title.into(),
            src: src.into(),
            description: String::new(),
            medium: String::new(),
            dimensions: String::new(),
        }
    }

    // =========================================================================
    // src_for()
    // =========================================================================

    #[test]
    fn src_joins_root_folder_and_file() {
        assert_eq!(
            src_for("assets/images/", "oil-paintings", "a.jpg"),
            "assets/images/oil-paintings/a.jpg"
        );
        assert_eq!(src_for("assets/images", "oil", "a.jpg"), "assets/images/oil/a.jpg");
        assert_eq!(src_for("", "oil", "a.jpg"), "oil/a.jpg");
    }

    #[test]
    fn src_keeps_root_absolute_web_root() {
        assert_eq!(src_for("/", "encaustic", "a.jpg"), "/encaustic/a.jpg");
        assert_eq!(
            src_for("/assets/images/", "encaustic", "a.jpg"),
            "/assets/images/encaustic/a.jpg"
        );
    }

    // =========================================================================
    // reconcile()
    // =========================================================================

    #[test]
    fn new_files_get_minted_ids_and_fallback_titles() {
        let gallery = gallery_config("oil-paintings", "oil");
        let result = reconcile(
            &gallery,
            &images(&["blue-hour.jpg", "red_barn.png"]),
            &PriorCatalog::Missing,
            &ScriptedReader::default(),
            WEB_ROOT,
            1700,
        );

        assert!(result.changed);
        assert_eq!(
            result.entries,
            vec![
                entry(
                    "oil-1700-0",
                    "Blue Hour",
                    "assets/images/oil-paintings/blue-hour.jpg"
                ),
                entry(
                    "oil-1700-1",
                    "Red Barn",
                    "assets/images/oil-paintings/red_barn.png"
                ),
            ]
        );
        assert_eq!(result.diff.added.len(), 2);
    }

    #[test]
    fn extracted_metadata_fills_fields() {
        let gallery = gallery_config("drips", "drip");
        let reader = ScriptedReader::default().with(
            "/gallery/a.jpg",
            ImageMetadata {
                title: "Cascade".into(),
                medium: "Acrylic".into(),
                dimensions: "10 x 10".into(),
                description: "Poured".into(),
            },
        );
        let result = reconcile(
            &gallery,
            &images(&["a.jpg"]),
            &PriorCatalog::Missing,
            &reader,
            WEB_ROOT,
            1,
        );

        let e = &result.entries[0];
        assert_eq!(e.title, "Cascade");
        assert_eq!(e.medium, "Acrylic");
        assert_eq!(e.dimensions, "10 x 10");
        assert_eq!(e.description, "Poured");
    }

    #[test]
    fn unchanged_directory_is_idempotent() {
        let gallery = gallery_config("oil-paintings", "oil");
        let files = images(&["a.jpg", "b.jpg"]);
        let reader = ScriptedReader::default();
        let first = reconcile(&gallery, &files, &PriorCatalog::Missing, &reader, WEB_ROOT, 1);
        let second = reconcile(
            &gallery,
            &files,
            &PriorCatalog::Present(first.entries.clone()),
            &reader,
            WEB_ROOT,
            2,
        );

        assert!(!second.changed);
        assert_eq!(second.entries, first.entries);
        assert!(second.diff.is_empty());
    }

    #[test]
    fn metadata_edit_keeps_id_and_src() {
        let gallery = gallery_config("oil-paintings", "oil");
        let files = images(&["a.jpg"]);
        let first = reconcile(
            &gallery,
            &files,
            &PriorCatalog::Missing,
            &ScriptedReader::default(),
            WEB_ROOT,
            1,
        );

        let edited = ScriptedReader::default().with(
            "/gallery/a.jpg",
            ImageMetadata {
                title: "Corrected".into(),
                ..Default::default()
            },
        );
        let second = reconcile(
            &gallery,
            &files,
            &PriorCatalog::Present(first.entries.clone()),
            &edited,
            WEB_ROOT,
            2,
        );

        assert!(second.changed);
        assert_eq!(second.entries[0].id, first.entries[0].id);
        assert_eq!(second.entries[0].src, first.entries[0].src);
        assert_eq!(second.entries[0].title, "Corrected");
        assert_eq!(second.diff.updated, vec![first.entries[0].src.clone()]);
    }

    #[test]
    fn empty_metadata_keeps_stored_values() {
        let gallery = gallery_config("oil-paintings", "oil");
        let mut stored = entry("oil-1-0", "Hand Edited", "assets/images/oil-paintings/a.jpg");
        stored.medium = "Oil".into();
        let result = reconcile(
            &gallery,
            &images(&["a.jpg"]),
            &PriorCatalog::Present(vec![stored.clone()]),
            &ScriptedReader::default(),
            WEB_ROOT,
            9,
        );

        assert!(!result.changed);
        assert_eq!(result.entries, vec![stored]);
    }

    #[test]
    fn vanished_file_is_dropped() {
        let gallery = gallery_config("oil-paintings", "oil");
        let prior = PriorCatalog::Present(vec![
            entry("oil-1-0", "A", "assets/images/oil-paintings/a.jpg"),
            entry("oil-1-1", "B", "assets/images/oil-paintings/b.jpg"),
        ]);
        let result = reconcile(
            &gallery,
            &images(&["a.jpg"]),
            &prior,
            &ScriptedReader::default(),
            WEB_ROOT,
            2,
        );

        assert!(result.changed);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(
            result.diff.removed,
            vec!["assets/images/oil-paintings/b.jpg".to_string()]
        );
    }

    #[test]
    fn renamed_file_gets_new_identity() {
        let gallery = gallery_config("oil-paintings", "oil");
        let prior = PriorCatalog::Present(vec![entry(
            "oil-1-0",
            "A",
            "assets/images/oil-paintings/a.jpg",
        )]);
        let result = reconcile(
            &gallery,
            &images(&["z.jpg"]),
            &prior,
            &ScriptedReader::default(),
            WEB_ROOT,
            5,
        );

        assert_eq!(result.entries[0].id, "oil-5-0");
        assert_eq!(result.diff.added.len(), 1);
        assert_eq!(result.diff.removed.len(), 1);
    }

    #[test]
    fn empty_directory_with_missing_catalog_is_changed_once() {
        let gallery = gallery_config("oil-paintings", "oil");
        let reader = ScriptedReader::default();
        let first = reconcile(&gallery, &[], &PriorCatalog::Missing, &reader, WEB_ROOT, 1);
        assert!(first.changed);
        assert!(first.entries.is_empty());

        let second = reconcile(
            &gallery,
            &[],
            &PriorCatalog::Present(vec![]),
            &reader,
            WEB_ROOT,
            2,
        );
        assert!(!second.changed);
    }

    #[test]
    fn reordered_catalog_is_not_a_change() {
        let gallery = gallery_config("oil-paintings", "oil");
        let reader = ScriptedReader::default();
        let files = images(&["a.jpg", "b.jpg"]);
        let first = reconcile(&gallery, &files, &PriorCatalog::Missing, &reader, WEB_ROOT, 1);
        let mut reversed = first.entries.clone();
        reversed.reverse();

        let second = reconcile(
            &gallery,
            &files,
            &PriorCatalog::Present(reversed),
            &reader,
            WEB_ROOT,
            2,
        );

        assert!(!second.changed);
        assert!(second.diff.is_empty());
        assert_eq!(second.entries, first.entries);
    }

    #[test]
    fn duplicate_prior_entries_are_collapsed() {
        let gallery = gallery_config("oil-paintings", "oil");
        let stored = entry("oil-1-0", "A", "assets/images/oil-paintings/a.jpg");
        let result = reconcile(
            &gallery,
            &images(&["a.jpg"]),
            &PriorCatalog::Present(vec![stored.clone(), stored.clone()]),
            &ScriptedReader::default(),
            WEB_ROOT,
            2,
        );

        assert!(result.changed);
        assert_eq!(result.entries, vec![stored]);
    }

    #[test]
    fn unreadable_catalog_is_rewritten() {
        let gallery = gallery_config("oil-paintings", "oil");
        let result = reconcile(
            &gallery,
            &[],
            &PriorCatalog::Unreadable,
            &ScriptedReader::default(),
            WEB_ROOT,
            1,
        );
        assert!(result.changed);
    }

    // =========================================================================
    // load() / save()
    // =========================================================================

    #[test]
    fn save_writes_pretty_json_in_key_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("json-files").join("oil.json");
        save(&path, &[entry("oil-1-0", "A", "assets/images/oil/a.jpg")]).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "[\n  {\n    \"id\": \"oil-1-0\",\n    \"title\": \"A\",\n    \"src\": \"assets/images/oil/a.jpg\",\n    \"description\": \"\",\n    \"medium\": \"\",\n    \"dimensions\": \"\"\n  }\n]"
        );
    }

    #[test]
    fn save_empty_catalog() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.json");
        save(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        save(&path, &[]).unwrap();
        save(&path, &[entry("x", "X", "s")]).unwrap();
        let names: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn failed_write_leaves_previous_catalog_intact() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        save(&path, &[entry("oil-1-0", "A", "assets/images/oil/a.jpg")]).unwrap();
        let before = fs::read(&path).unwrap();

        let result = write_atomic(&path, |file| {
            file.write_all(b"[\n  {\n    \"id\": ")?;
            Err(io::Error::other("disk full").into())
        });

        assert!(matches!(result, Err(CatalogError::Io(_))));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_persist_is_reported_and_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        assert!(matches!(save(&path, &[]), Err(CatalogError::Persist(_))));
        assert_eq!(fs::read(path.join("keep")).unwrap(), b"x");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        let entries = vec![entry("oil-1-0", "A", "assets/images/oil/a.jpg")];
        save(&path, &entries).unwrap();
        assert_eq!(load(&path).unwrap(), PriorCatalog::Present(entries));
    }

    #[test]
    fn load_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            load(&tmp.path().join("none.json")).unwrap(),
            PriorCatalog::Missing
        );
    }

    #[test]
    fn load_corrupt_json_is_unreadable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load(&path).unwrap(), PriorCatalog::Unreadable);
    }

    #[test]
    fn load_tolerates_missing_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        fs::write(&path, r#"[{"id": "x", "src": "s", "title": "T"}]"#).unwrap();
        let prior = load(&path).unwrap();
        assert_eq!(prior.entries()[0].medium, "");
    }
}
