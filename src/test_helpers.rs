//! Shared test utilities for the gallery-sync test suite.
//!
//! Provides synthetic image payloads (TIFF structures, IPTC-IIM blocks,
//! JPEGs and PNGs carrying them), a temp-dir project fixture, and scripted
//! stand-ins for the [`MetadataReader`] and [`Publisher`] capabilities.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let fixture = GalleryFixture::new(&[("oil-paintings", "oil")]);
//! fixture.add_image("oil-paintings", "Harbor.JPG");
//!
//! let jpeg = jpeg_with_app13(&iim(&[(105, "Harbor at Dusk")]));
//! fixture.write_image("oil-paintings", "harbor.jpg", &jpeg);
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use crate::config::GalleryConfig;
use crate::metadata::{ImageMetadata, MetadataError, MetadataReader};
use crate::publish::{Ack, PublishError, Publisher};

// =========================================================================
// Fixture setup
// =========================================================================

/// A throwaway project root with gallery directories under
/// `assets/images/<folder>` and catalogs at `json-files/<folder>.json`.
pub struct GalleryFixture {
    _tmp: TempDir,
    pub root: PathBuf,
    pub galleries: Vec<GalleryConfig>,
}

impl GalleryFixture {
    /// Create the gallery directories (catalogs are left missing).
    pub fn new(galleries: &[(&str, &str)]) -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        let galleries = galleries
            .iter()
            .map(|(folder, prefix)| {
                let directory = root.join("assets/images").join(folder);
                std::fs::create_dir_all(&directory).unwrap();
                GalleryConfig {
                    folder: folder.to_string(),
                    directory,
                    catalog_path: root.join("json-files").join(format!("{folder}.json")),
                    id_prefix: prefix.to_string(),
                }
            })
            .collect();
        Self {
            _tmp: tmp,
            root,
            galleries,
        }
    }

    fn gallery(&self, folder: &str) -> &GalleryConfig {
        self.galleries
            .iter()
            .find(|g| g.folder == folder)
            .unwrap_or_else(|| panic!("gallery '{folder}' not in fixture"))
    }

    pub fn image_path(&self, folder: &str, name: &str) -> PathBuf {
        self.gallery(folder).directory.join(name)
    }

    /// Write a placeholder image without embedded metadata.
    pub fn add_image(&self, folder: &str, name: &str) -> PathBuf {
        self.write_image(folder, name, &[0xFF, 0xD8, 0xFF, 0xD9])
    }

    pub fn write_image(&self, folder: &str, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.image_path(folder, name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    pub fn catalog(&self, folder: &str) -> PathBuf {
        self.gallery(folder).catalog_path.clone()
    }
}

/// A standalone gallery config for reconciler tests.
pub fn gallery_config(folder: &str, id_prefix: &str) -> GalleryConfig {
    GalleryConfig {
        folder: folder.to_string(),
        directory: PathBuf::from("/gallery"),
        catalog_path: PathBuf::from(format!("/json-files/{folder}.json")),
        id_prefix: id_prefix.to_string(),
    }
}

// =========================================================================
// Scripted capabilities
// =========================================================================

/// Returns canned metadata per path and "no metadata" for everything else.
#[derive(Default)]
pub struct ScriptedReader {
    by_path: HashMap<PathBuf, ImageMetadata>,
    reads: AtomicUsize,
}

impl ScriptedReader {
    pub fn with(mut self, path: impl AsRef<Path>, metadata: ImageMetadata) -> Self {
        self.by_path.insert(path.as_ref().to_path_buf(), metadata);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl MetadataReader for ScriptedReader {
    fn read(&self, path: &Path) -> Result<ImageMetadata, MetadataError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.by_path
            .get(path)
            .cloned()
            .ok_or(MetadataError::NoMetadata)
    }
}

/// Records every summary it is asked to publish. The first `failures`
/// calls fail as a rejected push.
#[derive(Default)]
pub struct RecordingPublisher {
    summaries: Mutex<Vec<String>>,
    failures: AtomicUsize,
}

impl RecordingPublisher {
    pub fn failing(failures: usize) -> Self {
        Self {
            summaries: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(failures),
        }
    }

    pub fn summaries(&self) -> Vec<String> {
        self.summaries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, summary: &str) -> Result<Ack, PublishError> {
        self.summaries.lock().unwrap().push(summary.to_string());
        let should_fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(PublishError::Failed {
                step: "push",
                status: "exit status: 1".into(),
                stderr: "rejected".into(),
            });
        }
        Ok(Ack {
            message: format!("Gallery Update: {summary}"),
            committed: true,
        })
    }
}

// =========================================================================
// Synthetic image payloads
// =========================================================================

/// Builds a single-IFD TIFF structure. Values longer than four bytes are
/// stored after the IFD in insertion order.
pub struct TiffBuilder {
    big_endian: bool,
    entries: Vec<(u16, u16, Vec<u8>)>,
}

impl TiffBuilder {
    pub fn little_endian() -> Self {
        Self {
            big_endian: false,
            entries: Vec::new(),
        }
    }

    pub fn big_endian() -> Self {
        Self {
            big_endian: true,
            entries: Vec::new(),
        }
    }

    /// NUL-terminated ASCII entry (type 2).
    pub fn ascii(mut self, tag: u16, text: &str) -> Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.entries.push((tag, 2, bytes));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let u16_bytes = |v: u16| {
            if self.big_endian {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            }
        };
        let u32_bytes = |v: u32| {
            if self.big_endian {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            }
        };

        let mut out = Vec::new();
        out.extend_from_slice(if self.big_endian { b"MM" } else { b"II" });
        out.extend_from_slice(&u16_bytes(42));
        out.extend_from_slice(&u32_bytes(8));

        let data_start = 8 + 2 + 12 * self.entries.len() + 4;
        let mut extra = Vec::new();

        out.extend_from_slice(&u16_bytes(self.entries.len() as u16));
        for (tag, typ, bytes) in &self.entries {
            out.extend_from_slice(&u16_bytes(*tag));
            out.extend_from_slice(&u16_bytes(*typ));
            out.extend_from_slice(&u32_bytes(bytes.len() as u32));
            if bytes.len() <= 4 {
                let mut field = [0u8; 4];
                field[..bytes.len()].copy_from_slice(bytes);
                out.extend_from_slice(&field);
            } else {
                out.extend_from_slice(&u32_bytes((data_start + extra.len()) as u32));
                extra.extend_from_slice(bytes);
                if extra.len() % 2 == 1 {
                    extra.push(0);
                }
            }
        }
        out.extend_from_slice(&u32_bytes(0));
        out.extend_from_slice(&extra);
        out
    }
}

/// Raw IPTC-IIM bytes: one record 2 dataset per `(dataset, value)`.
pub fn iim(datasets: &[(u8, &str)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (dataset, value) in datasets {
        out.extend_from_slice(&[0x1C, 0x02, *dataset]);
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(value.as_bytes());
    }
    out
}

/// Minimal JPEG whose APP13 segment carries `iptc` as 8BIM resource 0x0404.
pub fn jpeg_with_app13(iptc: &[u8]) -> Vec<u8> {
    let mut payload = b"Photoshop 3.0\0".to_vec();
    payload.extend_from_slice(b"8BIM");
    payload.extend_from_slice(&0x0404u16.to_be_bytes());
    payload.extend_from_slice(&[0x00, 0x00]); // empty pascal name, padded
    payload.extend_from_slice(&(iptc.len() as u32).to_be_bytes());
    payload.extend_from_slice(iptc);
    if iptc.len() % 2 == 1 {
        payload.push(0);
    }
    jpeg_with_segment(0xED, &payload)
}

/// Minimal JPEG whose APP1 segment carries `tiff` as EXIF.
pub fn jpeg_with_app1_exif(tiff: &[u8]) -> Vec<u8> {
    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(tiff);
    jpeg_with_segment(0xE1, &payload)
}

/// Minimal PNG carrying `tiff` in an `eXIf` chunk. CRCs are left zeroed.
pub fn png_with_exif(tiff: &[u8]) -> Vec<u8> {
    let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
    for (kind, data) in [(b"eXIf", tiff), (b"IEND", &[][..])] {
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(data);
        out.extend_from_slice(&[0, 0, 0, 0]);
    }
    out
}

fn jpeg_with_segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8, 0xFF, marker];
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xD9]);
    out
}
