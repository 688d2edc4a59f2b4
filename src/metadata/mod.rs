//! Embedded image metadata and its mapping onto catalog fields.
//!
//! Artists caption their work in Lightroom/Bridge/Photoshop, which write IPTC
//! (and, for the description, sometimes only EXIF). Each catalog field has a
//! fixed fallback chain. The first non-empty value wins:
//!
//! | Field | Sources, in order |
//! |---|---|
//! | `title` | IPTC Headline (2:105) → IPTC Object Name (2:05) |
//! | `medium` | IPTC Credit (2:110) |
//! | `dimensions` | IPTC Source (2:115) |
//! | `description` | IPTC Special Instructions (2:40) → IPTC Caption-Abstract (2:120) → EXIF ImageDescription |
//!
//! Credit and Source are repurposed: the artist's workflow stores the medium
//! and the physical size of the piece there.
//!
//! IPTC is read from JPEG APP13 by the in-crate IIM parser. EXIF is read
//! with kamadak-exif, which understands JPEG, PNG and WebP containers.
//!
//! ## Failure handling
//!
//! Reading metadata is never allowed to fail a sync pass. [`extract`] turns
//! every [`MetadataError`] into an all-empty [`ImageMetadata`] and logs it at
//! info level; the reconciler then falls back to previously stored values or
//! to a title derived from the filename.
//!
//! The format-specific readers sit behind [`MetadataReader`] so tests (and a
//! future XMP reader) can swap them without touching the reconciler.

mod exif_reader;
mod iptc_parser;

use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),
    #[error("unsupported format: {0}")]
    Unsupported(String),
    #[error("no embedded metadata")]
    NoMetadata,
}

/// The four descriptive catalog fields read from one image.
///
/// Empty string means "not present"; the reconciler decides what to fall
/// back to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    pub title: String,
    pub medium: String,
    pub dimensions: String,
    pub description: String,
}

/// Reads descriptive metadata from an image file.
pub trait MetadataReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<ImageMetadata, MetadataError>;
}

/// Production reader: IPTC-IIM from JPEG, EXIF from JPEG, PNG and WebP.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedMetadataReader;

impl MetadataReader for EmbeddedMetadataReader {
    fn read(&self, path: &Path) -> Result<ImageMetadata, MetadataError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if !matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "webp") {
            return Err(MetadataError::Unsupported(ext));
        }

        let bytes = std::fs::read(path)?;
        let iptc = iptc_parser::read_iptc_from_jpeg(&bytes);
        let exif_description = match exif_reader::read_description(&bytes) {
            Ok(description) => description,
            // IPTC alone still yields fields.
            Err(e) if iptc.is_some() => {
                debug!(file = %path.display(), "ignoring unreadable EXIF: {e}");
                None
            }
            Err(e) => return Err(e.into()),
        };

        if iptc.is_none() && exif_description.is_none() {
            return Err(MetadataError::NoMetadata);
        }
        let iptc = iptc.unwrap_or_default();

        Ok(ImageMetadata {
            title: resolve(&[iptc.headline.as_deref(), iptc.object_name.as_deref()]),
            medium: resolve(&[iptc.credit.as_deref()]),
            dimensions: resolve(&[iptc.source.as_deref()]),
            description: resolve(&[
                iptc.special_instructions.as_deref(),
                iptc.caption.as_deref(),
                exif_description.as_deref(),
            ]),
        })
    }
}

/// Read metadata for one file, degrading to empty fields on any failure.
pub fn extract(reader: &dyn MetadataReader, path: &Path) -> ImageMetadata {
    match reader.read(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            info!(file = %path.display(), "metadata unavailable, using empty fields: {e}");
            ImageMetadata::default()
        }
    }
}

/// Resolve a metadata field from multiple sources.
///
/// Takes a list of optional values in priority order and returns the first
/// non-None, non-blank value, trimmed. Empty string when nothing qualifies.
pub fn resolve(sources: &[Option<&str>]) -> String {
    sources
        .iter()
        .filter_map(|opt| opt.map(str::trim).filter(|s| !s.is_empty()))
        .next()
        .map(String::from)
        .unwrap_or_default()
}

/// Iterate `(marker, payload)` of a JPEG's header segments, stopping at the
/// start of scan. Yields nothing for data that is not a JPEG.
pub(crate) fn jpeg_segments(data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut pos = if data.starts_with(&[0xFF, 0xD8]) {
        2
    } else {
        data.len()
    };

    std::iter::from_fn(move || {
        loop {
            if pos + 4 > data.len() || data[pos] != 0xFF {
                return None;
            }
            let marker = data[pos + 1];
            match marker {
                // Fill byte before a marker
                0xFF => pos += 1,
                // Start of scan / end of image: no more header segments
                0xDA | 0xD9 => return None,
                // Markers without a length field
                0x01 | 0xD0..=0xD7 => pos += 2,
                _ => {
                    let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                    if len < 2 {
                        return None;
                    }
                    let start = pos + 4;
                    let end = (pos + 2 + len).min(data.len());
                    pos += 2 + len;
                    return Some((marker, &data[start..end]));
                }
            }
        }
    })
}
