//! EXIF `ImageDescription` (IFD0) via kamadak-exif.
//!
//! The only EXIF field the catalog reads; it is the last resort for the
//! description after the IPTC fields. `read_from_container` detects the
//! container (JPEG APP1, PNG `eXIf`, WebP `EXIF` chunk) from the bytes.

use exif::{In, Reader, Tag, Value};
use std::io::Cursor;

/// `ImageDescription` from an image file's EXIF block.
///
/// `Ok(None)` when the file has no EXIF, no description, or a blank one.
pub(crate) fn read_description(data: &[u8]) -> Result<Option<String>, exif::Error> {
    let exif = match Reader::new().read_from_container(&mut Cursor::new(data)) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_) | exif::Error::BlankValue(_)) => return Ok(None),
        Err(e) => return Err(e),
    };

    Ok(exif
        .get_field(Tag::ImageDescription, In::PRIMARY)
        .and_then(|field| match &field.value {
            Value::Ascii(parts) => parts.first().map(|p| String::from_utf8_lossy(p).into_owned()),
            _ => None,
        })
        .map(|text| {
            text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string()
        })
        .filter(|text| !text.is_empty()))
}
