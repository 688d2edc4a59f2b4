//! Minimal IPTC-IIM parser for JPEG files.
//!
//! Extracts the Record 2 datasets the catalog cares about:
//! - Special Instructions (2:40)
//! - Object Name (2:05)
//! - Headline (2:105)
//! - Credit (2:110)
//! - Source (2:115)
//! - Caption-Abstract (2:120)
//!
//! Reads from the APP13 marker (Photoshop 8BIM resource 0x0404).

/// IPTC datasets extracted from an image file. Absent or blank datasets are
/// `None`; for repeated datasets the first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IptcRecord {
    pub object_name: Option<String>,
    pub special_instructions: Option<String>,
    pub headline: Option<String>,
    pub credit: Option<String>,
    pub source: Option<String>,
    pub caption: Option<String>,
}

impl IptcRecord {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

const DATASET_OBJECT_NAME: u8 = 5;
const DATASET_SPECIAL_INSTRUCTIONS: u8 = 40;
const DATASET_HEADLINE: u8 = 105;
const DATASET_CREDIT: u8 = 110;
const DATASET_SOURCE: u8 = 115;
const DATASET_CAPTION: u8 = 120;

/// Parse raw IPTC-IIM bytes.
///
/// IIM record format (each dataset):
///   Byte 0:    0x1C (tag marker)
///   Byte 1:    Record number (we want 0x02)
///   Byte 2:    Dataset number
///   Bytes 3-4: Data length (big-endian u16)
///   Bytes 5+:  Data (UTF-8/ASCII string)
pub(crate) fn parse_iptc_iim(data: &[u8]) -> IptcRecord {
    let mut result = IptcRecord::default();
    let mut pos = 0;

    while pos + 5 <= data.len() {
        if data[pos] != 0x1C {
            pos += 1;
            continue;
        }

        let record = data[pos + 1];
        let dataset = data[pos + 2];
        let length = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as usize;
        pos += 5;

        if pos + length > data.len() {
            break;
        }

        if record == 2 {
            let value = String::from_utf8_lossy(&data[pos..pos + length])
                .trim()
                .to_string();

            let slot = match dataset {
                DATASET_OBJECT_NAME => Some(&mut result.object_name),
                DATASET_SPECIAL_INSTRUCTIONS => Some(&mut result.special_instructions),
                DATASET_HEADLINE => Some(&mut result.headline),
                DATASET_CREDIT => Some(&mut result.credit),
                DATASET_SOURCE => Some(&mut result.source),
                DATASET_CAPTION => Some(&mut result.caption),
                _ => None,
            };
            if let Some(slot) = slot
                && slot.is_none()
                && !value.is_empty()
            {
                *slot = Some(value);
            }
        }

        pos += length;
    }

    result
}

// ---------------------------------------------------------------------------
// JPEG: extract IPTC from APP13 / Photoshop 8BIM
// ---------------------------------------------------------------------------

/// IPTC record from a JPEG's APP13 segment, `None` when there is none.
pub(crate) fn read_iptc_from_jpeg(data: &[u8]) -> Option<IptcRecord> {
    let iptc_bytes = super::jpeg_segments(data)
        .filter(|(marker, _)| *marker == 0xED)
        .find_map(|(_, segment)| extract_iptc_from_8bim(segment))?;
    let record = parse_iptc_iim(iptc_bytes);
    (!record.is_empty()).then_some(record)
}

const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const BIM_MARKER: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;

/// Extract IPTC-IIM bytes from a Photoshop 8BIM resource block.
///
/// Input: segment data after the JPEG marker header, starting with
/// "Photoshop 3.0\0" or directly with "8BIM" entries.
fn extract_iptc_from_8bim(segment: &[u8]) -> Option<&[u8]> {
    let data = segment.strip_prefix(PHOTOSHOP_HEADER).unwrap_or(segment);

    let mut pos = 0;
    while pos + 12 <= data.len() {
        // "8BIM" (4) + resource_id (2) + pascal_string + data_len (4) + data
        if &data[pos..pos + 4] != BIM_MARKER {
            pos += 1;
            continue;
        }
        pos += 4;

        let resource_id = u16::from_be_bytes([data[pos], data[pos + 1]]);
        pos += 2;

        // Pascal string: 1 byte length + string, padded to even total
        let pascal_len = data[pos] as usize;
        pos += 1 + pascal_len + ((1 + pascal_len) % 2);

        if pos + 4 > data.len() {
            break;
        }
        let res_len =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        pos += 4;

        if pos + res_len > data.len() {
            break;
        }

        if resource_id == IPTC_RESOURCE_ID {
            return Some(&data[pos..pos + res_len]);
        }

        // Advance past data, padded to even
        pos += res_len + (res_len % 2);
    }

    None
}
