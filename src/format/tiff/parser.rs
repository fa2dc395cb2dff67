//! TIFF header and directory chain parsing.
//!
//! # TIFF Header Structure
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (43 = 0x002B)
//! Bytes 4-5: Offset byte size (must be 8)
//! Bytes 6-7: Reserved (must be 0)
//! Bytes 8-15: Offset to first IFD (8 bytes)
//! ```
//!
//! # IFD Structure
//!
//! ```text
//! entry count            2 bytes (classic) / 8 bytes (BigTIFF)
//! entries                12 bytes each     / 20 bytes each
//!   tag id               2
//!   field type           2
//!   value count          4                 / 8
//!   value or offset      4                 / 8
//! next IFD offset        4 bytes           / 8 bytes, 0 ends the chain
//! ```

use std::collections::{BTreeMap, HashSet};

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use super::tag::Tag;
use super::tags::FieldType;
use super::values::{decode_unknown, decode_value};
use crate::error::TiffError;
use crate::io::{ByteOrder, ChunkedSource};

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

/// Longest IFD chain accepted before the file is treated as corrupt.
pub const MAX_IFDS: usize = 1024;

/// Largest entry count accepted for a single IFD.
const MAX_IFD_ENTRIES: u64 = 1 << 20;

// =============================================================================
// TiffVersion
// =============================================================================

/// TIFF flavour, by its version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u16)]
pub enum TiffVersion {
    /// Classic TIFF, 32-bit offsets
    Tiff = 42,
    /// BigTIFF, 64-bit offsets
    BigTiff = 43,
}

impl TiffVersion {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            42 => Some(TiffVersion::Tiff),
            43 => Some(TiffVersion::BigTiff),
            _ => None,
        }
    }

    /// Numeric version code.
    #[inline]
    pub const fn code(self) -> u16 {
        self as u16
    }

    pub const fn name(self) -> &'static str {
        match self {
            TiffVersion::Tiff => "TIFF",
            TiffVersion::BigTiff => "BigTIFF",
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
///
/// Contains the essential information needed to begin parsing IFDs:
/// - Byte order for reading all subsequent values
/// - Whether this is classic TIFF or BigTIFF (affects entry sizes and offset widths)
/// - Location of the first IFD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Whether this is a BigTIFF file (64-bit offsets)
    pub is_bigtiff: bool,

    /// Offset to the first IFD in the file
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from raw bytes.
    ///
    /// The input must contain at least 8 bytes for classic TIFF or 16 bytes for BigTIFF.
    /// When `file_size` is known the first IFD offset is checked against it.
    ///
    /// # Errors
    /// - `InvalidMagic` if byte order bytes are not II or MM
    /// - `InvalidVersion` if version is not 42 or 43
    /// - `InvalidBigTiffOffsetSize` if BigTIFF offset size is not 8
    /// - `FileTooSmall` if there aren't enough bytes for the header
    /// - `InvalidIfdOffset` if the first IFD offset is zero or outside the file
    pub fn parse(bytes: &[u8], file_size: Option<u64>) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        // Checked as a fixed byte pattern, independent of the byte order it declares
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        let version = byte_order.read_u16(&bytes[2..4]);
        let (is_bigtiff, first_ifd_offset) = match TiffVersion::from_u16(version) {
            Some(TiffVersion::Tiff) => (false, byte_order.read_u32(&bytes[4..8]) as u64),
            Some(TiffVersion::BigTiff) => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }

                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }

                // Bytes 6-7 are reserved and not checked
                (true, byte_order.read_u64(&bytes[8..16]))
            }
            None => return Err(TiffError::InvalidVersion(version)),
        };

        if first_ifd_offset == 0 || file_size.is_some_and(|size| first_ifd_offset >= size) {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// Version of the file.
    #[inline]
    pub const fn version(&self) -> TiffVersion {
        if self.is_bigtiff {
            TiffVersion::BigTiff
        } else {
            TiffVersion::Tiff
        }
    }

    /// Size of the header in bytes.
    #[inline]
    pub const fn header_size(&self) -> usize {
        if self.is_bigtiff {
            BIGTIFF_HEADER_SIZE
        } else {
            TIFF_HEADER_SIZE
        }
    }

    /// Size of an IFD entry in bytes.
    ///
    /// Classic TIFF: 12 bytes (2 tag + 2 type + 4 count + 4 value/offset)
    /// BigTIFF: 20 bytes (2 tag + 2 type + 8 count + 8 value/offset)
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count field at the start of an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of the next IFD offset field at the end of an IFD.
    #[inline]
    pub const fn ifd_next_offset_size(&self) -> usize {
        self.value_offset_size()
    }

    /// Size of the value/offset field in an IFD entry.
    ///
    /// This is also the inline value threshold: 4 bytes classic, 8 bytes BigTIFF.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }
}

// =============================================================================
// IFD Parsing
// =============================================================================

/// One parsed image file directory.
#[derive(Debug)]
pub struct Ifd {
    /// Position in the IFD chain
    pub index: usize,
    /// File offset of the directory
    pub offset: u64,
    /// Entries keyed by tag id
    pub tags: BTreeMap<u16, Tag>,
}

/// Read and parse the file header.
pub async fn read_header(source: &ChunkedSource) -> Result<TiffHeader, TiffError> {
    let wanted = source
        .size()
        .map_or(BIGTIFF_HEADER_SIZE as u64, |size| {
            size.min(BIGTIFF_HEADER_SIZE as u64)
        });
    if wanted < TIFF_HEADER_SIZE as u64 {
        return Err(TiffError::FileTooSmall {
            required: TIFF_HEADER_SIZE as u64,
            actual: wanted,
        });
    }

    source.ensure_loaded(0, wanted).await?;
    let bytes = source
        .bytes(0, wanted)
        .or_else(|_| source.bytes(0, TIFF_HEADER_SIZE as u64))?;
    TiffHeader::parse(&bytes, source.size())
}

/// Decode one raw IFD entry.
///
/// Values that fit in the entry's value field are decoded immediately; larger
/// ones become offset tags. Fails with `UnknownFieldType` for type codes this
/// reader does not know.
pub fn parse_entry(entry: &[u8], header: &TiffHeader) -> Result<Tag, TiffError> {
    let order = header.byte_order;
    let id = order.read_u16(&entry[0..2]);
    let field_type_raw = order.read_u16(&entry[2..4]);
    let (count, value_field) = if header.is_bigtiff {
        (order.read_u64(&entry[4..12]), &entry[12..20])
    } else {
        (order.read_u32(&entry[4..8]) as u64, &entry[8..12])
    };

    let field_type =
        FieldType::from_u16(field_type_raw).ok_or(TiffError::UnknownFieldType(field_type_raw))?;

    let Some(size) = field_type.byte_size(count) else {
        warn!(tag = id, count, "Tag value size overflows, keeping raw bytes");
        return Ok(Tag::inline(
            id,
            field_type_raw,
            count,
            order,
            decode_unknown(field_type_raw, Bytes::copy_from_slice(value_field)),
        ));
    };

    if field_type.fits_inline(count, header.is_bigtiff) {
        let raw = Bytes::copy_from_slice(&value_field[..size as usize]);
        return Ok(Tag::inline(
            id,
            field_type_raw,
            count,
            order,
            decode_value(&raw, field_type, order),
        ));
    }

    let offset = order.read_uint(value_field);
    Ok(Tag::offset(id, field_type, count, order, offset))
}

/// Read the IFD at `offset`, returning its tags and the next IFD offset.
pub async fn read_ifd(
    source: &ChunkedSource,
    header: &TiffHeader,
    offset: u64,
) -> Result<(BTreeMap<u16, Tag>, u64), TiffError> {
    let order = header.byte_order;
    let count_size = header.ifd_count_size() as u64;
    let entry_size = header.ifd_entry_size() as u64;
    let next_size = header.ifd_next_offset_size() as u64;

    let invalid = || TiffError::InvalidIfdOffset(offset);
    let entries_start = offset.checked_add(count_size).ok_or_else(invalid)?;
    if source.size().is_some_and(|size| entries_start > size) {
        return Err(invalid());
    }
    source.ensure_loaded(offset, count_size).await?;
    let entry_count = source.uint(offset, count_size as usize, order)?;
    if entry_count > MAX_IFD_ENTRIES {
        return Err(invalid());
    }

    let block_len = entry_count * entry_size + next_size;
    let block_end = entries_start.checked_add(block_len).ok_or_else(invalid)?;
    if source.size().is_some_and(|size| block_end > size) {
        return Err(invalid());
    }

    let block = source.read(entries_start, block_len).await?;
    let mut tags = BTreeMap::new();
    for entry in block.chunks_exact(entry_size as usize) {
        let tag = match parse_entry(entry, header) {
            Ok(tag) => tag,
            Err(TiffError::UnknownFieldType(field_type)) => {
                let id = order.read_u16(&entry[0..2]);
                warn!(tag = id, field_type, "Unknown field type, keeping raw bytes");
                let value_field = &entry[entry.len() - header.value_offset_size()..];
                let count = if header.is_bigtiff {
                    order.read_u64(&entry[4..12])
                } else {
                    order.read_u32(&entry[4..8]) as u64
                };
                Tag::inline(
                    id,
                    field_type,
                    count,
                    order,
                    decode_unknown(field_type, Bytes::copy_from_slice(value_field)),
                )
            }
            Err(e) => return Err(e),
        };
        // A repeated id replaces the earlier entry
        tags.insert(tag.id, tag);
    }

    let next_offset = order.read_uint(&block[block.len() - next_size as usize..]);
    Ok((tags, next_offset))
}

/// Walk the IFD chain starting at the header's first IFD.
///
/// Fails with `TooManyIfds` past [`MAX_IFDS`] directories and with `IfdCycle`
/// when a next-IFD offset points back to a directory already read.
pub async fn read_ifds(source: &ChunkedSource, header: &TiffHeader) -> Result<Vec<Ifd>, TiffError> {
    let mut ifds = Vec::new();
    let mut visited = HashSet::new();
    let mut offset = header.first_ifd_offset;

    while offset != 0 {
        if ifds.len() >= MAX_IFDS {
            return Err(TiffError::TooManyIfds(MAX_IFDS));
        }
        if !visited.insert(offset) {
            return Err(TiffError::IfdCycle(offset));
        }

        let (tags, next_offset) = read_ifd(source, header, offset).await?;
        debug!(index = ifds.len(), offset, entries = tags.len(), "Parsed IFD");

        ifds.push(Ifd {
            index: ifds.len(),
            offset,
            tags,
        });
        offset = next_offset;
    }

    Ok(ifds)
}

// =============================================================================
// Tests
// =============================================================================
