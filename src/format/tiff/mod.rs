//! TIFF and BigTIFF structure.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values must be read respecting this order.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets (max 4GB files),
//!   while BigTIFF uses 64-bit offsets. The parser handles both transparently.
//!
//! - **IFD (Image File Directory)**: One per image. A COG holds the full resolution
//!   image first, followed by its overviews.
//!
//! - **Inline vs offset values**: Small values are stored inline in the IFD entry,
//!   larger values are stored at an offset and only fetched when asked for.

mod document;
mod image;
mod parser;
mod tag;
mod tags;
mod values;

pub use crate::io::ByteOrder;
pub use document::CogTiff;
pub use image::{BoundingBox, CogImage, Size, TileBounds, TileCount, TileData};
pub use parser::{
    parse_entry, read_header, read_ifd, read_ifds, Ifd, TiffHeader, TiffVersion,
    BIGTIFF_HEADER_SIZE, MAX_IFDS, TIFF_HEADER_SIZE,
};
pub use tag::{Tag, TagData};
pub use tags::{tag_name, Compression, FieldType, TiffTag};
pub use values::{decode_unknown, decode_value, encode_value, TagValue};
