//! JPEG tables reattachment.
//!
//! JPEG-compressed TIFFs keep the quantization and Huffman tables of an image
//! once, in its `JPEGTables` tag, and store only scan data per tile. Handing a
//! tile out as a standalone JPEG means splicing the two together:
//!
//! ```text
//! JPEGTables:  SOI  DQT DHT ...  EOI
//! tile:        SOI  SOS <scan>   EOI
//! merged:      SOI  DQT DHT ...  SOS <scan>  EOI
//! ```

use bytes::{Bytes, BytesMut};

/// Start of image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End of image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Splice `tables` in front of the scan data of `tile`.
///
/// The trailing EOI of the tables and the leading SOI of the tile are dropped.
/// The stream always comes back framed by exactly one SOI and one EOI, even
/// when either input was stored without its markers. An empty tile stays empty.
pub fn merge_jpeg_tables(tables: &[u8], tile: &[u8]) -> Bytes {
    if tile.is_empty() {
        return Bytes::new();
    }

    let header = tables.strip_suffix(&EOI[..]).unwrap_or(tables);
    let scan = tile.strip_prefix(&SOI[..]).unwrap_or(tile);

    let mut merged = BytesMut::with_capacity(SOI.len() + header.len() + scan.len() + EOI.len());
    if !header.starts_with(&SOI) {
        merged.extend_from_slice(&SOI);
    }
    merged.extend_from_slice(header);
    merged.extend_from_slice(scan);
    if !merged.ends_with(&EOI) {
        merged.extend_from_slice(&EOI);
    }
    merged.freeze()
}
