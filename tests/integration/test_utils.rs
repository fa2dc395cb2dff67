//! Test utilities for integration tests.
//!
//! Provides a request tracking reader and a builder that lays out small
//! TIFF and BigTIFF files in either byte order, with optional GDAL ghost
//! area and tile leaders.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use cog_inspect::error::IoError;
use cog_inspect::io::{ChunkConfig, RangeReader};
use cog_inspect::{ByteOrder, CogTiff};

// =============================================================================
// Tracking Reader
// =============================================================================

/// Range reader over a byte buffer that records every request.
#[derive(Clone)]
pub struct TrackingMockReader {
    data: Bytes,
    identifier: String,
    request_count: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<(u64, usize)>>>,
}

impl TrackingMockReader {
    pub fn new(data: Vec<u8>, identifier: &str) -> Self {
        Self {
            data: Bytes::from(data),
            identifier: identifier.to_string(),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Requests served so far as `(offset, length)`.
    pub async fn get_requests(&self) -> Vec<(u64, usize)> {
        self.requests.read().await.clone()
    }

    pub async fn reset_tracking(&self) {
        self.request_count.store(0, Ordering::SeqCst);
        self.requests.write().await.clear();
    }
}

#[async_trait]
impl RangeReader for TrackingMockReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push((offset, len));

        let size = self.data.len() as u64;
        if offset + len as u64 > size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size,
            });
        }

        let start = offset as usize;
        Ok(self.data.slice(start..start + len))
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Open `data` through a tracking reader with small chunks.
pub async fn open_tracked(data: Vec<u8>, chunk_size: usize) -> (TrackingMockReader, CogTiff) {
    let reader = TrackingMockReader::new(data, "mock://test.tif");
    let tiff = CogTiff::open(
        Arc::new(reader.clone()),
        ChunkConfig {
            chunk_size,
            max_chunks_per_request: 32,
        },
    )
    .await
    .unwrap();
    (reader, tiff)
}

// =============================================================================
// TIFF Builder
// =============================================================================

pub const SHORT: u16 = 3;
pub const LONG: u16 = 4;
pub const DOUBLE: u16 = 12;
pub const ASCII: u16 = 2;
pub const UNDEFINED: u16 = 7;
pub const LONG8: u16 = 16;

/// Values of one tag, written inline or out of line depending on size.
#[derive(Clone, Debug)]
pub enum Value {
    Short(Vec<u16>),
    Long(Vec<u32>),
    Double(Vec<f64>),
    Ascii(String),
    Undefined(Vec<u8>),
    /// Offsets of the image's tiles or strips, filled in by the builder
    TileOffsets,
    /// Byte counts of the image's tiles or strips, filled in by the builder
    TileByteCounts,
}

/// An image (IFD) under construction.
#[derive(Clone, Debug, Default)]
pub struct ImageBuilder {
    entries: Vec<(u16, Value)>,
    tiles: Vec<Option<Vec<u8>>>,
}

impl ImageBuilder {
    /// A tiled image with the given payloads in row-major order.
    ///
    /// `None` tiles are sparse and get offset and byte count 0.
    pub fn tiled(
        width: u32,
        height: u32,
        tile_size: u32,
        compression: u16,
        tiles: Vec<Option<Vec<u8>>>,
    ) -> Self {
        Self {
            entries: Vec::new(),
            tiles,
        }
        .tag(256, Value::Long(vec![width]))
        .tag(257, Value::Long(vec![height]))
        .tag(258, Value::Short(vec![8]))
        .tag(259, Value::Short(vec![compression]))
        .tag(277, Value::Short(vec![1]))
        .tag(322, Value::Short(vec![tile_size as u16]))
        .tag(323, Value::Short(vec![tile_size as u16]))
        .tag(324, Value::TileOffsets)
        .tag(325, Value::TileByteCounts)
    }

    /// A strip organized image with the given strip payloads.
    pub fn striped(
        width: u32,
        height: u32,
        rows_per_strip: u32,
        compression: u16,
        strips: Vec<Option<Vec<u8>>>,
    ) -> Self {
        Self {
            entries: Vec::new(),
            tiles: strips,
        }
        .tag(256, Value::Long(vec![width]))
        .tag(257, Value::Long(vec![height]))
        .tag(259, Value::Short(vec![compression]))
        .tag(273, Value::TileOffsets)
        .tag(278, Value::Long(vec![rows_per_strip]))
        .tag(279, Value::TileByteCounts)
    }

    /// Add or replace a tag.
    pub fn tag(mut self, id: u16, value: Value) -> Self {
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.push((id, value));
        self
    }

    /// Mark as a reduced resolution overview.
    pub fn overview(self) -> Self {
        self.tag(254, Value::Long(vec![1]))
    }

    /// Attach a pixel scale and a tie point mapping pixel (0, 0) to `origin`.
    pub fn geo(self, origin: [f64; 2], scale: [f64; 2]) -> Self {
        self.tag(33550, Value::Double(vec![scale[0], scale[1], 0.0]))
            .tag(
                33922,
                Value::Double(vec![0.0, 0.0, 0.0, origin[0], origin[1], 0.0]),
            )
    }
}

/// Lays out a complete file: header, optional ghost area, every IFD with
/// its out-of-line values, then tile data.
#[derive(Clone, Debug)]
pub struct TiffBuilder {
    byte_order: ByteOrder,
    big_tiff: bool,
    ghost: Option<String>,
    leaders: bool,
    images: Vec<ImageBuilder>,
}

impl TiffBuilder {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrder::LittleEndian,
            big_tiff: false,
            ghost: None,
            leaders: false,
            images: Vec::new(),
        }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_bigtiff(mut self, big_tiff: bool) -> Self {
        self.big_tiff = big_tiff;
        self
    }

    /// Write a GDAL ghost area holding `options` (newline separated `KEY=VALUE`).
    pub fn with_ghost(mut self, options: &str) -> Self {
        self.ghost = Some(options.to_string());
        self
    }

    /// Store a 4 byte little-endian length in front of every tile.
    pub fn with_leaders(mut self, leaders: bool) -> Self {
        self.leaders = leaders;
        self
    }

    pub fn add_image(mut self, image: ImageBuilder) -> Self {
        self.images.push(image);
        self
    }

    fn header_size(&self) -> u64 {
        if self.big_tiff {
            16
        } else {
            8
        }
    }

    fn inline_size(&self) -> usize {
        if self.big_tiff {
            8
        } else {
            4
        }
    }

    fn ghost_bytes(&self) -> Vec<u8> {
        match &self.ghost {
            Some(options) => {
                let mut body = options.to_string();
                if !body.ends_with('\n') {
                    body.push('\n');
                }
                let mut data =
                    format!("GDAL_STRUCTURAL_METADATA_SIZE={:06} bytes\n", body.len()).into_bytes();
                data.extend_from_slice(body.as_bytes());
                data
            }
            None => Vec::new(),
        }
    }

    fn ifd_size(&self, entries: usize) -> u64 {
        if self.big_tiff {
            8 + entries as u64 * 20 + 8
        } else {
            2 + entries as u64 * 12 + 4
        }
    }

    /// Field type and encoded size of a value.
    fn value_layout(&self, value: &Value, tile_count: usize) -> (u16, u64, usize) {
        let offsets_type = if self.big_tiff { LONG8 } else { LONG };
        let offsets_width = if self.big_tiff { 8 } else { 4 };
        match value {
            Value::Short(v) => (SHORT, v.len() as u64, v.len() * 2),
            Value::Long(v) => (LONG, v.len() as u64, v.len() * 4),
            Value::Double(v) => (DOUBLE, v.len() as u64, v.len() * 8),
            Value::Ascii(s) => (ASCII, s.len() as u64 + 1, s.len() + 1),
            Value::Undefined(v) => (UNDEFINED, v.len() as u64, v.len()),
            Value::TileOffsets | Value::TileByteCounts => {
                (offsets_type, tile_count as u64, tile_count * offsets_width)
            }
        }
    }

    fn encode(&self, value: &Value, tiles: &[(u64, u64)]) -> Vec<u8> {
        let mut out = Vec::new();
        let offsets_wide = self.big_tiff;
        match value {
            Value::Short(v) => v.iter().for_each(|&x| self.put(&mut out, x as u64, 2)),
            Value::Long(v) => v.iter().for_each(|&x| self.put(&mut out, x as u64, 4)),
            Value::Double(v) => v.iter().for_each(|&x| self.put(&mut out, x.to_bits(), 8)),
            Value::Ascii(s) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            Value::Undefined(v) => out.extend_from_slice(v),
            Value::TileOffsets | Value::TileByteCounts => {
                let width = if offsets_wide { 8 } else { 4 };
                for &(offset, count) in tiles {
                    let x = if matches!(value, Value::TileOffsets) {
                        offset
                    } else {
                        count
                    };
                    self.put(&mut out, x, width);
                }
            }
        }
        out
    }

    fn put(&self, out: &mut Vec<u8>, value: u64, width: usize) {
        let bytes = match self.byte_order {
            ByteOrder::LittleEndian => value.to_le_bytes()[..width].to_vec(),
            ByteOrder::BigEndian => value.to_be_bytes()[8 - width..].to_vec(),
        };
        out.extend_from_slice(&bytes);
    }

    /// Build the file bytes.
    pub fn build(self) -> Vec<u8> {
        let ghost = self.ghost_bytes();
        let inline = self.inline_size();

        // First pass: where every IFD and out-of-line value goes
        let mut position = self.header_size() + ghost.len() as u64;
        let mut ifd_offsets = Vec::with_capacity(self.images.len());
        let mut value_offsets: Vec<Vec<Option<u64>>> = Vec::with_capacity(self.images.len());
        for image in &self.images {
            ifd_offsets.push(position);
            position += self.ifd_size(image.entries.len());
            let mut offsets = Vec::with_capacity(image.entries.len());
            for (_, value) in sorted(&image.entries) {
                let (_, _, size) = self.value_layout(&value, image.tiles.len());
                if size > inline {
                    offsets.push(Some(position));
                    position += size as u64;
                    position += position % 2;
                } else {
                    offsets.push(None);
                }
            }
            value_offsets.push(offsets);
        }

        // Tile data follows the metadata
        let leader = if self.leaders { 4 } else { 0 };
        let mut tile_locations: Vec<Vec<(u64, u64)>> = Vec::with_capacity(self.images.len());
        for image in &self.images {
            let mut locations = Vec::with_capacity(image.tiles.len());
            for tile in &image.tiles {
                match tile {
                    Some(bytes) => {
                        position += leader;
                        locations.push((position, bytes.len() as u64));
                        position += bytes.len() as u64;
                    }
                    None => locations.push((0, 0)),
                }
            }
            tile_locations.push(locations);
        }

        // Second pass: write it all out
        let mut data = Vec::with_capacity(position as usize);
        match self.byte_order {
            ByteOrder::LittleEndian => data.extend_from_slice(b"II"),
            ByteOrder::BigEndian => data.extend_from_slice(b"MM"),
        }
        let first_ifd = ifd_offsets.first().copied().unwrap_or(0);
        if self.big_tiff {
            self.put(&mut data, 43, 2);
            self.put(&mut data, 8, 2);
            self.put(&mut data, 0, 2);
            self.put(&mut data, first_ifd, 8);
        } else {
            self.put(&mut data, 42, 2);
            self.put(&mut data, first_ifd, 4);
        }
        data.extend_from_slice(&ghost);

        for (index, image) in self.images.iter().enumerate() {
            assert_eq!(data.len() as u64, ifd_offsets[index]);
            let entries = sorted(&image.entries);
            let (count_width, field_width) = if self.big_tiff { (8, 8) } else { (2, 4) };

            self.put(&mut data, entries.len() as u64, count_width);
            let mut out_of_line = Vec::new();
            for (slot, (id, value)) in entries.iter().enumerate() {
                let (field_type, count, _) = self.value_layout(value, image.tiles.len());
                let encoded = self.encode(value, &tile_locations[index]);

                self.put(&mut data, *id as u64, 2);
                self.put(&mut data, field_type as u64, 2);
                self.put(&mut data, count, field_width);
                match value_offsets[index][slot] {
                    Some(offset) => {
                        self.put(&mut data, offset, field_width);
                        out_of_line.push((offset, encoded));
                    }
                    None => {
                        let mut field = encoded;
                        field.resize(field_width, 0);
                        data.extend_from_slice(&field);
                    }
                }
            }
            let next = ifd_offsets.get(index + 1).copied().unwrap_or(0);
            self.put(&mut data, next, field_width);

            for (offset, encoded) in out_of_line {
                data.resize(offset as usize, 0);
                data.extend_from_slice(&encoded);
            }
            if let Some(next) = ifd_offsets.get(index + 1) {
                data.resize(*next as usize, 0);
            }
        }

        for (image, locations) in self.images.iter().zip(&tile_locations) {
            for (tile, &(offset, count)) in image.tiles.iter().zip(locations) {
                let Some(bytes) = tile else { continue };
                data.resize((offset - leader) as usize, 0);
                if self.leaders {
                    data.extend_from_slice(&(count as u32).to_le_bytes());
                }
                data.extend_from_slice(bytes);
            }
        }
        data
    }
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted(entries: &[(u16, Value)]) -> Vec<(u16, Value)> {
    let mut entries = entries.to_vec();
    entries.sort_by_key(|(id, _)| *id);
    entries
}

// =============================================================================
// Fixtures
// =============================================================================

/// Payload for tile `index`, distinct per tile.
pub fn tile_payload(index: usize) -> Vec<u8> {
    format!("tile-{index:02}").into_bytes()
}

/// 512x512 image tiled 256x256 with four stored tiles, plus a 256x256
/// overview with one tile, georeferenced at (100, 900) with 2 unit pixels.
pub fn two_level_cog(byte_order: ByteOrder, big_tiff: bool) -> Vec<u8> {
    TiffBuilder::new()
        .with_byte_order(byte_order)
        .with_bigtiff(big_tiff)
        .add_image(
            ImageBuilder::tiled(
                512,
                512,
                256,
                1,
                (0..4).map(|i| Some(tile_payload(i))).collect(),
            )
            .geo([100.0, 900.0], [2.0, 2.0]),
        )
        .add_image(
            ImageBuilder::tiled(256, 256, 256, 1, vec![Some(tile_payload(10))]).overview(),
        )
        .build()
}

/// Check if data starts with JPEG SOI marker.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data.starts_with(&[0xFF, 0xD8]) && data.ends_with(&[0xFF, 0xD9])
}
