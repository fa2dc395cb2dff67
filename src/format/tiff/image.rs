//! A single image (IFD) of a Cloud Optimized GeoTIFF.
//!
//! `CogImage` wraps the tag map of one IFD and answers questions about it:
//!
//! - geometry: size, tile size, tile grid, clamped edge tile bounds
//! - georeferencing: origin, resolution and bounding box, with reduced
//!   resolution images inheriting from the base image
//! - data: tile and strip payloads, with JPEG tables stitched back in
//!
//! Structural tags are loaded once by [`CogImage::init`]. After that every
//! geometry accessor is synchronous. Tile and strip reads only fetch the
//! offset table entries they need.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use futures::future::try_join_all;
use serde::Serialize;

use super::tag::Tag;
use super::tags::{tag_name, Compression, TiffTag};
use super::values::TagValue;
use crate::error::{ImageError, IoError};
use crate::format::geokeys::{decode_geo_keys, GeoKey, GeoValue};
use crate::format::jpeg::merge_jpeg_tables;
use crate::io::{ByteOrder, ChunkedSource};

/// Tags every image needs before its geometry can be answered.
const STRUCTURAL_TAGS: [TiffTag; 9] = [
    TiffTag::Compression,
    TiffTag::ImageHeight,
    TiffTag::ImageWidth,
    TiffTag::ModelPixelScale,
    TiffTag::ModelTiePoint,
    TiffTag::ModelTransformation,
    TiffTag::TileHeight,
    TiffTag::TileWidth,
    TiffTag::NewSubFileType,
];

/// Tags holding the GeoKey directory and its parameter arrays.
const GEO_TAGS: [TiffTag; 3] = [
    TiffTag::GeoKeyDirectory,
    TiffTag::GeoAsciiParams,
    TiffTag::GeoDoubleParams,
];

/// NewSubFileType value of a reduced resolution copy of the base image.
const SUBFILE_REDUCED_RESOLUTION: u64 = 1;

/// GeoKey value meaning "user defined" rather than an EPSG code.
const USER_DEFINED: f64 = 32767.0;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// Number of tiles along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileCount {
    pub x: u32,
    pub y: u32,
}

impl TileCount {
    pub fn total(&self) -> u64 {
        self.x as u64 * self.y as u64
    }
}

/// Pixel window covered by one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Axis-aligned envelope in model coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Compressed payload of a tile or strip.
///
/// `bytes` is empty for sparse tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct TileData {
    pub mime_type: &'static str,
    pub compression: Compression,
    pub bytes: Bytes,
}

impl TileData {
    fn new(compression: Compression, bytes: Bytes) -> Self {
        Self {
            mime_type: compression.mime_type(),
            compression,
            bytes,
        }
    }

    /// Whether the tile has no data stored.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One image of a TIFF file.
#[derive(Debug)]
pub struct CogImage {
    id: usize,
    tags: BTreeMap<u16, Tag>,
    source: ChunkedSource,
    /// Bytes in front of each tile holding its length, 0 when not used
    tile_leader_byte_size: usize,
    /// Full resolution image, for images after the first
    base: Option<Arc<CogImage>>,
    geo_keys: OnceLock<BTreeMap<u16, GeoValue>>,
}

impl CogImage {
    pub fn new(
        id: usize,
        tags: BTreeMap<u16, Tag>,
        source: ChunkedSource,
        tile_leader_byte_size: usize,
        base: Option<Arc<CogImage>>,
    ) -> Self {
        Self {
            id,
            tags,
            source,
            tile_leader_byte_size,
            base,
            geo_keys: OnceLock::new(),
        }
    }

    /// Index of the image in the IFD chain.
    pub fn id(&self) -> usize {
        self.id
    }

    // =========================================================================
    // Tags
    // =========================================================================

    /// Load the structural tags, and optionally the GeoKeys, in one round.
    pub async fn init(&self, load_geo_tags: bool) -> Result<(), ImageError> {
        let mut wanted = STRUCTURAL_TAGS.to_vec();
        if load_geo_tags {
            wanted.extend(GEO_TAGS);
        }
        self.fetch_all(&wanted).await?;

        if load_geo_tags {
            self.load_geo_keys().await?;
        }
        Ok(())
    }

    /// All tags of the image keyed by id.
    pub fn tags(&self) -> &BTreeMap<u16, Tag> {
        &self.tags
    }

    pub fn tag(&self, tag: TiffTag) -> Option<&Tag> {
        self.tags.get(&tag.as_u16())
    }

    /// Names of all tags present, in id order.
    pub fn tag_names(&self) -> Vec<String> {
        self.tags.keys().map(|&id| tag_name(id)).collect()
    }

    /// Value of a tag if present and already loaded.
    pub fn value(&self, tag: TiffTag) -> Option<&TagValue> {
        self.tag(tag).and_then(Tag::loaded_value)
    }

    /// Value of a tag, fetching it if needed. `None` when the tag is absent.
    pub async fn fetch(&self, tag: TiffTag) -> Result<Option<&TagValue>, IoError> {
        match self.tag(tag) {
            Some(entry) => entry.value(&self.source).await.map(Some),
            None => Ok(None),
        }
    }

    /// Fetch the given tags concurrently so their reads share range requests.
    pub async fn fetch_all(&self, tags: &[TiffTag]) -> Result<(), IoError> {
        try_join_all(
            tags.iter()
                .filter_map(|&tag| self.tag(tag))
                .map(|entry| entry.value(&self.source)),
        )
        .await?;
        Ok(())
    }

    /// Fetch every out-of-line tag of the image.
    pub async fn fetch_all_tags(&self) -> Result<(), IoError> {
        try_join_all(self.tags.values().map(|entry| entry.value(&self.source))).await?;
        Ok(())
    }

    /// Loaded value of a tag; absent tags are `None`, unloaded ones an error.
    fn loaded(&self, tag: TiffTag) -> Result<Option<&TagValue>, ImageError> {
        match self.tag(tag) {
            Some(entry) => entry
                .loaded_value()
                .map(Some)
                .ok_or(ImageError::TagNotLoaded(tag.name())),
            None => Ok(None),
        }
    }

    fn loaded_u64(&self, tag: TiffTag) -> Result<Option<u64>, ImageError> {
        match self.loaded(tag)? {
            Some(value) => value.as_u64().map(Some).ok_or_else(|| ImageError::InvalidTagValue {
                tag: tag.name(),
                message: format!("expected an integer, found {value}"),
            }),
            None => Ok(None),
        }
    }

    fn required_u32(&self, tag: TiffTag) -> Result<u32, ImageError> {
        let value = self
            .loaded_u64(tag)?
            .ok_or(ImageError::MissingTag(tag.name()))?;
        u32::try_from(value).map_err(|_| ImageError::InvalidTagValue {
            tag: tag.name(),
            message: format!("{value} does not fit in 32 bits"),
        })
    }

    fn loaded_f64s(&self, tag: TiffTag) -> Result<Option<Vec<f64>>, ImageError> {
        Ok(self.loaded(tag)?.and_then(TagValue::as_f64_vec))
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Size of the image in pixels.
    pub fn size(&self) -> Result<Size, ImageError> {
        Ok(Size {
            width: self.required_u32(TiffTag::ImageWidth)?,
            height: self.required_u32(TiffTag::ImageHeight)?,
        })
    }

    /// Tiled images carry a TileWidth tag; everything else is strip organized.
    pub fn is_tiled(&self) -> bool {
        self.tag(TiffTag::TileWidth).is_some()
    }

    /// Size of one tile in pixels.
    pub fn tile_size(&self) -> Result<Size, ImageError> {
        if !self.is_tiled() {
            return Err(ImageError::NotTiled);
        }
        let width = self.required_u32(TiffTag::TileWidth)?;
        let height = self.required_u32(TiffTag::TileHeight)?;
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidTagValue {
                tag: TiffTag::TileWidth.name(),
                message: format!("tile size {width}x{height} is empty"),
            });
        }
        Ok(Size { width, height })
    }

    /// Number of tiles along each axis.
    pub fn tile_count(&self) -> Result<TileCount, ImageError> {
        let size = self.size()?;
        let tile = self.tile_size()?;
        Ok(TileCount {
            x: size.width.div_ceil(tile.width),
            y: size.height.div_ceil(tile.height),
        })
    }

    /// Pixel window of tile `(x, y)`, clamped to the image for edge tiles.
    pub fn tile_bounds(&self, x: u32, y: u32) -> Result<TileBounds, ImageError> {
        let size = self.size()?;
        let tile = self.tile_size()?;
        self.check_tile(x, y)?;

        let left = x * tile.width;
        let top = y * tile.height;
        Ok(TileBounds {
            x: left,
            y: top,
            width: tile.width.min(size.width - left),
            height: tile.height.min(size.height - top),
        })
    }

    fn check_tile(&self, x: u32, y: u32) -> Result<TileCount, ImageError> {
        let count = self.tile_count()?;
        if x >= count.x || y >= count.y {
            return Err(ImageError::TileOutOfRange {
                x,
                y,
                tiles_x: count.x,
                tiles_y: count.y,
            });
        }
        Ok(count)
    }

    /// Number of strips, 0 for tiled images.
    pub fn strip_count(&self) -> u64 {
        self.tag(TiffTag::StripByteCounts)
            .map_or(0, |entry| entry.count)
    }

    /// Length of the TileOffsets array, 0 for strip images.
    pub fn tile_offset_count(&self) -> u64 {
        self.tag(TiffTag::TileOffsets).map_or(0, |entry| entry.count)
    }

    /// Raw Compression code.
    pub fn compression(&self) -> Option<u16> {
        self.value(TiffTag::Compression)
            .and_then(TagValue::as_u64)
            .and_then(|code| u16::try_from(code).ok())
    }

    /// Mime type of the image's tiles, `None` for unknown compression.
    pub fn mime_type(&self) -> Option<&'static str> {
        self.compression()
            .and_then(Compression::from_u16)
            .map(Compression::mime_type)
    }

    fn compression_kind(&self) -> Result<Compression, ImageError> {
        let code = self.compression();
        code.and_then(Compression::from_u16)
            .ok_or(ImageError::UnsupportedCompression(code))
    }

    // =========================================================================
    // Georeferencing
    // =========================================================================

    /// Base image this one inherits its geotransform from, if it is an overview.
    fn overview_base(&self) -> Result<Option<&CogImage>, ImageError> {
        if self.id == 0 {
            return Ok(None);
        }
        let reduced =
            self.loaded_u64(TiffTag::NewSubFileType)? == Some(SUBFILE_REDUCED_RESOLUTION);
        Ok(self.base.as_deref().filter(|_| reduced))
    }

    /// Model coordinates of the top left corner.
    ///
    /// Taken from the tie point, else from the transformation matrix, else
    /// from the base image for overviews.
    pub fn origin(&self) -> Result<[f64; 3], ImageError> {
        if let Some(tie) = self.loaded_f64s(TiffTag::ModelTiePoint)? {
            if tie.len() >= 6 {
                return Ok([tie[3], tie[4], tie[5]]);
            }
        }

        if let Some(matrix) = self.loaded_f64s(TiffTag::ModelTransformation)? {
            if matrix.len() >= 12 {
                return Ok([matrix[3], matrix[7], matrix[11]]);
            }
        }

        match self.overview_base()? {
            Some(base) => base.origin(),
            None => Err(ImageError::NoGeoTransform(self.id)),
        }
    }

    /// Size of a pixel in model units; y is negative for north-up images.
    ///
    /// Overviews without their own transform scale the base resolution by the
    /// size ratio between the base and this image.
    pub fn resolution(&self) -> Result<[f64; 3], ImageError> {
        if let Some(scale) = self.loaded_f64s(TiffTag::ModelPixelScale)? {
            if scale.len() >= 3 {
                return Ok([scale[0], -scale[1], scale[2]]);
            }
        }

        if let Some(matrix) = self.loaded_f64s(TiffTag::ModelTransformation)? {
            if matrix.len() >= 11 {
                return Ok([matrix[0], matrix[5], matrix[10]]);
            }
        }

        match self.overview_base()? {
            Some(base) => {
                let [res_x, res_y, res_z] = base.resolution()?;
                let base_size = base.size()?;
                let size = self.size()?;
                Ok([
                    res_x * base_size.width as f64 / size.width as f64,
                    res_y * base_size.height as f64 / size.height as f64,
                    res_z,
                ])
            }
            None => Err(ImageError::NoGeoTransform(self.id)),
        }
    }

    /// Envelope of the image with min/max ordered whatever the axis direction.
    pub fn bbox(&self) -> Result<BoundingBox, ImageError> {
        let size = self.size()?;
        let [x1, y1, _] = self.origin()?;
        let [res_x, res_y, _] = self.resolution()?;

        let x2 = x1 + res_x * size.width as f64;
        let y2 = y1 + res_y * size.height as f64;
        Ok(BoundingBox {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        })
    }

    /// Whether origin and resolution can be derived.
    pub fn is_geo_located(&self) -> bool {
        self.origin().is_ok() && self.resolution().is_ok()
    }

    /// Fetch the GeoKey directory and its parameter tags, then decode them.
    ///
    /// Runs once per image; later calls return immediately.
    pub async fn load_geo_keys(&self) -> Result<(), ImageError> {
        if self.geo_keys.get().is_some() {
            return Ok(());
        }
        self.fetch_all(&GEO_TAGS).await?;

        let keys = match self.value(TiffTag::GeoKeyDirectory) {
            Some(directory) => decode_geo_keys(directory, |id| {
                self.tags.get(&id).and_then(Tag::loaded_value)
            }),
            None => BTreeMap::new(),
        };
        let _ = self.geo_keys.set(keys);
        Ok(())
    }

    /// Decoded GeoKeys. Fails until [`CogImage::load_geo_keys`] has run.
    pub fn geo_keys(&self) -> Result<&BTreeMap<u16, GeoValue>, ImageError> {
        self.geo_keys.get().ok_or(ImageError::GeoKeysNotLoaded)
    }

    pub fn geo_key(&self, key: GeoKey) -> Result<Option<&GeoValue>, ImageError> {
        Ok(self.geo_keys()?.get(&key.as_u16()))
    }

    /// EPSG code of the projected, else geographic, coordinate system.
    pub fn epsg(&self) -> Result<Option<u32>, ImageError> {
        let code = |key| -> Result<Option<u32>, ImageError> {
            Ok(self
                .geo_key(key)?
                .and_then(GeoValue::as_f64)
                .filter(|&code| code != USER_DEFINED && code > 0.0)
                .map(|code| code as u32))
        };
        match code(GeoKey::ProjectedCsType)? {
            Some(epsg) => Ok(Some(epsg)),
            None => code(GeoKey::GeographicType),
        }
    }

    /// Lines of the GDAL metadata XML.
    pub async fn gdal_metadata(&self) -> Result<Option<Vec<String>>, ImageError> {
        Ok(self
            .fetch(TiffTag::GdalMetadata)
            .await?
            .and_then(TagValue::as_str)
            .map(|xml| xml.lines().map(str::to_string).collect()))
    }

    /// GDAL no data value as written.
    pub async fn gdal_nodata(&self) -> Result<Option<String>, ImageError> {
        Ok(self
            .fetch(TiffTag::GdalNoData)
            .await?
            .and_then(TagValue::as_str)
            .map(|nodata| nodata.trim().to_string()))
    }

    // =========================================================================
    // Tiles and strips
    // =========================================================================

    /// Read tile `(x, y)`.
    ///
    /// Sparse tiles come back empty. Coordinates outside the tile grid are
    /// an error.
    pub async fn get_tile(&self, x: u32, y: u32) -> Result<TileData, ImageError> {
        let compression = self.compression_kind()?;
        let count = self.check_tile(x, y)?;

        let index = y as u64 * count.x as u64 + x as u64;
        if index >= count.total() {
            return Err(ImageError::TileIndexOutOfRange {
                index,
                count: count.total(),
            });
        }

        let (offset, byte_count) = self.tile_location(index).await?;
        self.get_bytes(compression, offset, byte_count).await
    }

    /// Offset and length of tile `index`.
    async fn tile_location(&self, index: u64) -> Result<(u64, u64), ImageError> {
        let offsets = self
            .tag(TiffTag::TileOffsets)
            .ok_or(ImageError::MissingTag(TiffTag::TileOffsets.name()))?;
        if index >= offsets.count {
            return Err(ImageError::TileIndexOutOfRange {
                index,
                count: offsets.count,
            });
        }

        // GDAL stores the tile length right in front of the tile
        if self.tile_leader_byte_size > 0 {
            let offset = element(offsets, TiffTag::TileOffsets, index, &self.source).await?;
            if offset == 0 {
                return Ok((0, 0));
            }

            let leader = self.tile_leader_byte_size as u64;
            let leader_offset = offset.checked_sub(leader).ok_or_else(|| {
                ImageError::InvalidTagValue {
                    tag: TiffTag::TileOffsets.name(),
                    message: format!("tile offset {offset} leaves no room for a leader"),
                }
            })?;
            self.source.ensure_loaded(leader_offset, leader).await?;
            let byte_count = self.source.uint(
                leader_offset,
                self.tile_leader_byte_size,
                ByteOrder::LittleEndian,
            )?;
            return Ok((offset, byte_count));
        }

        let byte_counts = self
            .tag(TiffTag::TileByteCounts)
            .ok_or(ImageError::MissingTag(TiffTag::TileByteCounts.name()))?;
        futures::try_join!(
            element(offsets, TiffTag::TileOffsets, index, &self.source),
            element(byte_counts, TiffTag::TileByteCounts, index, &self.source),
        )
    }

    /// Read strip `index` of a strip organized image.
    pub async fn get_strip(&self, index: u64) -> Result<TileData, ImageError> {
        if self.is_tiled() {
            return Err(ImageError::NotStriped);
        }
        let compression = self.compression_kind()?;

        let offsets = self
            .tag(TiffTag::StripOffsets)
            .ok_or(ImageError::MissingTag(TiffTag::StripOffsets.name()))?;
        let byte_counts = self
            .tag(TiffTag::StripByteCounts)
            .ok_or(ImageError::MissingTag(TiffTag::StripByteCounts.name()))?;

        let count = byte_counts.count.min(offsets.count);
        if index >= count {
            return Err(ImageError::StripOutOfRange { index, count });
        }

        let (offset, byte_count) = futures::try_join!(
            element(offsets, TiffTag::StripOffsets, index, &self.source),
            element(byte_counts, TiffTag::StripByteCounts, index, &self.source),
        )?;
        self.get_bytes(compression, offset, byte_count).await
    }

    /// Byte counts of every tile, loading the whole TileByteCounts array.
    pub async fn tile_byte_counts(&self) -> Result<Vec<u64>, ImageError> {
        let Some(value) = self.fetch(TiffTag::TileByteCounts).await? else {
            return Ok(Vec::new());
        };
        Ok((0..value.len()).filter_map(|i| value.get_u64(i)).collect())
    }

    /// Read `byte_count` bytes at `offset`, restoring JPEG tables if needed.
    async fn get_bytes(
        &self,
        compression: Compression,
        offset: u64,
        byte_count: u64,
    ) -> Result<TileData, ImageError> {
        if byte_count == 0 {
            return Ok(TileData::new(compression, Bytes::new()));
        }

        let bytes = self.source.read(offset, byte_count).await?;
        if !compression.is_jpeg() {
            return Ok(TileData::new(compression, bytes));
        }

        let tables = self
            .fetch(TiffTag::JpegTables)
            .await?
            .and_then(TagValue::to_bytes);
        let bytes = match tables {
            Some(tables) => merge_jpeg_tables(&tables, &bytes),
            None => bytes,
        };
        Ok(TileData::new(compression, bytes))
    }
}

/// Element `index` of an offsets or byte counts tag.
async fn element(
    entry: &Tag,
    tag: TiffTag,
    index: u64,
    source: &ChunkedSource,
) -> Result<u64, ImageError> {
    entry
        .u64_at(index, source)
        .await?
        .ok_or_else(|| ImageError::InvalidTagValue {
            tag: tag.name(),
            message: format!("no integer at index {index}"),
        })
}
