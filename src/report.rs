//! Report model for the `info` command.
//!
//! A [`DocumentReport`] is gathered from an opened [`CogTiff`] and rendered
//! either as aligned plain text or as JSON.

use std::fmt::Write as _;

use futures::future::try_join_all;
use serde::Serialize;

use crate::error::ImageError;
use crate::format::geokeys::geo_key_name;
use crate::format::tiff::{BoundingBox, CogImage, CogTiff, Size, TileCount};
use crate::io::ByteOrder;

/// Placeholder for out-of-line tag values that were never fetched.
pub const NOT_LOADED: &str = "not loaded";

/// What to include beyond the summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    /// Dump every tag of every image
    pub tags: bool,
    /// Fetch out-of-line tag values before dumping
    pub fetch_tags: bool,
    /// Load tile byte counts and summarize them
    pub tile_stats: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub source: String,
    pub version: &'static str,
    pub version_code: u16,
    pub byte_order: &'static str,
    /// Size of the resource, when the store knows it
    pub size: Option<u64>,
    pub ghost: GhostReport,
    pub images: Vec<ImageReport>,
    /// Fetch statistics, taken after the report was gathered
    pub chunks: ChunkStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct GhostReport {
    pub cog_optimized: bool,
    pub broken: bool,
    pub tile_leader_byte_size: usize,
    pub options: Vec<GhostOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GhostOption {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkStats {
    pub chunk_size: usize,
    pub fetches: usize,
    pub bytes_fetched: u64,
    pub resident_chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageReport {
    pub id: usize,
    pub size: Option<Size>,
    pub tiled: bool,
    pub tile_size: Option<Size>,
    pub tile_count: Option<TileCount>,
    pub strip_count: u64,
    pub compression: Option<u16>,
    pub mime_type: Option<&'static str>,
    pub origin: Option<[f64; 3]>,
    pub resolution: Option<[f64; 3]>,
    pub bbox: Option<BoundingBox>,
    pub epsg: Option<u32>,
    pub nodata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_stats: Option<TileStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_keys: Option<Vec<GeoKeyReport>>,
}

/// Summary of an image's tile byte counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileStats {
    pub tiles: u64,
    /// Tiles with no data stored
    pub sparse: u64,
    pub total_bytes: u64,
    pub min_bytes: u64,
    pub max_bytes: u64,
    pub mean_bytes: f64,
}

impl TileStats {
    /// Summarize byte counts; sparse tiles are counted but left out of min/max/mean.
    pub fn from_byte_counts(counts: &[u64]) -> Self {
        let stored: Vec<u64> = counts.iter().copied().filter(|&c| c > 0).collect();
        let total_bytes: u64 = stored.iter().sum();
        Self {
            tiles: counts.len() as u64,
            sparse: (counts.len() - stored.len()) as u64,
            total_bytes,
            min_bytes: stored.iter().copied().min().unwrap_or(0),
            max_bytes: stored.iter().copied().max().unwrap_or(0),
            mean_bytes: if stored.is_empty() {
                0.0
            } else {
                total_bytes as f64 / stored.len() as f64
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagReport {
    pub id: u16,
    pub name: String,
    pub field_type: String,
    pub count: u64,
    /// False for out-of-line values that were not fetched
    pub loaded: bool,
    /// Rendered value, `None` when not loaded
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeoKeyReport {
    pub id: u16,
    pub name: String,
    pub value: String,
}

impl DocumentReport {
    /// Gather a report, fetching whatever `options` asks for.
    pub async fn build(tiff: &CogTiff, options: ReportOptions) -> Result<Self, ImageError> {
        tiff.load_geo_keys().await?;
        let images = try_join_all(
            tiff.images()
                .iter()
                .map(|image| ImageReport::build(image, options)),
        )
        .await?;

        let source = tiff.source();
        let ghost = tiff.options();
        Ok(Self {
            source: source.identifier().to_string(),
            version: tiff.version().name(),
            version_code: tiff.version().code(),
            byte_order: match tiff.byte_order() {
                ByteOrder::LittleEndian => "little-endian",
                ByteOrder::BigEndian => "big-endian",
            },
            size: source.size(),
            ghost: GhostReport {
                cog_optimized: ghost.is_cog_optimized(),
                broken: ghost.is_broken(),
                tile_leader_byte_size: ghost.tile_leader_byte_size(),
                options: ghost
                    .pairs()
                    .iter()
                    .map(|(key, value)| GhostOption {
                        key: key.clone(),
                        value: value.clone(),
                    })
                    .collect(),
            },
            images,
            chunks: ChunkStats {
                chunk_size: source.chunk_size(),
                fetches: source.fetch_count(),
                bytes_fetched: source.bytes_fetched(),
                resident_chunks: source.resident_chunk_count(),
            },
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Plain text rendering with aligned columns.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "{:<16}{}", "Source", self.source)?;
        writeln!(out, "{:<16}{} ({})", "Version", self.version, self.version_code)?;
        writeln!(out, "{:<16}{}", "Byte order", self.byte_order)?;
        if let Some(size) = self.size {
            writeln!(out, "{:<16}{} bytes", "Size", size)?;
        }
        writeln!(
            out,
            "{:<16}{} fetches, {} bytes, {} chunks of {} bytes",
            "Requests",
            self.chunks.fetches,
            self.chunks.bytes_fetched,
            self.chunks.resident_chunks,
            self.chunks.chunk_size
        )?;

        if !self.ghost.options.is_empty() {
            writeln!(
                out,
                "{:<16}cog optimized: {}, broken: {}, tile leader: {} bytes",
                "Ghost options",
                self.ghost.cog_optimized,
                self.ghost.broken,
                self.ghost.tile_leader_byte_size
            )?;
            for option in &self.ghost.options {
                writeln!(out, "{:<16}{} = {}", "", option.key, option.value)?;
            }
        }

        writeln!(out)?;
        writeln!(
            out,
            "{:<4}{:<14}{:<12}{:<10}{:<28}{}",
            "Id", "Size", "Tile size", "Tiles", "Compression", "Resolution"
        )?;
        for image in &self.images {
            let layout = match (image.tile_size, image.tile_count) {
                (Some(size), Some(count)) => {
                    (dimensions(size), format!("{}x{}", count.x, count.y))
                }
                _ => ("-".to_string(), format!("{} strips", image.strip_count)),
            };
            writeln!(
                out,
                "{:<4}{:<14}{:<12}{:<10}{:<28}{}",
                image.id,
                image.size.map_or_else(|| "-".to_string(), dimensions),
                layout.0,
                layout.1,
                compression_label(image),
                image
                    .resolution
                    .map_or_else(|| "-".to_string(), |r| format!("{}, {}", r[0], r[1])),
            )?;
        }

        for image in &self.images {
            image.write_details(out)?;
        }
        Ok(())
    }
}

impl ImageReport {
    async fn build(image: &CogImage, options: ReportOptions) -> Result<Self, ImageError> {
        if options.fetch_tags {
            image.fetch_all_tags().await?;
        }
        let tile_stats = if options.tile_stats && image.is_tiled() {
            Some(TileStats::from_byte_counts(&image.tile_byte_counts().await?))
        } else {
            None
        };
        let nodata = image.gdal_nodata().await?;

        let tags: Option<Vec<TagReport>> = options.tags.then(|| {
            image
                .tags()
                .values()
                .map(|tag| {
                    let value = tag.loaded_value().map(|value| value.to_string());
                    TagReport {
                        id: tag.id,
                        name: tag.name(),
                        field_type: tag.type_name(),
                        count: tag.count,
                        loaded: value.is_some(),
                        value,
                    }
                })
                .collect()
        });
        let geo_keys: Option<Vec<GeoKeyReport>> = match (options.tags, image.geo_keys()) {
            (true, Ok(keys)) => Some(
                keys.iter()
                    .map(|(&id, value)| GeoKeyReport {
                        id,
                        name: geo_key_name(id),
                        value: value.to_string(),
                    })
                    .collect(),
            ),
            _ => None,
        };

        Ok(Self {
            id: image.id(),
            size: image.size().ok(),
            tiled: image.is_tiled(),
            tile_size: image.tile_size().ok(),
            tile_count: image.tile_count().ok(),
            strip_count: image.strip_count(),
            compression: image.compression(),
            mime_type: image.mime_type(),
            origin: image.origin().ok(),
            resolution: image.resolution().ok(),
            bbox: image.bbox().ok(),
            epsg: image.epsg().ok().flatten(),
            nodata,
            tile_stats,
            tags,
            geo_keys,
        })
    }

    fn write_details(&self, out: &mut String) -> std::fmt::Result {
        let has_details = self.bbox.is_some()
            || self.epsg.is_some()
            || self.nodata.is_some()
            || self.tile_stats.is_some()
            || self.tags.is_some();
        if !has_details {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "Image {}", self.id)?;
        if let Some(bbox) = self.bbox {
            writeln!(
                out,
                "  {:<14}{}, {}, {}, {}",
                "Bbox", bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
            )?;
        }
        if let Some(epsg) = self.epsg {
            writeln!(out, "  {:<14}EPSG:{}", "Projection", epsg)?;
        }
        if let Some(nodata) = &self.nodata {
            writeln!(out, "  {:<14}{}", "No data", nodata)?;
        }
        if let Some(stats) = &self.tile_stats {
            writeln!(
                out,
                "  {:<14}{} tiles, {} sparse, {} bytes (min {}, max {}, mean {:.1})",
                "Tile bytes",
                stats.tiles,
                stats.sparse,
                stats.total_bytes,
                stats.min_bytes,
                stats.max_bytes,
                stats.mean_bytes
            )?;
        }
        if let Some(tags) = &self.tags {
            writeln!(out, "  Tags")?;
            for tag in tags {
                writeln!(
                    out,
                    "    {:<7}{:<24}{:<10}{:<8}{}",
                    tag.id,
                    tag.name,
                    tag.field_type,
                    tag.count,
                    tag.value.as_deref().unwrap_or(NOT_LOADED)
                )?;
            }
        }
        if let Some(keys) = self.geo_keys.as_ref().filter(|keys| !keys.is_empty()) {
            writeln!(out, "  Geo keys")?;
            for key in keys {
                writeln!(out, "    {:<7}{:<24}{}", key.id, key.name, key.value)?;
            }
        }
        Ok(())
    }
}

fn dimensions(size: Size) -> String {
    format!("{}x{}", size.width, size.height)
}

fn compression_label(image: &ImageReport) -> String {
    match (image.compression, image.mime_type) {
        (Some(code), Some(mime)) => format!("{mime} ({code})"),
        (Some(code), None) => format!("unknown ({code})"),
        (None, _) => "-".to_string(),
    }
}
