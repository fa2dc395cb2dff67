//! # cog-inspect
//!
//! A reader for Cloud Optimized GeoTIFFs that fetches only the byte ranges it
//! needs from local files, HTTP(S) servers or S3.
//!
//! ## Features
//!
//! - **Range-based reading**: Directories, tag values and tiles are fetched with
//!   range requests, never by downloading the whole file
//! - **Request coalescing**: Reads issued together are merged into as few range
//!   requests as possible by a chunk cache
//! - **TIFF and BigTIFF**: Both byte orders, lazy out-of-line tag values
//! - **GeoTIFF**: Origin, resolution and bounding box, with overviews
//!   inheriting from the base image, plus GeoKey decoding
//! - **GDAL layouts**: Ghost area options and tile leaders
//!
//! ## Architecture
//!
//! - [`io`] - Byte range stores and the chunked source over them
//! - [`mod@format`] - TIFF structure, tags, GeoKeys, ghost area and JPEG handling
//! - [`report`] - Report model for the `info` command
//! - [`config`] - CLI configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use cog_inspect::{io::{open_reader, ChunkConfig, StoreOptions}, CogTiff};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reader = open_reader("s3://bucket/image.tif", &StoreOptions::default()).await?;
//!     let tiff = CogTiff::open(reader, ChunkConfig::default()).await?;
//!
//!     let tile = tiff.tile(0, 0, 0).await?;
//!     println!("{} bytes of {}", tile.bytes.len(), tile.mime_type);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod report;

// Re-export commonly used types
pub use config::{Cli, Command, InfoConfig, SourceConfig, TileAddress, TileConfig};
pub use error::{CogResult, ImageError, IoError, TiffError};
pub use format::tiff::{
    BoundingBox, ByteOrder, CogImage, CogTiff, Compression, FieldType, Size, Tag, TagValue,
    TiffTag, TiffVersion, TileBounds, TileCount, TileData,
};
pub use format::{GeoKey, GeoValue, GhostOptions};
pub use io::{
    open_reader, ChunkConfig, ChunkedSource, FileRangeReader, HttpRangeReader, MemoryRangeReader,
    RangeReader, S3RangeReader, StoreOptions,
};
pub use report::{DocumentReport, ReportOptions};
