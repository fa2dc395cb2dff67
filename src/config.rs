//! Command line configuration for cog-inspect.
//!
//! Options can be given as flags or through environment variables with the
//! `COG_` prefix:
//!
//! - `COG_CHUNK_SIZE` - Chunk size in bytes (default: 32768)
//! - `COG_MAX_CHUNKS` - Longest run of chunks fetched in one request (default: 32)
//! - `COG_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `COG_S3_REGION` - AWS region (default: us-east-1)
//!
//! # Example
//!
//! ```text
//! cog-inspect info s3://bucket/image.tif --tags
//! cog-inspect tile https://example.com/image.tif --xyz 1,2,0 --output tiles/
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};

use crate::io::{ChunkConfig, StoreOptions, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHUNKS_PER_REQUEST};

// =============================================================================
// Default Values
// =============================================================================

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Smallest accepted chunk size.
pub const MIN_CHUNK_SIZE: usize = 1024;

/// Largest accepted chunk size.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

// =============================================================================
// CLI Arguments
// =============================================================================

/// cog-inspect - Inspect Cloud Optimized GeoTIFFs over range requests.
///
/// Reads only the bytes it needs from local files, HTTP(S) URLs or S3.
#[derive(Parser, Debug, Clone)]
#[command(name = "cog-inspect")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Describe the structure of one or more TIFFs
    Info(InfoConfig),
    /// Extract a single compressed tile
    Tile(TileConfig),
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Options shared by every command that opens a TIFF.
#[derive(Args, Debug, Clone)]
pub struct SourceConfig {
    /// Chunk size in bytes used to split range requests (1KB - 16MB).
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, env = "COG_CHUNK_SIZE")]
    pub chunk_size: usize,

    /// Longest run of contiguous chunks merged into one request.
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNKS_PER_REQUEST, env = "COG_MAX_CHUNKS")]
    pub max_chunks: usize,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "COG_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "COG_S3_REGION")]
    pub s3_region: String,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl SourceConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size < MIN_CHUNK_SIZE || self.chunk_size > MAX_CHUNK_SIZE {
            return Err("chunk_size must be between 1KB and 16MB".to_string());
        }
        if self.max_chunks == 0 {
            return Err("max_chunks must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            max_chunks_per_request: self.max_chunks,
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            s3_endpoint: self.s3_endpoint.clone(),
            s3_region: self.s3_region.clone(),
        }
    }
}

/// Options for the `info` command.
#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Files, http(s):// URLs or s3:// locations to inspect.
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Dump every tag of every image.
    #[arg(long, default_value_t = false)]
    pub tags: bool,

    /// Fetch out-of-line tag values before dumping them.
    #[arg(long, default_value_t = false)]
    pub fetch_tags: bool,

    /// Load tile byte counts and summarize them.
    #[arg(long, default_value_t = false)]
    pub tile_stats: bool,

    /// Print machine readable JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub source: SourceConfig,
}

impl InfoConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.paths.iter().any(|path| path.trim().is_empty()) {
            return Err("paths must not be empty".to_string());
        }
        self.source.validate()
    }
}

/// Options for the `tile` command.
#[derive(Args, Debug, Clone)]
pub struct TileConfig {
    /// File, http(s):// URL or s3:// location to read from.
    pub path: String,

    /// Tile to extract as X,Y,Z where Z is the image index.
    #[arg(long)]
    pub xyz: TileAddress,

    /// Directory the tile is written to.
    #[arg(long, default_value = ".")]
    pub output: PathBuf,

    #[command(flatten)]
    pub source: SourceConfig,
}

impl TileConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.path.trim().is_empty() {
            return Err("path must not be empty".to_string());
        }
        self.source.validate()
    }
}

/// Tile coordinates plus image index, parsed from `X,Y,Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileAddress {
    pub x: u32,
    pub y: u32,
    pub z: usize,
}

impl TileAddress {
    /// Output file name for a tile, e.g. `001_002_z0.webp`.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{:03}_{:03}_z{}.{}", self.x, self.y, self.z, extension)
    }
}

impl FromStr for TileAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, z] = parts[..] else {
            return Err(format!("expected X,Y,Z, got '{s}'"));
        };
        let number = |name: &str, value: &str| {
            value
                .parse::<u64>()
                .map_err(|_| format!("invalid {name} '{value}' in '{s}'"))
        };
        let to_u32 = |name: &str, value: u64| {
            u32::try_from(value).map_err(|_| format!("{name} {value} is too large"))
        };

        Ok(Self {
            x: to_u32("x", number("x", x)?)?,
            y: to_u32("y", number("y", y)?)?,
            z: number("z", z)? as usize,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
