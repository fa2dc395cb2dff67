//! GDAL ghost area.
//!
//! GDAL writes a small text block between the TIFF header and the first IFD
//! describing how the file was laid out:
//!
//! ```text
//! GDAL_STRUCTURAL_METADATA_SIZE=000140 bytes
//! LAYOUT=IFDS_BEFORE_DATA
//! BLOCK_ORDER=ROW_MAJOR
//! BLOCK_LEADER=SIZE_AS_UINT4
//! BLOCK_TRAILER=LAST_4_BYTES_REPEATED
//! KNOWN_INCOMPATIBLE_EDITION=NO
//! ```
//!
//! The first line is fixed width and gives the size of the key/value block
//! that follows it. Files without this block, or with a block that does not
//! parse, get default options.

use serde::Serialize;
use tracing::debug;

use super::tiff::TiffHeader;
use crate::error::IoError;
use crate::io::ChunkedSource;

/// Prefix of the first ghost line.
const GHOST_PREFIX: &str = "GDAL_STRUCTURAL_METADATA_SIZE=";

/// Length of `GDAL_STRUCTURAL_METADATA_SIZE=XXXXXX bytes\n`.
const GHOST_HEADER_LEN: usize = 43;

/// Digits of the size field in the first line.
const GHOST_SIZE_DIGITS: std::ops::Range<usize> = 30..36;

/// Size in bytes of the tile leader GDAL writes for `BLOCK_LEADER=SIZE_AS_UINT4`.
const UINT4_LEADER_SIZE: usize = 4;

/// Layout options GDAL recorded in the ghost area.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GhostOptions {
    /// Key/value pairs in file order
    options: Vec<(String, String)>,
}

impl GhostOptions {
    /// Parse a ghost area starting at its `GDAL_STRUCTURAL_METADATA_SIZE` line.
    ///
    /// Anything that is not a well formed ghost block yields empty options.
    pub fn parse(data: &[u8]) -> Self {
        let Some(size) = declared_size(data) else {
            return Self::default();
        };
        let end = (GHOST_HEADER_LEN + size).min(data.len());
        Self::parse_pairs(&String::from_utf8_lossy(&data[GHOST_HEADER_LEN..end]))
    }

    /// Parse `KEY=VALUE` lines, skipping lines without a `=`.
    pub fn parse_pairs(text: &str) -> Self {
        let options = text
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once('=')?;
                let key = key.trim();
                (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
            })
            .collect();
        Self { options }
    }

    /// Read the ghost area of a file.
    ///
    /// The area must fit between the header and the first IFD. Only transport
    /// failures are errors.
    pub async fn read(source: &ChunkedSource, header: &TiffHeader) -> Result<Self, IoError> {
        let start = header.header_size() as u64;
        let available = header.first_ifd_offset.saturating_sub(start);
        if available < GHOST_HEADER_LEN as u64 {
            return Ok(Self::default());
        }

        let first_line = source.read(start, GHOST_HEADER_LEN as u64).await?;
        let Some(size) = declared_size(&first_line) else {
            return Ok(Self::default());
        };

        let block_len = (size as u64).min(available - GHOST_HEADER_LEN as u64);
        let block = source
            .read(start + GHOST_HEADER_LEN as u64, block_len)
            .await?;
        let options = Self::parse_pairs(&String::from_utf8_lossy(&block));

        debug!(
            source = source.identifier(),
            options = options.options.len(),
            "Found GDAL ghost area"
        );
        Ok(options)
    }

    /// Value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All pairs in file order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.options
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// The file was modified after GDAL wrote it and the layout no longer holds.
    pub fn is_broken(&self) -> bool {
        self.get("KNOWN_INCOMPATIBLE_EDITION") == Some("YES")
    }

    /// IFDs come before image data and the layout is intact.
    pub fn is_cog_optimized(&self) -> bool {
        !self.is_broken() && self.get("LAYOUT") == Some("IFDS_BEFORE_DATA")
    }

    /// Bytes stored in front of every tile holding its length.
    ///
    /// 0 when there are no leaders or the layout is flagged as edited, since
    /// the leaders can no longer be trusted then.
    pub fn tile_leader_byte_size(&self) -> usize {
        if self.is_broken() {
            return 0;
        }
        match self.get("BLOCK_LEADER") {
            Some("SIZE_AS_UINT4") => UINT4_LEADER_SIZE,
            _ => 0,
        }
    }

    /// Order tiles were written in (e.g. `ROW_MAJOR`).
    pub fn tile_order(&self) -> Option<&str> {
        self.get("BLOCK_ORDER")
    }
}

/// Size of the key/value block declared by a ghost header line.
fn declared_size(data: &[u8]) -> Option<usize> {
    let line = std::str::from_utf8(data.get(..GHOST_HEADER_LEN)?).ok()?;
    if !line.starts_with(GHOST_PREFIX) {
        return None;
    }
    line.get(GHOST_SIZE_DIGITS)?.trim().parse().ok()
}
