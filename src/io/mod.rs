//! Byte range stores and the chunk cache layered over them.

mod chunk_source;
mod file_reader;
mod http_reader;
mod memory_reader;
mod range_reader;
mod s3_reader;

use std::sync::Arc;

pub use chunk_source::{
    group_runs, ChunkConfig, ChunkedSource, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHUNKS_PER_REQUEST,
};
pub use file_reader::FileRangeReader;
pub use http_reader::HttpRangeReader;
pub use memory_reader::MemoryRangeReader;
pub use range_reader::{ByteOrder, RangeReader};
pub use s3_reader::{create_s3_client, parse_s3_location, S3RangeReader};

use crate::error::IoError;

/// Options used to build a store for a location.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Custom S3 endpoint for S3-compatible services
    pub s3_endpoint: Option<String>,
    /// AWS region for S3
    pub s3_region: String,
}

/// Open a store for `location`, chosen by its scheme.
///
/// `s3://` locations use S3, `http://` and `https://` use HTTP range requests,
/// anything else is treated as a local path.
pub async fn open_reader(
    location: &str,
    options: &StoreOptions,
) -> Result<Arc<dyn RangeReader>, IoError> {
    if location.starts_with("s3://") {
        let client = create_s3_client(options.s3_endpoint.as_deref(), &options.s3_region).await;
        let reader = S3RangeReader::from_location(client, location).await?;
        return Ok(Arc::new(reader));
    }
    if location.starts_with("http://") || location.starts_with("https://") {
        let reader = HttpRangeReader::new(reqwest::Client::new(), location).await?;
        return Ok(Arc::new(reader));
    }
    Ok(Arc::new(FileRangeReader::new(location).await?))
}
