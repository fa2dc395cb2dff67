use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use super::range_reader::check_range;
use super::RangeReader;
use crate::error::IoError;

/// In-memory RangeReader over a byte buffer.
///
/// Counts the range requests it serves, which makes it handy for checking how
/// many fetches a read pattern costs.
pub struct MemoryRangeReader {
    data: Bytes,
    identifier: String,
    read_count: AtomicUsize,
}

impl MemoryRangeReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::with_identifier(data, "memory://buffer")
    }

    pub fn with_identifier(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
            read_count: AtomicUsize::new(0),
        }
    }

    /// Number of range requests served so far.
    pub fn read_count(&self) -> usize {
        self.read_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RangeReader for MemoryRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.read_count.fetch_add(1, Ordering::SeqCst);

        check_range(offset, len, Some(self.data.len() as u64))?;

        Ok(self.data.slice(offset as usize..offset as usize + len))
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
