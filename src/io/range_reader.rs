use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// A store that serves byte ranges of one resource.
///
/// Stores are stateless per call and keep no cache; caching and request
/// merging happen in [`ChunkedSource`](super::ChunkedSource).
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    /// When [`size`](Self::size) is unknown, a range running past the end of the
    /// resource returns the available bytes instead of failing.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Total size of the resource in bytes, if known.
    fn size(&self) -> Option<u64>;

    /// Name of the resource in logs and reports, e.g. `s3://bucket/key`.
    fn identifier(&self) -> &str;

    /// Release any handles held by the reader. Safe to call more than once.
    async fn close(&self) -> Result<(), IoError> {
        Ok(())
    }
}

/// `Range` header value for `len` bytes at `offset` (inclusive end).
pub(crate) fn range_header(offset: u64, len: usize) -> String {
    format!("bytes={}-{}", offset, offset + len as u64 - 1)
}

/// Fail when `[offset, offset + len)` runs past a known `size`.
pub(crate) fn check_range(offset: u64, len: usize, size: Option<u64>) -> Result<(), IoError> {
    match size {
        Some(size) if offset.checked_add(len as u64).map_or(true, |end| end > size) => {
            Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size,
            })
        }
        _ => Ok(()),
    }
}

// =============================================================================
// Byte Order
// =============================================================================

/// Byte order (endianness) of a TIFF file.
///
/// TIFF files declare their byte order in the first two bytes of the header.
/// All multi-byte values in the file must be read respecting this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        let bytes = fixed::<2>(bytes);
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(bytes),
            ByteOrder::BigEndian => u16::from_be_bytes(bytes),
        }
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        let bytes = fixed::<4>(bytes);
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(bytes),
            ByteOrder::BigEndian => u32::from_be_bytes(bytes),
        }
    }

    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        let bytes = fixed::<8>(bytes);
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(bytes),
            ByteOrder::BigEndian => u64::from_be_bytes(bytes),
        }
    }

    /// Read an unsigned integer as wide as `bytes` (at most 8 bytes are used).
    pub fn read_uint(self, bytes: &[u8]) -> u64 {
        let bytes = &bytes[..bytes.len().min(8)];
        let fold = |acc: u64, &b: &u8| (acc << 8) | b as u64;
        match self {
            ByteOrder::LittleEndian => bytes.iter().rev().fold(0, fold),
            ByteOrder::BigEndian => bytes.iter().fold(0, fold),
        }
    }
}

/// First `N` bytes of `bytes`, zero padded when the slice is shorter.
#[inline]
fn fixed<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let len = bytes.len().min(N);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}
