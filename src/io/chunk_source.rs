use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use futures::future::{try_join_all, BoxFuture, Shared};
use futures::FutureExt;
use tracing::{debug, warn};

use super::{ByteOrder, RangeReader};
use crate::error::IoError;

/// Default chunk size: 32KB
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Default upper bound on chunks merged into a single range request.
pub const DEFAULT_MAX_CHUNKS_PER_REQUEST: usize = 32;

/// Longest single read accepted when the store does not know its size: 1GB
pub const MAX_UNSIZED_READ: u64 = 1024 * 1024 * 1024;

/// Chunking parameters for a [`ChunkedSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Size of each chunk in bytes
    pub chunk_size: usize,
    /// Longest contiguous run of chunks fetched with one request
    pub max_chunks_per_request: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunks_per_request: DEFAULT_MAX_CHUNKS_PER_REQUEST,
        }
    }
}

type BatchFuture = Shared<BoxFuture<'static, Result<(), IoError>>>;

#[derive(Default)]
struct ChunkState {
    /// Resident chunks, never evicted
    chunks: HashMap<u64, Bytes>,
    /// Chunk ids waiting for the open batch to dispatch
    queued: BTreeSet<u64>,
    /// Batch still accepting chunk ids
    open_batch: Option<BatchFuture>,
    /// Batch each pending chunk id belongs to
    in_flight: HashMap<u64, BatchFuture>,
}

struct Inner {
    reader: Arc<dyn RangeReader>,
    config: ChunkConfig,
    state: Mutex<ChunkState>,
    fetch_count: AtomicUsize,
    bytes_fetched: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ChunkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Chunk-caching layer that wraps any RangeReader.
///
/// The resource is split into fixed-size chunks (`id = offset / chunk_size`).
/// Each chunk goes from absent to pending to resident exactly once and is kept
/// for the lifetime of the source.
///
/// Reads are coalesced: every chunk requested before the open batch gets to run
/// joins that batch. The batch is a spawned task that yields once to the
/// scheduler, then drains its queue, groups the ids into contiguous runs (split
/// at `max_chunks_per_request`) and issues one range request per run. Callers
/// waiting on the same batch all observe its single outcome. A failed batch
/// caches nothing, so reissuing the read retries the fetch.
///
/// After [`ensure_loaded`](Self::ensure_loaded) the synchronous accessors
/// ([`bytes`](Self::bytes), [`byte`](Self::byte), [`uint`](Self::uint)) can read
/// the covered range without I/O.
#[derive(Clone)]
pub struct ChunkedSource {
    inner: Arc<Inner>,
}

impl ChunkedSource {
    /// Wrap a reader using the default 32KB chunks.
    pub fn new(reader: Arc<dyn RangeReader>) -> Self {
        Self::with_config(reader, ChunkConfig::default())
    }

    /// Wrap a reader with custom chunking parameters.
    ///
    /// Zero values are raised to 1.
    pub fn with_config(reader: Arc<dyn RangeReader>, config: ChunkConfig) -> Self {
        let config = ChunkConfig {
            chunk_size: config.chunk_size.max(1),
            max_chunks_per_request: config.max_chunks_per_request.max(1),
        };
        Self {
            inner: Arc::new(Inner {
                reader,
                config,
                state: Mutex::new(ChunkState::default()),
                fetch_count: AtomicUsize::new(0),
                bytes_fetched: AtomicU64::new(0),
            }),
        }
    }

    /// Identifier of the underlying resource.
    pub fn identifier(&self) -> &str {
        self.inner.reader.identifier()
    }

    /// Size of the underlying resource, if the store knows it.
    pub fn size(&self) -> Option<u64> {
        self.inner.reader.size()
    }

    /// Chunk size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.inner.config.chunk_size
    }

    /// Chunking parameters in use.
    pub fn config(&self) -> ChunkConfig {
        self.inner.config
    }

    /// Number of range requests issued to the underlying reader.
    pub fn fetch_count(&self) -> usize {
        self.inner.fetch_count.load(Ordering::SeqCst)
    }

    /// Total bytes returned by the underlying reader.
    pub fn bytes_fetched(&self) -> u64 {
        self.inner.bytes_fetched.load(Ordering::SeqCst)
    }

    /// Number of chunks currently cached.
    pub fn resident_chunk_count(&self) -> usize {
        self.inner.lock().chunks.len()
    }

    #[inline]
    fn chunk_range(&self, offset: u64, length: u64) -> (u64, u64) {
        let chunk_size = self.inner.config.chunk_size as u64;
        let last_byte = offset.saturating_add(length.saturating_sub(1));
        (offset / chunk_size, last_byte / chunk_size)
    }

    /// Reject `[offset, offset + length)` when it overflows or ends past the
    /// resource, before any chunk id is recorded for it.
    fn check_bounds(&self, offset: u64, length: u64) -> Result<(), IoError> {
        let size = self.size();
        let refused = match (offset.checked_add(length), size) {
            (None, _) => true,
            (Some(end), Some(size)) => end > size,
            (Some(_), None) => length > MAX_UNSIZED_READ,
        };
        if refused {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: length,
                size: size.unwrap_or(MAX_UNSIZED_READ),
            });
        }
        Ok(())
    }

    /// Whether every chunk covering `[offset, offset + length)` is resident.
    pub fn has(&self, offset: u64, length: u64) -> bool {
        if length == 0 {
            return true;
        }
        let (first, last) = self.chunk_range(offset, length);
        let state = self.inner.lock();
        (first..=last).all(|id| state.chunks.contains_key(&id))
    }

    /// Make the chunks covering `[offset, offset + length)` resident.
    ///
    /// Chunks already resident are not fetched again; chunks already pending
    /// are awaited on the batch that owns them. Ranges ending past a known
    /// size fail with `RangeOutOfBounds` without touching the store.
    pub async fn ensure_loaded(&self, offset: u64, length: u64) -> Result<(), IoError> {
        if length == 0 {
            return Ok(());
        }
        self.check_bounds(offset, length)?;
        let (first, last) = self.chunk_range(offset, length);

        let waits = {
            let mut state = self.inner.lock();
            let mut waits: Vec<BatchFuture> = Vec::new();
            for id in first..=last {
                if state.chunks.contains_key(&id) {
                    continue;
                }
                if let Some(batch) = state.in_flight.get(&id) {
                    waits.push(batch.clone());
                    continue;
                }
                let batch = match &state.open_batch {
                    Some(batch) => batch.clone(),
                    None => {
                        let batch = Self::new_batch(self.inner.clone());
                        state.open_batch = Some(batch.clone());
                        batch
                    }
                };
                state.queued.insert(id);
                state.in_flight.insert(id, batch.clone());
                waits.push(batch);
            }
            waits
        };

        for batch in waits {
            batch.await?;
        }
        Ok(())
    }

    /// Open a batch whose drain runs as its own task.
    ///
    /// Callers await the task's outcome and never poll the drain itself.
    fn new_batch(inner: Arc<Inner>) -> BatchFuture {
        let drain = tokio::spawn(async move {
            // Let every read started in this scheduling turn join the batch.
            tokio::task::yield_now().await;

            let ids: Vec<u64> = {
                let mut state = inner.lock();
                state.open_batch = None;
                std::mem::take(&mut state.queued).into_iter().collect()
            };

            let result = fetch_batch(&inner, &ids).await;

            let mut state = inner.lock();
            for id in &ids {
                state.in_flight.remove(id);
            }
            result.map(|chunks| state.chunks.extend(chunks))
        });

        drain
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(IoError::Connection(format!("chunk fetch task failed: {e}")))
                })
            })
            .boxed()
            .shared()
    }

    /// Read `[offset, offset + length)` from resident chunks.
    ///
    /// Fails with `ChunkNotLoaded` when a covering chunk is not resident.
    pub fn bytes(&self, offset: u64, length: u64) -> Result<Bytes, IoError> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        let not_loaded = || IoError::ChunkNotLoaded { offset, length };
        if offset.checked_add(length).is_none() {
            return Err(not_loaded());
        }
        let chunk_size = self.inner.config.chunk_size as u64;
        let (first, last) = self.chunk_range(offset, length);
        let state = self.inner.lock();

        if first == last {
            // Single chunk read (common case)
            let chunk = state.chunks.get(&first).ok_or_else(not_loaded)?;
            let start = (offset - first * chunk_size) as usize;
            let end = start + length as usize;
            if end > chunk.len() {
                return Err(not_loaded());
            }
            return Ok(chunk.slice(start..end));
        }

        if !(first..=last).all(|id| state.chunks.contains_key(&id)) {
            return Err(not_loaded());
        }
        let mut result = BytesMut::with_capacity(length as usize);
        let mut remaining = length as usize;
        let mut current = offset;
        for id in first..=last {
            let chunk = state.chunks.get(&id).ok_or_else(not_loaded)?;
            let start = (current - id * chunk_size) as usize;
            let take = chunk.len().saturating_sub(start).min(remaining);
            if take == 0 {
                return Err(not_loaded());
            }
            result.extend_from_slice(&chunk[start..start + take]);
            remaining -= take;
            current += take as u64;
        }
        if remaining > 0 {
            return Err(not_loaded());
        }
        Ok(result.freeze())
    }

    /// Read a single resident byte.
    pub fn byte(&self, offset: u64) -> Result<u8, IoError> {
        Ok(self.bytes(offset, 1)?[0])
    }

    /// Read a resident unsigned integer of `width` bytes (1, 2, 4 or 8).
    pub fn uint(&self, offset: u64, width: usize, byte_order: ByteOrder) -> Result<u64, IoError> {
        let bytes = self.bytes(offset, width.min(8) as u64)?;
        Ok(byte_order.read_uint(&bytes))
    }

    /// Load and return `[offset, offset + length)`.
    pub async fn read(&self, offset: u64, length: u64) -> Result<Bytes, IoError> {
        self.ensure_loaded(offset, length).await?;
        self.bytes(offset, length)
    }

    /// Release the underlying reader. Resident chunks stay readable.
    pub async fn close(&self) -> Result<(), IoError> {
        self.inner.reader.close().await
    }
}

impl std::fmt::Debug for ChunkedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedSource")
            .field("identifier", &self.identifier())
            .field("chunk_size", &self.chunk_size())
            .field("fetch_count", &self.fetch_count())
            .finish()
    }
}

/// Group sorted chunk ids into `(first_id, chunk_count)` runs.
///
/// A run only covers consecutive ids and never exceeds `max_chunks` chunks.
pub fn group_runs(ids: &[u64], max_chunks: usize) -> Vec<(u64, u64)> {
    let max_chunks = max_chunks.max(1) as u64;
    let mut runs: Vec<(u64, u64)> = Vec::new();
    for &id in ids {
        match runs.last_mut() {
            Some((first, count)) if *first + *count == id && *count < max_chunks => *count += 1,
            _ => runs.push((id, 1)),
        }
    }
    runs
}

async fn fetch_batch(inner: &Inner, ids: &[u64]) -> Result<Vec<(u64, Bytes)>, IoError> {
    let runs = group_runs(ids, inner.config.max_chunks_per_request);
    if runs.len() > 1 {
        warn!(
            source = inner.reader.identifier(),
            chunks = ids.len(),
            requests = runs.len(),
            "Chunk batch needs several range requests"
        );
    }
    let fetched = try_join_all(
        runs.iter()
            .map(|&(first, count)| fetch_run(inner, first, count)),
    )
    .await?;
    Ok(fetched.into_iter().flatten().collect())
}

async fn fetch_run(inner: &Inner, first: u64, count: u64) -> Result<Vec<(u64, Bytes)>, IoError> {
    let chunk_size = inner.config.chunk_size as u64;
    let offset = first * chunk_size;
    let mut length = count * chunk_size;
    if let Some(size) = inner.reader.size() {
        if offset >= size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: length,
                size,
            });
        }
        length = length.min(size - offset);
    }

    debug!(
        source = inner.reader.identifier(),
        first_chunk = first,
        last_chunk = first + count - 1,
        chunks = count,
        bytes = length,
        "Fetching chunk range"
    );

    let bytes = inner.reader.read_exact_at(offset, length as usize).await?;
    inner.fetch_count.fetch_add(1, Ordering::SeqCst);
    inner
        .bytes_fetched
        .fetch_add(bytes.len() as u64, Ordering::SeqCst);

    // Without a known size a short answer just means the resource ended
    if inner.reader.size().is_some() && (bytes.len() as u64) < length {
        return Err(IoError::ShortRead {
            offset,
            expected: length,
            actual: bytes.len() as u64,
        });
    }

    let mut chunks = Vec::with_capacity(count as usize);
    for i in 0..count {
        let start = (i * chunk_size) as usize;
        if start >= bytes.len() {
            break;
        }
        let end = (start + chunk_size as usize).min(bytes.len());
        chunks.push((first + i, bytes.slice(start..end)));
    }
    Ok(chunks)
}
