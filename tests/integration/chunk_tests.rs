//! Request coalescing integration tests.
//!
//! Tests verify:
//! - Opening a small file costs a single range request
//! - Concurrent tile reads share range requests
//! - Concurrent reads of contiguous chunks collapse into one request
//! - Every request is chunk aligned
//! - Resident chunks are never fetched again

use std::sync::Arc;

use futures::future::try_join_all;

use cog_inspect::{ByteOrder, ChunkConfig, ChunkedSource};

use super::test_utils::{open_tracked, tile_payload, two_level_cog};

#[tokio::test]
async fn test_small_file_opens_with_one_request() {
    let (reader, tiff) =
        open_tracked(two_level_cog(ByteOrder::LittleEndian, false), 64 * 1024).await;

    assert_eq!(reader.request_count(), 1);
    assert_eq!(reader.get_requests().await, vec![(0, tiff.source().size().unwrap() as usize)]);

    // Everything is resident now
    tiff.tile(1, 1, 0).await.unwrap();
    tiff.tile(0, 0, 1).await.unwrap();
    assert_eq!(reader.request_count(), 1);
}

#[tokio::test]
async fn test_requests_are_chunk_aligned() {
    let (reader, tiff) = open_tracked(two_level_cog(ByteOrder::BigEndian, true), 32).await;
    tiff.tile(1, 0, 0).await.unwrap();

    let requests = reader.get_requests().await;
    assert!(!requests.is_empty());
    for (offset, _) in requests {
        assert_eq!(offset % 32, 0, "request at {offset} is not chunk aligned");
    }
}

#[tokio::test]
async fn test_concurrent_tiles_share_requests() {
    let (reader, tiff) = open_tracked(two_level_cog(ByteOrder::LittleEndian, false), 16).await;
    tiff.image(0).unwrap().fetch_all_tags().await.unwrap();
    reader.reset_tracking().await;

    let tiles = try_join_all([(0, 0), (1, 0), (0, 1), (1, 1)].map(|(x, y)| tiff.tile(x, y, 0)))
        .await
        .unwrap();
    for (index, tile) in tiles.iter().enumerate() {
        assert_eq!(tile.bytes.to_vec(), tile_payload(index));
    }

    // The four payloads are contiguous, so they arrive in a single request
    assert_eq!(reader.request_count(), 1);

    // Second pass is served from resident chunks
    try_join_all([(0, 0), (1, 0), (0, 1), (1, 1)].map(|(x, y)| tiff.tile(x, y, 0)))
        .await
        .unwrap();
    assert_eq!(reader.request_count(), 1);
}

#[tokio::test]
async fn test_concurrent_reads_collapse_into_one_request() {
    let (reader, tiff) = open_tracked(two_level_cog(ByteOrder::BigEndian, true), 64 * 1024).await;
    let source = tiff.source();
    assert_eq!(reader.request_count(), 1);

    // A fresh source over the same store starts with nothing resident
    let cold = ChunkedSource::with_config(
        Arc::new(reader.clone()),
        ChunkConfig {
            chunk_size: 16,
            max_chunks_per_request: 32,
        },
    );
    reader.reset_tracking().await;
    let chunks = source.size().unwrap().min(16 * 32) / 16;
    try_join_all((0..chunks).map(|id| cold.ensure_loaded(id * 16, 1)))
        .await
        .unwrap();

    assert_eq!(reader.request_count(), 1);
    assert_eq!(reader.get_requests().await, vec![(0, chunks as usize * 16)]);
}

#[tokio::test]
async fn test_fetch_statistics() {
    let (reader, tiff) = open_tracked(two_level_cog(ByteOrder::LittleEndian, false), 16).await;
    tiff.tile(0, 0, 1).await.unwrap();

    let source = tiff.source();
    assert_eq!(source.fetch_count(), reader.request_count());
    let requested: usize = reader.get_requests().await.iter().map(|(_, len)| len).sum();
    assert_eq!(source.bytes_fetched(), requested as u64);
    assert!(source.resident_chunk_count() * 16 >= requested);
}
