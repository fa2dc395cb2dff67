//! Tile and strip retrieval integration tests.
//!
//! Tests verify:
//! - Tiles are addressed row-major and read with their exact byte range
//! - Sparse tiles come back empty and out of grid tiles are errors
//! - JPEG tiles get the shared tables merged in
//! - GDAL tile leaders replace the TileByteCounts lookup
//! - Strip images are read by strip index

use cog_inspect::error::ImageError;
use cog_inspect::{ByteOrder, Compression};

use super::test_utils::{
    is_valid_jpeg, open_tracked, tile_payload, two_level_cog, ImageBuilder, TiffBuilder, Value,
};

// =============================================================================
// Tiled Images
// =============================================================================

#[tokio::test]
async fn test_tiles_are_row_major() {
    let (_, tiff) = open_tracked(two_level_cog(ByteOrder::LittleEndian, false), 64).await;

    for (x, y, index) in [(0, 0, 0), (1, 0, 1), (0, 1, 2), (1, 1, 3)] {
        let tile = tiff.tile(x, y, 0).await.unwrap();
        assert_eq!(tile.bytes.to_vec(), tile_payload(index));
        assert_eq!(tile.compression, Compression::None);
        assert_eq!(tile.mime_type, "application/octet-stream");
    }

    let overview = tiff.tile(0, 0, 1).await.unwrap();
    assert_eq!(overview.bytes.to_vec(), tile_payload(10));
}

#[tokio::test]
async fn test_tile_outside_grid() {
    let (_, tiff) = open_tracked(two_level_cog(ByteOrder::LittleEndian, false), 64).await;

    let result = tiff.tile(2, 0, 0).await;
    assert!(matches!(
        result,
        Err(ImageError::TileOutOfRange {
            x: 2,
            y: 0,
            tiles_x: 2,
            tiles_y: 2
        })
    ));
    assert!(matches!(
        tiff.tile(0, 1, 1).await,
        Err(ImageError::TileOutOfRange { .. })
    ));
}

#[tokio::test]
async fn test_sparse_tile_is_empty() {
    let data = TiffBuilder::new()
        .add_image(ImageBuilder::tiled(
            512,
            512,
            256,
            1,
            vec![Some(tile_payload(0)), None, None, Some(tile_payload(3))],
        ))
        .build();
    let (_, tiff) = open_tracked(data, 64).await;

    let sparse = tiff.tile(1, 0, 0).await.unwrap();
    assert!(sparse.is_empty());
    assert_eq!(sparse.compression, Compression::None);

    assert_eq!(tiff.tile(1, 1, 0).await.unwrap().bytes.to_vec(), tile_payload(3));
}

#[tokio::test]
async fn test_edge_tiles_are_clamped() {
    let data = TiffBuilder::new()
        .add_image(ImageBuilder::tiled(300, 200, 256, 1, vec![None; 2]))
        .build();
    let (_, tiff) = open_tracked(data, 64).await;
    let image = &tiff.images()[0];

    let count = image.tile_count().unwrap();
    assert_eq!((count.x, count.y), (2, 1));

    let edge = image.tile_bounds(1, 0).unwrap();
    assert_eq!((edge.x, edge.width, edge.height), (256, 44, 200));
}

#[tokio::test]
async fn test_unsupported_compression() {
    let data = TiffBuilder::new()
        .add_image(ImageBuilder::tiled(256, 256, 256, 9999, vec![Some(tile_payload(0))]))
        .build();
    let (_, tiff) = open_tracked(data, 64).await;

    assert_eq!(tiff.images()[0].mime_type(), None);
    assert!(matches!(
        tiff.tile(0, 0, 0).await,
        Err(ImageError::UnsupportedCompression(Some(9999)))
    ));
}

// =============================================================================
// JPEG Tables
// =============================================================================

#[tokio::test]
async fn test_jpeg_tables_are_merged() {
    let tables = vec![0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x05, 0x00, 0x10, 0x20, 0xFF, 0xD9];
    let tile = vec![0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0x42, 0xFF, 0xD9];

    let data = TiffBuilder::new()
        .add_image(
            ImageBuilder::tiled(256, 256, 256, 7, vec![Some(tile)])
                .tag(347, Value::Undefined(tables)),
        )
        .build();
    let (_, tiff) = open_tracked(data, 64).await;

    let jpeg = tiff.tile(0, 0, 0).await.unwrap();
    assert_eq!(jpeg.mime_type, "image/jpeg");
    assert!(is_valid_jpeg(&jpeg.bytes));
    assert_eq!(
        jpeg.bytes.to_vec(),
        vec![
            0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x05, 0x00, 0x10, 0x20, // tables
            0xFF, 0xDA, 0x00, 0x02, 0x42, 0xFF, 0xD9, // scan
        ]
    );
}

#[tokio::test]
async fn test_jpeg_without_tables_is_untouched() {
    let tile = vec![0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0x42, 0xFF, 0xD9];
    let data = TiffBuilder::new()
        .add_image(ImageBuilder::tiled(256, 256, 256, 7, vec![Some(tile.clone())]))
        .build();
    let (_, tiff) = open_tracked(data, 64).await;

    assert_eq!(tiff.tile(0, 0, 0).await.unwrap().bytes.to_vec(), tile);
}

// =============================================================================
// Tile Leaders
// =============================================================================

/// Image whose TileByteCounts are deliberately wrong, so only a reader that
/// uses the leaders gets whole tiles back.
fn leader_file(ghost: &str) -> Vec<u8> {
    TiffBuilder::new()
        .with_ghost(ghost)
        .with_leaders(true)
        .add_image(
            ImageBuilder::tiled(
                512,
                256,
                256,
                1,
                vec![Some(tile_payload(0)), Some(tile_payload(1))],
            )
            .tag(325, Value::Long(vec![1, 1])),
        )
        .build()
}

#[tokio::test]
async fn test_tile_leader_gives_byte_count() {
    let (_, tiff) = open_tracked(
        leader_file("LAYOUT=IFDS_BEFORE_DATA\nBLOCK_LEADER=SIZE_AS_UINT4"),
        64,
    )
    .await;

    assert_eq!(tiff.options().tile_leader_byte_size(), 4);
    assert_eq!(tiff.tile(1, 0, 0).await.unwrap().bytes.to_vec(), tile_payload(1));
}

#[tokio::test]
async fn test_broken_layout_ignores_leaders() {
    let (_, tiff) = open_tracked(
        leader_file("BLOCK_LEADER=SIZE_AS_UINT4\nKNOWN_INCOMPATIBLE_EDITION=YES"),
        64,
    )
    .await;

    assert!(tiff.options().is_broken());
    assert_eq!(tiff.options().tile_leader_byte_size(), 0);
    let tile = tiff.tile(1, 0, 0).await.unwrap();
    assert_eq!(tile.bytes.len(), 1);
}

// =============================================================================
// Strip Images
// =============================================================================

#[tokio::test]
async fn test_strips() {
    let data = TiffBuilder::new()
        .with_byte_order(ByteOrder::BigEndian)
        .add_image(ImageBuilder::striped(
            64,
            32,
            16,
            1,
            vec![Some(tile_payload(0)), Some(tile_payload(1))],
        ))
        .build();
    let (_, tiff) = open_tracked(data, 64).await;
    let image = &tiff.images()[0];

    assert!(!image.is_tiled());
    assert_eq!(image.strip_count(), 2);
    assert_eq!(image.get_strip(1).await.unwrap().bytes.to_vec(), tile_payload(1));
    assert!(matches!(
        image.get_strip(2).await,
        Err(ImageError::StripOutOfRange { index: 2, count: 2 })
    ));
    assert!(matches!(image.get_tile(0, 0).await, Err(ImageError::NotTiled)));
}

#[tokio::test]
async fn test_strip_access_on_tiled_image() {
    let (_, tiff) = open_tracked(two_level_cog(ByteOrder::LittleEndian, false), 64).await;
    assert!(matches!(
        tiff.images()[0].get_strip(0).await,
        Err(ImageError::NotStriped)
    ));
}
