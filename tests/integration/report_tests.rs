//! Report integration tests.
//!
//! Tests verify:
//! - Reports describe every image of a pyramid
//! - Out-of-line tags stay unloaded unless fetching is requested
//! - JSON and text renderings carry the gathered values

use cog_inspect::report::NOT_LOADED;
use cog_inspect::{ByteOrder, DocumentReport, ReportOptions};

use super::test_utils::{open_tracked, two_level_cog, ImageBuilder, TiffBuilder};

#[tokio::test]
async fn test_summary_report() {
    let (_, tiff) = open_tracked(two_level_cog(ByteOrder::BigEndian, true), 64).await;
    let report = DocumentReport::build(&tiff, ReportOptions::default())
        .await
        .unwrap();

    assert_eq!(report.source, "mock://test.tif");
    assert_eq!(report.version, "BigTIFF");
    assert_eq!(report.version_code, 43);
    assert_eq!(report.byte_order, "big-endian");
    assert_eq!(report.images.len(), 2);

    let overview = &report.images[1];
    assert_eq!(overview.resolution, Some([4.0, -4.0, 0.0]));
    assert_eq!(overview.tile_count.map(|c| c.total()), Some(1));
    assert!(overview.tags.is_none());
    assert!(overview.tile_stats.is_none());
    assert!(report.chunks.fetches > 0);
}

#[tokio::test]
async fn test_tag_dump_without_fetch() {
    let (_, tiff) = open_tracked(two_level_cog(ByteOrder::LittleEndian, false), 64).await;
    let options = ReportOptions {
        tags: true,
        ..Default::default()
    };
    let report = DocumentReport::build(&tiff, options).await.unwrap();

    let tags = report.images[0].tags.as_ref().unwrap();
    let offsets = tags.iter().find(|t| t.id == 324).unwrap();
    assert_eq!(offsets.name, "TileOffsets");
    assert!(!offsets.loaded);
    assert_eq!(offsets.value, None);

    let width = tags.iter().find(|t| t.id == 256).unwrap();
    assert!(width.loaded);
    assert_eq!(width.value.as_deref(), Some("512"));

    assert!(report.to_text().contains(NOT_LOADED));
}

#[tokio::test]
async fn test_fetch_tags_and_tile_stats() {
    let data = TiffBuilder::new()
        .add_image(ImageBuilder::tiled(
            512,
            256,
            256,
            1,
            vec![Some(vec![1; 10]), None],
        ))
        .build();
    let (_, tiff) = open_tracked(data, 64).await;
    let options = ReportOptions {
        tags: true,
        fetch_tags: true,
        tile_stats: true,
    };
    let report = DocumentReport::build(&tiff, options).await.unwrap();
    let image = &report.images[0];

    assert!(image.tags.as_ref().unwrap().iter().all(|t| t.loaded));

    let stats = image.tile_stats.as_ref().unwrap();
    assert_eq!(stats.tiles, 2);
    assert_eq!(stats.sparse, 1);
    assert_eq!(stats.total_bytes, 10);
    assert_eq!(stats.max_bytes, 10);
}

#[tokio::test]
async fn test_leader_size_follows_layout_state() {
    for (ghost, expected) in [
        ("LAYOUT=IFDS_BEFORE_DATA\nBLOCK_LEADER=SIZE_AS_UINT4", 4),
        ("BLOCK_LEADER=SIZE_AS_UINT4\nKNOWN_INCOMPATIBLE_EDITION=YES", 0),
    ] {
        let data = TiffBuilder::new()
            .with_ghost(ghost)
            .with_leaders(true)
            .add_image(ImageBuilder::tiled(256, 256, 256, 1, vec![Some(vec![7; 4])]))
            .build();
        let (_, tiff) = open_tracked(data, 64).await;
        let report = DocumentReport::build(&tiff, ReportOptions::default())
            .await
            .unwrap();

        assert_eq!(report.ghost.tile_leader_byte_size, expected, "{ghost}");
        assert_eq!(report.ghost.broken, expected == 0);
    }
}

#[tokio::test]
async fn test_json_rendering() {
    let (_, tiff) = open_tracked(two_level_cog(ByteOrder::LittleEndian, false), 64).await;
    let report = DocumentReport::build(&tiff, ReportOptions::default())
        .await
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["version"], "TIFF");
    assert_eq!(json["images"][0]["size"]["width"], 512);
    assert_eq!(json["images"][0]["bbox"]["min_x"], 100.0);
    assert_eq!(json["images"][1]["origin"][1], 900.0);
    assert!(json["images"][0].get("tags").is_none());
}
