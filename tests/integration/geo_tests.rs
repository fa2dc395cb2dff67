//! GeoTIFF metadata integration tests.
//!
//! Tests verify:
//! - GeoKeys are only available after they are loaded
//! - Inline, double and ASCII keys decode from a real key directory
//! - EPSG falls back from the projected to the geographic system
//! - GDAL no data and metadata tags are fetched on demand

use cog_inspect::error::ImageError;
use cog_inspect::{ByteOrder, GeoKey, GeoValue};

use super::test_utils::{open_tracked, ImageBuilder, TiffBuilder, Value};

/// Key directory with inline, double and ASCII records.
fn geo_file(byte_order: ByteOrder, big_tiff: bool, projected: u16) -> Vec<u8> {
    #[rustfmt::skip]
    let directory = vec![
        1, 1, 0, 5,
        1024, 0, 1, 2,               // GTModelType = geographic
        1026, 34737, 7, 0,           // GTCitation = "WGS 84"
        2048, 0, 1, 4326,            // GeographicType
        2057, 34736, 1, 0,           // GeogSemiMajorAxis
        3072, 0, 1, projected,       // ProjectedCSType
    ];

    TiffBuilder::new()
        .with_byte_order(byte_order)
        .with_bigtiff(big_tiff)
        .add_image(
            ImageBuilder::tiled(256, 256, 256, 1, vec![None])
                .geo([-180.0, 90.0], [0.5, 0.5])
                .tag(34735, Value::Short(directory))
                .tag(34736, Value::Double(vec![6378137.0]))
                .tag(34737, Value::Ascii("WGS 84|".to_string()))
                .tag(42112, Value::Ascii("<GDALMetadata>\n</GDALMetadata>".to_string()))
                .tag(42113, Value::Ascii("-9999".to_string())),
        )
        .build()
}

#[tokio::test]
async fn test_geo_keys_require_load() {
    let (_, tiff) = open_tracked(geo_file(ByteOrder::LittleEndian, false, 32767), 64).await;
    let image = &tiff.images()[0];

    assert!(matches!(image.geo_keys(), Err(ImageError::GeoKeysNotLoaded)));
    assert!(matches!(image.epsg(), Err(ImageError::GeoKeysNotLoaded)));

    image.load_geo_keys().await.unwrap();
    assert_eq!(image.geo_keys().unwrap().len(), 5);
}

#[tokio::test]
async fn test_geo_keys_decode_in_every_layout() {
    for (byte_order, big_tiff) in [
        (ByteOrder::LittleEndian, false),
        (ByteOrder::BigEndian, false),
        (ByteOrder::BigEndian, true),
    ] {
        let (_, tiff) = open_tracked(geo_file(byte_order, big_tiff, 32767), 64).await;
        tiff.load_geo_keys().await.unwrap();
        let image = &tiff.images()[0];

        assert_eq!(
            image.geo_key(GeoKey::GtModelType).unwrap(),
            Some(&GeoValue::Number(2.0))
        );
        assert_eq!(
            image.geo_key(GeoKey::GtCitation).unwrap(),
            Some(&GeoValue::Text("WGS 84".to_string()))
        );
        assert_eq!(
            image
                .geo_key(GeoKey::GeogSemiMajorAxis)
                .unwrap()
                .and_then(GeoValue::as_f64),
            Some(6378137.0)
        );
        assert_eq!(image.geo_key(GeoKey::VerticalCsType).unwrap(), None);
    }
}

#[tokio::test]
async fn test_epsg() {
    // User defined projection falls back to the geographic system
    let (_, tiff) = open_tracked(geo_file(ByteOrder::LittleEndian, false, 32767), 64).await;
    tiff.load_geo_keys().await.unwrap();
    assert_eq!(tiff.images()[0].epsg().unwrap(), Some(4326));

    let (_, tiff) = open_tracked(geo_file(ByteOrder::LittleEndian, false, 3857), 64).await;
    tiff.load_geo_keys().await.unwrap();
    assert_eq!(tiff.images()[0].epsg().unwrap(), Some(3857));
}

#[tokio::test]
async fn test_no_key_directory() {
    let data = TiffBuilder::new()
        .add_image(ImageBuilder::tiled(256, 256, 256, 1, vec![None]))
        .build();
    let (_, tiff) = open_tracked(data, 64).await;
    tiff.load_geo_keys().await.unwrap();

    let image = &tiff.images()[0];
    assert!(image.geo_keys().unwrap().is_empty());
    assert_eq!(image.epsg().unwrap(), None);
}

#[tokio::test]
async fn test_gdal_tags() {
    let (_, tiff) = open_tracked(geo_file(ByteOrder::LittleEndian, false, 32767), 64).await;
    let image = &tiff.images()[0];

    assert_eq!(image.gdal_nodata().await.unwrap().as_deref(), Some("-9999"));
    assert_eq!(
        image.gdal_metadata().await.unwrap(),
        Some(vec![
            "<GDALMetadata>".to_string(),
            "</GDALMetadata>".to_string()
        ])
    );
}

#[tokio::test]
async fn test_geo_bbox() {
    let (_, tiff) = open_tracked(geo_file(ByteOrder::LittleEndian, false, 32767), 64).await;
    let bbox = tiff.images()[0].bbox().unwrap();
    assert_eq!(
        (bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y),
        (-180.0, -38.0, -52.0, 90.0)
    );
}
