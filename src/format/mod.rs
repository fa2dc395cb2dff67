//! Cloud Optimized GeoTIFF structure.
//!
//! - [`tiff`]: header, IFD chain, tags and images
//! - [`ghost`]: GDAL layout options stored before the first IFD
//! - [`geokeys`]: GeoTIFF key directory decoding
//! - [`jpeg`]: stitching shared JPEG tables onto tile streams

pub mod geokeys;
pub mod ghost;
pub mod jpeg;
pub mod tiff;

pub use geokeys::{decode_geo_keys, geo_key_name, GeoKey, GeoValue};
pub use ghost::GhostOptions;
pub use tiff::{CogImage, CogTiff};
