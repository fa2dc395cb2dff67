//! A whole Cloud Optimized GeoTIFF.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info};

use super::image::{CogImage, TileData};
use super::parser::{read_header, read_ifds, TiffHeader, TiffVersion};
use crate::error::{ImageError, IoError, TiffError};
use crate::format::ghost::GhostOptions;
use crate::io::{ByteOrder, ChunkConfig, ChunkedSource, RangeReader};

/// An opened TIFF file: its header, GDAL layout options and images.
///
/// Images are in IFD chain order. Image 0 is the full resolution image and
/// the rest are usually its overviews.
#[derive(Debug)]
pub struct CogTiff {
    source: ChunkedSource,
    header: TiffHeader,
    options: GhostOptions,
    images: Vec<Arc<CogImage>>,
}

impl CogTiff {
    /// Open a TIFF from a byte range store.
    pub async fn open(reader: Arc<dyn RangeReader>, config: ChunkConfig) -> Result<Self, TiffError> {
        Self::from_source(ChunkedSource::with_config(reader, config)).await
    }

    /// Open a TIFF over an existing chunked source.
    ///
    /// Parses the header, the ghost area and the IFD chain, then loads the
    /// structural tags of every image in one concurrent round.
    pub async fn from_source(source: ChunkedSource) -> Result<Self, TiffError> {
        let header = read_header(&source).await?;

        let (ifds, options) = futures::try_join!(read_ifds(&source, &header), async {
            GhostOptions::read(&source, &header)
                .await
                .map_err(TiffError::from)
        })?;

        let leader_size = options.tile_leader_byte_size();

        let mut images: Vec<Arc<CogImage>> = Vec::with_capacity(ifds.len());
        for ifd in ifds {
            let base = images.first().cloned();
            images.push(Arc::new(CogImage::new(
                ifd.index,
                ifd.tags,
                source.clone(),
                leader_size,
                base,
            )));
        }

        try_join_all(images.iter().map(|image| image.init(false))).await?;

        info!(
            source = source.identifier(),
            version = header.version().name(),
            images = images.len(),
            cog_optimized = options.is_cog_optimized(),
            "Opened TIFF"
        );

        Ok(Self {
            source,
            header,
            options,
            images,
        })
    }

    pub fn version(&self) -> TiffVersion {
        self.header.version()
    }

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// GDAL layout options from the ghost area.
    pub fn options(&self) -> &GhostOptions {
        &self.options
    }

    pub fn images(&self) -> &[Arc<CogImage>] {
        &self.images
    }

    pub fn image(&self, index: usize) -> Option<&Arc<CogImage>> {
        self.images.get(index)
    }

    /// Chunked source the document reads through.
    pub fn source(&self) -> &ChunkedSource {
        &self.source
    }

    pub fn identifier(&self) -> &str {
        self.source.identifier()
    }

    /// Decode the GeoKeys of every image.
    pub async fn load_geo_keys(&self) -> Result<(), ImageError> {
        try_join_all(self.images.iter().map(|image| image.load_geo_keys())).await?;
        Ok(())
    }

    /// Read tile `(x, y)` of image `z`.
    pub async fn tile(&self, x: u32, y: u32, z: usize) -> Result<TileData, ImageError> {
        let image = self.image(z).ok_or(ImageError::ImageNotFound {
            index: z,
            count: self.images.len(),
        })?;
        image.get_tile(x, y).await
    }

    /// Release the underlying store. The parsed structure stays usable.
    pub async fn close(&self) -> Result<(), IoError> {
        debug!(source = self.source.identifier(), "Closing TIFF");
        self.source.close().await
    }
}
