use thiserror::Error;

/// I/O errors that can occur when reading byte ranges from a store
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Local file system error
    #[error("File error: {0}")]
    File(String),

    /// Remote answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Http { status: u16, url: String },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Store returned fewer bytes than the range needs
    #[error("Short read: expected {expected} bytes at offset {offset}, got {actual}")]
    ShortRead {
        offset: u64,
        expected: u64,
        actual: u64,
    },

    /// Synchronous access to a byte range whose chunk is not resident
    #[error("Bytes {offset}..{} are not loaded", offset + length)]
    ChunkNotLoaded { offset: u64, length: u64 },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Errors that can occur when parsing the TIFF structure.
///
/// Everything here except `UnknownFieldType` is fatal for opening a document.
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// The IFD chain is longer than the parser accepts
    #[error("Too many IFDs: chain exceeds {0} directories")]
    TooManyIfds(usize),

    /// The IFD chain points back to a directory already read
    #[error("IFD chain loops back to offset {0}")]
    IfdCycle(u64),

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// Loading an image's structural tags failed while opening
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
}

/// Errors raised by a single image: geometry, tag access and tile/strip reads.
///
/// These are scoped to the request that raised them; other tags and tiles of the
/// same image stay usable.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    /// I/O error while reading tag values or tile bytes
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Image index beyond the document's image list
    #[error("Image {index} not found, document has {count} images")]
    ImageNotFound { index: usize, count: usize },

    /// Neither the image nor its base image carry a geotransform
    #[error("Image {0} does not have a geo transformation")]
    NoGeoTransform(usize),

    /// Tile coordinates beyond the image's tile grid
    #[error("Tile ({x}, {y}) is outside of range {tiles_x}x{tiles_y}")]
    TileOutOfRange {
        x: u32,
        y: u32,
        tiles_x: u32,
        tiles_y: u32,
    },

    /// Linear tile index beyond the offsets array
    #[error("Tile index {index} is outside of range 0..{count}")]
    TileIndexOutOfRange { index: u64, count: u64 },

    /// Strip index beyond the strip arrays
    #[error("Strip index {index} is outside of range 0..{count}")]
    StripOutOfRange { index: u64, count: u64 },

    /// Tile access on a strip-organized image
    #[error("Image is not tiled")]
    NotTiled,

    /// Strip access on a tiled image
    #[error("Cannot read strips, image is tiled")]
    NotStriped,

    /// Compression code with no known payload type
    #[error("Unsupported compression: {}", .0.map(|c| c.to_string()).unwrap_or_else(|| "missing".to_string()))]
    UnsupportedCompression(Option<u16>),

    /// Geo keys were read before `load_geo_keys` completed
    #[error("Geo keys have not been loaded, call load_geo_keys() first")]
    GeoKeysNotLoaded,

    /// Tag value lives out of line and has not been fetched yet
    #[error("Tag {0} is not loaded")]
    TagNotLoaded(&'static str),

    /// Required tag is missing from the IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },
}

/// Crate-wide result for document level operations
pub type CogResult<T> = Result<T, TiffError>;
