use thiserror::Error;

/// Failures reported by an [`ImageDecoder`](crate::decoder::ImageDecoder).
///
/// The first five variants are the backend failure taxonomy; the rest are
/// contract violations a well-behaved caller never triggers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unsupported image format: {0}")]
    Unsupported(String),

    #[error("Corrupt image data: {0}")]
    Corrupt(String),

    #[error("I/O error while reading image stream: {0}")]
    Io(String),

    #[error("Out of memory decoding {width}x{height} region")]
    OutOfMemory { width: u32, height: u32 },

    #[error("Decode cancelled")]
    Cancelled,

    #[error("Decoder has been released")]
    Released,

    #[error("Decoder has not been opened")]
    NotOpen,

    #[error("Decoder is already open")]
    AlreadyOpen,

    #[error("Region ({left},{top})-({right},{bottom}) exceeds source {width}x{height}")]
    OutOfBounds {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
        width: u32,
        height: u32,
    },

    #[error("Sample size {0} is not a power of two")]
    InvalidSampleSize(u32),
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum TesseraError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Viewport has no area: {width}x{height}")]
    EmptyViewport { width: u32, height: u32 },

    #[error("Worker pool error: {0}")]
    ThreadPool(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, TesseraError>;
