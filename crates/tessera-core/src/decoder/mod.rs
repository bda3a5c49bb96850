//! Pluggable region-decoding backends.
//!
//! The renderer never parses image formats itself. It talks to a single
//! [`ImageDecoder`] capability, chosen by the host at construction, that can
//! report the native dimensions of a stream and decode any sub-rectangle at
//! a power-of-two subsampling factor.

mod pattern;
mod raster;

use std::io::Read;

use crate::consts::DEFAULT_MAX_TILE_SIZE;
use crate::error::DecodeError;
use crate::geometry::{SourceRect, Size};

pub use pattern::PatternDecoder;
pub use raster::RasterDecoder;

/// Decoded tile pixels, RGBA8.
pub type Bitmap = image::RgbaImage;

/// Native dimensions of the source, established once by a successful open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceImageDescriptor {
    pub width: u32,
    pub height: u32,
}

impl SourceImageDescriptor {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn bounds(&self) -> SourceRect {
        SourceRect::full(self.width, self.height)
    }
}

/// Region decoding capability consumed by the renderer.
///
/// Every method takes `&self`: implementations are shared between the owner
/// thread and the decode workers behind an `Arc`, and keep their own
/// lifecycle state internally.
pub trait ImageDecoder: Send + Sync {
    /// Short human-readable backend name, used in logs.
    fn name(&self) -> &str;

    /// Consume `stream` and report the source dimensions.
    ///
    /// Callable once per instance. Fails with `Unsupported` for unknown
    /// formats and `Corrupt` for unreadable or zero-sized images.
    fn open(&self, stream: Box<dyn Read + Send>) -> Result<SourceImageDescriptor, DecodeError>;

    /// Decode `rect` (full-resolution coordinates) downsampled by
    /// `sample_size`. The output is roughly `rect / sample_size` pixels.
    fn decode_region(&self, rect: SourceRect, sample_size: u32) -> Result<Bitmap, DecodeError>;

    /// True between a successful `open` and `release`.
    fn is_ready(&self) -> bool;

    /// Drop backend resources. Idempotent; later decodes fail with
    /// [`DecodeError::Released`].
    fn release(&self);

    /// Whether `decode_region` may be called from several threads at once.
    fn supports_concurrent_decode(&self) -> bool {
        true
    }

    /// Largest decoded tile the backend accepts, in output pixels.
    fn max_tile_size(&self) -> Size {
        Size::new(DEFAULT_MAX_TILE_SIZE, DEFAULT_MAX_TILE_SIZE)
    }
}

/// Check the `decode_region` preconditions shared by every backend.
pub fn validate_region(
    descriptor: &SourceImageDescriptor,
    rect: &SourceRect,
    sample_size: u32,
) -> Result<(), DecodeError> {
    if !sample_size.is_power_of_two() {
        return Err(DecodeError::InvalidSampleSize(sample_size));
    }
    if !rect.fits_within(descriptor.width, descriptor.height) {
        return Err(DecodeError::OutOfBounds {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
            width: descriptor.width,
            height: descriptor.height,
        });
    }
    Ok(())
}

/// Output dimensions of a region decoded at `sample_size`.
pub fn subsampled_size(rect: &SourceRect, sample_size: u32) -> Size {
    Size::new(
        rect.width().div_ceil(sample_size).max(1),
        rect.height().div_ceil(sample_size).max(1),
    )
}

/// Lifecycle shared by the bundled backends.
#[derive(Debug)]
pub(crate) enum DecoderState<T> {
    Closed,
    Open(T),
    Released,
}

impl<T> DecoderState<T> {
    pub(crate) fn source(&self) -> Result<&T, DecodeError> {
        match self {
            Self::Open(source) => Ok(source),
            Self::Closed => Err(DecodeError::NotOpen),
            Self::Released => Err(DecodeError::Released),
        }
    }
}
