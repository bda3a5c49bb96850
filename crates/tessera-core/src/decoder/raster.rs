use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex, RwLock};

use image::imageops::{self, FilterType};
use image::{ImageError, ImageFormat, ImageReader, RgbaImage};
use tracing::debug;

use crate::consts::DEFAULT_MAX_TILE_SIZE;
use crate::error::DecodeError;
use crate::geometry::{SourceRect, Size};

use super::{
    subsampled_size, validate_region, Bitmap, DecoderState, ImageDecoder, SourceImageDescriptor,
};

/// Decoder for the still-image formats supported by the `image` crate.
///
/// `open` only parses the header. The `image` crate cannot decode a
/// sub-rectangle, so the first region request decodes the whole image into
/// an RGBA8 buffer (4 bytes per source pixel) that is shared between
/// workers and kept until `release`; each region is cropped from it and
/// resampled down to the requested sample size. Prefer a true region
/// decoder for sources whose full-resolution buffer does not fit in memory.
///
/// `release` never waits for a decode in progress. Such a decode finishes
/// in the background, returns [`DecodeError::Released`], and drops the
/// buffer with it.
pub struct RasterDecoder {
    state: RwLock<DecoderState<Arc<RasterSource>>>,
    max_tile_size: Size,
}

struct RasterSource {
    descriptor: SourceImageDescriptor,
    format: ImageFormat,
    encoded: Vec<u8>,
    pixels: Mutex<Option<Arc<RgbaImage>>>,
}

impl RasterDecoder {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DecoderState::Closed),
            max_tile_size: Size::new(DEFAULT_MAX_TILE_SIZE, DEFAULT_MAX_TILE_SIZE),
        }
    }

    pub fn with_max_tile_size(mut self, size: Size) -> Self {
        self.max_tile_size = size;
        self
    }

    /// Detected container format, once opened.
    pub fn format(&self) -> Option<ImageFormat> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.source().ok().map(|s| s.format)
    }
}

impl Default for RasterDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterSource {
    fn full_pixels(&self) -> Result<Arc<RgbaImage>, DecodeError> {
        let mut guard = self.pixels.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pixels) = guard.as_ref() {
            return Ok(Arc::clone(pixels));
        }

        debug!(format = ?self.format, width = self.descriptor.width, height = self.descriptor.height, "Decoding source pixels");
        let decoded = ImageReader::with_format(Cursor::new(&self.encoded[..]), self.format)
            .decode()
            .map_err(|e| map_image_error(e, &self.descriptor))?;
        let pixels = Arc::new(decoded.into_rgba8());
        *guard = Some(Arc::clone(&pixels));
        Ok(pixels)
    }
}

impl ImageDecoder for RasterDecoder {
    fn name(&self) -> &str {
        "raster"
    }

    fn open(&self, mut stream: Box<dyn Read + Send>) -> Result<SourceImageDescriptor, DecodeError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        match *state {
            DecoderState::Closed => {}
            DecoderState::Open(_) => return Err(DecodeError::AlreadyOpen),
            DecoderState::Released => return Err(DecodeError::Released),
        }

        let mut encoded = Vec::new();
        stream.read_to_end(&mut encoded)?;

        let reader = ImageReader::new(Cursor::new(&encoded[..])).with_guessed_format()?;
        let format = reader
            .format()
            .ok_or_else(|| DecodeError::Unsupported("unrecognized image signature".into()))?;
        let (width, height) = reader.into_dimensions().map_err(|e| {
            map_image_error(
                e,
                &SourceImageDescriptor {
                    width: 0,
                    height: 0,
                },
            )
        })?;

        if width == 0 || height == 0 {
            return Err(DecodeError::Corrupt(format!(
                "image reports empty dimensions {width}x{height}"
            )));
        }

        let descriptor = SourceImageDescriptor { width, height };
        *state = DecoderState::Open(Arc::new(RasterSource {
            descriptor,
            format,
            encoded,
            pixels: Mutex::new(None),
        }));
        Ok(descriptor)
    }

    fn decode_region(&self, rect: SourceRect, sample_size: u32) -> Result<Bitmap, DecodeError> {
        // Decode outside the state lock; `release` must not wait on it.
        let source = {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            let source = state.source()?;
            validate_region(&source.descriptor, &rect, sample_size)?;
            Arc::clone(source)
        };

        let pixels = source.full_pixels()?;
        let cropped =
            imageops::crop_imm(&*pixels, rect.left, rect.top, rect.width(), rect.height()).to_image();
        let bitmap = if sample_size == 1 {
            cropped
        } else {
            let out = subsampled_size(&rect, sample_size);
            imageops::resize(&cropped, out.width, out.height, FilterType::Triangle)
        };

        if !self.is_ready() {
            return Err(DecodeError::Released);
        }
        Ok(bitmap)
    }

    fn is_ready(&self) -> bool {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        matches!(*state, DecoderState::Open(_))
    }

    fn release(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = DecoderState::Released;
    }

    fn max_tile_size(&self) -> Size {
        self.max_tile_size
    }
}

fn map_image_error(err: ImageError, descriptor: &SourceImageDescriptor) -> DecodeError {
    match err {
        ImageError::Unsupported(e) => DecodeError::Unsupported(e.to_string()),
        ImageError::Limits(_) => DecodeError::OutOfMemory {
            width: descriptor.width,
            height: descriptor.height,
        },
        ImageError::IoError(e) => DecodeError::Io(e.to_string()),
        other => DecodeError::Corrupt(other.to_string()),
    }
}
