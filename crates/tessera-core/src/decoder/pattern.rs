use std::io::Read;
use std::sync::RwLock;

use image::Rgba;

use crate::consts::{DEFAULT_MAX_TILE_SIZE, PATTERN_CELL_SIZE};
use crate::error::DecodeError;
use crate::geometry::{SourceRect, Size};

use super::{
    subsampled_size, validate_region, Bitmap, DecoderState, ImageDecoder, SourceImageDescriptor,
};

/// Procedural source of arbitrary size.
///
/// Pixels are computed on demand, so a 100-megapixel "image" costs nothing
/// until a region is requested. The stream passed to `open` is ignored.
pub struct PatternDecoder {
    width: u32,
    height: u32,
    cell_size: u32,
    max_tile_size: Size,
    state: RwLock<DecoderState<SourceImageDescriptor>>,
}

impl PatternDecoder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cell_size: PATTERN_CELL_SIZE,
            max_tile_size: Size::new(DEFAULT_MAX_TILE_SIZE, DEFAULT_MAX_TILE_SIZE),
            state: RwLock::new(DecoderState::Closed),
        }
    }

    pub fn with_cell_size(mut self, cell_size: u32) -> Self {
        self.cell_size = cell_size.max(1);
        self
    }

    pub fn with_max_tile_size(mut self, size: Size) -> Self {
        self.max_tile_size = size;
        self
    }

    /// Colour of the full-resolution source pixel at (`x`, `y`).
    pub fn pixel_at(&self, x: u32, y: u32) -> Rgba<u8> {
        let cell = (x / self.cell_size + y / self.cell_size) % 2;
        let gx = (x as u64 * 255 / self.width.max(1) as u64) as u8;
        let gy = (y as u64 * 255 / self.height.max(1) as u64) as u8;
        if cell == 0 {
            Rgba([gx, gy, 200, 255])
        } else {
            Rgba([255 - gx / 2, 60, gy / 2, 255])
        }
    }
}

impl ImageDecoder for PatternDecoder {
    fn name(&self) -> &str {
        "pattern"
    }

    fn open(&self, _stream: Box<dyn Read + Send>) -> Result<SourceImageDescriptor, DecodeError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        match *state {
            DecoderState::Closed => {}
            DecoderState::Open(_) => return Err(DecodeError::AlreadyOpen),
            DecoderState::Released => return Err(DecodeError::Released),
        }
        if self.width == 0 || self.height == 0 {
            return Err(DecodeError::Corrupt(format!(
                "pattern has empty dimensions {}x{}",
                self.width, self.height
            )));
        }

        let descriptor = SourceImageDescriptor {
            width: self.width,
            height: self.height,
        };
        *state = DecoderState::Open(descriptor);
        Ok(descriptor)
    }

    fn decode_region(&self, rect: SourceRect, sample_size: u32) -> Result<Bitmap, DecodeError> {
        let descriptor = {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            *state.source()?
        };
        validate_region(&descriptor, &rect, sample_size)?;

        let out = subsampled_size(&rect, sample_size);
        let half = sample_size / 2;
        let bitmap = Bitmap::from_fn(out.width, out.height, |ox, oy| {
            // Sample the centre of each sample_size x sample_size block.
            let sx = (rect.left + ox * sample_size + half).min(rect.right - 1);
            let sy = (rect.top + oy * sample_size + half).min(rect.bottom - 1);
            self.pixel_at(sx, sy)
        });
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
