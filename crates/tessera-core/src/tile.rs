use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::decoder::Bitmap;
use crate::geometry::{RectF, SourceRect};

/// One rectangular region of the source at one pyramid level.
///
/// `source_rect` and `sample_size` are fixed at creation. The remaining
/// fields are each independently replaceable so decode workers can publish
/// results while the owner thread keeps reading them every frame.
#[derive(Debug)]
pub struct Tile {
    sample_size: u32,
    source_rect: SourceRect,
    screen_rect: Mutex<RectF>,
    bitmap: Mutex<Option<Arc<Bitmap>>>,
    visible: AtomicBool,
    loading: AtomicBool,
    error: AtomicBool,
}

/// Point-in-time copy of a tile's mutable flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileStatus {
    pub visible: bool,
    pub loading: bool,
    pub error: bool,
    pub has_bitmap: bool,
}

impl Tile {
    pub fn new(sample_size: u32, source_rect: SourceRect, visible: bool) -> Self {
        Self {
            sample_size,
            source_rect,
            screen_rect: Mutex::new(RectF::default()),
            bitmap: Mutex::new(None),
            visible: AtomicBool::new(visible),
            loading: AtomicBool::new(false),
            error: AtomicBool::new(false),
        }
    }

    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    pub fn source_rect(&self) -> SourceRect {
        self.source_rect
    }

    /// Screen projection computed by the most recent draw.
    pub fn screen_rect(&self) -> RectF {
        *self.screen_rect.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_screen_rect(&self, rect: RectF) {
        *self.screen_rect.lock().unwrap_or_else(|e| e.into_inner()) = rect;
    }

    pub fn bitmap(&self) -> Option<Arc<Bitmap>> {
        self.bitmap.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn has_bitmap(&self) -> bool {
        self.bitmap.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub fn set_bitmap(&self, bitmap: Option<Arc<Bitmap>>) {
        *self.bitmap.lock().unwrap_or_else(|e| e.into_inner()) = bitmap;
    }

    /// Drop the decoded pixels, returning whether any were held.
    pub fn free_bitmap(&self) -> bool {
        self.bitmap
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Release);
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::Release);
    }

    pub fn is_error(&self) -> bool {
        self.error.load(Ordering::Acquire)
    }

    pub fn set_error(&self, error: bool) {
        self.error.store(error, Ordering::Release);
    }

    /// Claim the tile for decoding. Returns `false` if another request
    /// already holds it.
    pub fn try_begin_loading(&self) -> bool {
        self.loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Publish a successful decode.
    pub fn finish_loaded(&self, bitmap: Arc<Bitmap>) {
        self.set_bitmap(Some(bitmap));
        self.error.store(false, Ordering::Release);
        self.loading.store(false, Ordering::Release);
    }

    /// Record a failed decode: error set, loading cleared, no bitmap.
    pub fn finish_failed(&self) {
        self.set_bitmap(None);
        self.error.store(true, Ordering::Release);
        self.loading.store(false, Ordering::Release);
    }

    /// A visible tile that still has nothing to draw.
    pub fn is_missing(&self) -> bool {
        self.is_visible() && (self.is_loading() || !self.has_bitmap())
    }

    /// Whether the scheduler should request a decode for this tile.
    pub fn needs_decode(&self) -> bool {
        !self.is_loading() && !self.is_error() && !self.has_bitmap()
    }

    pub fn status(&self) -> TileStatus {
        TileStatus {
            visible: self.is_visible(),
            loading: self.is_loading(),
            error: self.is_error(),
            has_bitmap: self.has_bitmap(),
        }
    }
}
