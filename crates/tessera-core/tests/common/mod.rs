#![allow(dead_code)]

use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tessera_core::decoder::{subsampled_size, validate_region, Bitmap, ImageDecoder};
use tessera_core::error::DecodeError;
use tessera_core::geometry::{Size, SourceRect};
use tessera_core::tile::Tile;
use tessera_core::SourceImageDescriptor;

/// Configurable decoder double.
///
/// Produces solid bitmaps, records every request, and can be told to fail,
/// panic, sleep, or block on a gate for chosen regions.
pub struct StubDecoder {
    width: u32,
    height: u32,
    max_tile_size: Size,
    concurrent: bool,
    delay: Option<Duration>,
    open_error: Option<DecodeError>,
    fail_on: Mutex<HashSet<SourceRect>>,
    panic_on: Mutex<HashSet<SourceRect>>,
    opened: AtomicBool,
    released: AtomicBool,
    requests: Mutex<Vec<(u32, SourceRect)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Option<(Mutex<bool>, Condvar)>,
}

impl StubDecoder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            max_tile_size: Size::new(2048, 2048),
            concurrent: true,
            delay: None,
            open_error: None,
            fail_on: Mutex::new(HashSet::new()),
            panic_on: Mutex::new(HashSet::new()),
            opened: AtomicBool::new(false),
            released: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn with_max_tile_size(mut self, size: Size) -> Self {
        self.max_tile_size = size;
        self
    }

    pub fn serial(mut self) -> Self {
        self.concurrent = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_open(mut self, error: DecodeError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Block every decode until [`open_gate`](Self::open_gate) is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some((Mutex::new(false), Condvar::new()));
        self
    }

    pub fn open_gate(&self) {
        if let Some((lock, cvar)) = &self.gate {
            *lock.lock().unwrap() = true;
            cvar.notify_all();
        }
    }

    pub fn fail_on(&self, rect: SourceRect) {
        self.fail_on.lock().unwrap().insert(rect);
    }

    pub fn panic_on(&self, rect: SourceRect) {
        self.panic_on.lock().unwrap().insert(rect);
    }

    pub fn requests(&self) -> Vec<(u32, SourceRect)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn descriptor(&self) -> SourceImageDescriptor {
        SourceImageDescriptor {
            width: self.width,
            height: self.height,
        }
    }

    fn wait_gate(&self) {
        if let Some((lock, cvar)) = &self.gate {
            let mut open = lock.lock().unwrap();
            while !*open {
                open = cvar.wait(open).unwrap();
            }
        }
    }
}

impl ImageDecoder for StubDecoder {
    fn name(&self) -> &str {
        "stub"
    }

    fn open(&self, _stream: Box<dyn Read + Send>) -> Result<SourceImageDescriptor, DecodeError> {
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        if self.released.load(Ordering::SeqCst) {
            return Err(DecodeError::Released);
        }
        if self.opened.swap(true, Ordering::SeqCst) {
            return Err(DecodeError::AlreadyOpen);
        }
        Ok(self.descriptor())
    }

    fn decode_region(&self, rect: SourceRect, sample_size: u32) -> Result<Bitmap, DecodeError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(DecodeError::Released);
        }
        validate_region(&self.descriptor(), &rect, sample_size)?;
        self.requests.lock().unwrap().push((sample_size, rect));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.wait_gate();
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on.lock().unwrap().contains(&rect) {
            panic!("stub decoder asked to panic on {rect:?}");
        }
        if self.fail_on.lock().unwrap().contains(&rect) {
            return Err(DecodeError::Corrupt(format!("stub failure at {rect:?}")));
        }

        let out = subsampled_size(&rect, sample_size);
        Ok(Bitmap::from_pixel(
            out.width,
            out.height,
            image::Rgba([sample_size as u8, 128, 64, 255]),
        ))
    }

    fn is_ready(&self) -> bool {
        self.opened.load(Ordering::SeqCst) && !self.released.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    fn supports_concurrent_decode(&self) -> bool {
        self.concurrent
    }

    fn max_tile_size(&self) -> Size {
        self.max_tile_size
    }
}

/// Stream argument for decoders that ignore their input.
pub fn empty_stream() -> Box<dyn Read + Send> {
    Box::new(Cursor::new(Vec::new()))
}

/// Assert that `tiles` partition `[0,width) x [0,height)` with no gaps or
/// overlaps.
pub fn assert_exact_cover(tiles: &[Arc<Tile>], width: u32, height: u32) {
    let mut area = 0u64;
    for (i, a) in tiles.iter().enumerate() {
        let ra = a.source_rect();
        assert!(
            ra.fits_within(width, height),
            "tile {ra:?} escapes {width}x{height}"
        );
        area += ra.area();
        for b in &tiles[i + 1..] {
            assert!(
                !ra.intersects(&b.source_rect()),
                "tiles {ra:?} and {:?} overlap",
                b.source_rect()
            );
        }
    }
    assert_eq!(area, width as u64 * height as u64, "tiles leave a gap");
}

/// Encode a small gradient PNG in memory.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 77, 255])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
