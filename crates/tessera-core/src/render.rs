//! Tile composition onto a host-provided surface.

use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::consts::{
    DEBUG_ERROR_RGBA, DEBUG_LOADING_RGBA, DEBUG_READY_RGBA, DEFAULT_BACKGROUND_RGBA,
    ERROR_TILE_FILL_RGBA,
};
use crate::decoder::Bitmap;
use crate::error::Result;
use crate::geometry::{PointF, QuadMapping, RectF, Size};
use crate::tile::Tile;
use crate::tile_map::TileMap;
use crate::viewport::Viewport;

/// Drawing target supplied by the host.
///
/// Only `draw_bitmap` is required; the remaining hooks are used by the debug
/// overlay and the error indicator.
pub trait DrawSurface {
    fn size(&self) -> Size;

    /// Blit `bitmap` so that its corners land where `mapping` sends them.
    fn draw_bitmap(&mut self, bitmap: &Bitmap, mapping: &QuadMapping);

    fn fill_rect(&mut self, _rect: &RectF, _color: [u8; 4]) {}

    fn stroke_rect(&mut self, _rect: &RectF, _color: [u8; 4]) {}

    fn draw_label(&mut self, _origin: PointF, _text: &str) {}
}

/// What one `draw` call put on screen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub working_sample_size: u32,
    /// Coarser level drawn underneath because the working level had holes.
    pub fallback_sample_size: Option<u32>,
    /// Bitmaps blitted, fallback included.
    pub drawn: usize,
    /// Visible working-level tiles with nothing to draw yet.
    pub missing: usize,
    pub errored: usize,
}

/// Projects tiles through the viewport transform and draws them.
#[derive(Clone, Debug, Default)]
pub struct TileRenderer {
    debug: bool,
}

impl TileRenderer {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Draw the working level, with the nearest coarser populated level
    /// underneath whenever the working level is incomplete.
    pub fn draw(
        &self,
        map: &TileMap,
        viewport: &Viewport,
        working_sample_size: u32,
        surface: &mut dyn DrawSurface,
    ) -> DrawStats {
        let mut stats = DrawStats {
            working_sample_size,
            ..Default::default()
        };

        if map.has_missing_tiles(working_sample_size) {
            stats.fallback_sample_size = map.nearest_coarser_populated(working_sample_size);
        }

        if let Some(level) = stats.fallback_sample_size {
            for tile in map.tiles(level) {
                self.draw_tile(tile, viewport, surface, false, &mut stats);
            }
        }

        let show_errors = stats.fallback_sample_size.is_none();
        for tile in map.tiles(working_sample_size) {
            if tile.is_missing() {
                stats.missing += 1;
            }
            if tile.is_visible() && tile.is_error() {
                stats.errored += 1;
            }
            self.draw_tile(tile, viewport, surface, show_errors, &mut stats);
        }

        stats
    }

    fn draw_tile(
        &self,
        tile: &Tile,
        viewport: &Viewport,
        surface: &mut dyn DrawSurface,
        show_errors: bool,
        stats: &mut DrawStats,
    ) {
        let screen = viewport.source_to_view_rect(&tile.source_rect());
        tile.set_screen_rect(screen);

        let size = surface.size();
        let bounds = RectF::new(0.0, 0.0, size.width as f32, size.height as f32);
        if !screen.intersects(&bounds) {
            return;
        }

        if let Some(bitmap) = tile.bitmap() {
            if let Some(mapping) = QuadMapping::bitmap_to_rect(bitmap.width(), bitmap.height(), &screen)
            {
                surface.draw_bitmap(&bitmap, &mapping);
                stats.drawn += 1;
            }
        } else if show_errors && tile.is_visible() && tile.is_error() {
            surface.fill_rect(&screen, ERROR_TILE_FILL_RGBA);
        }

        if self.debug && (tile.is_visible() || tile.is_loading()) {
            draw_debug_overlay(tile, &screen, surface);
        }
    }
}

fn draw_debug_overlay(tile: &Tile, screen: &RectF, surface: &mut dyn DrawSurface) {
    let status = tile.status();
    let (color, state) = if status.error {
        (DEBUG_ERROR_RGBA, "ERROR")
    } else if status.loading {
        (DEBUG_LOADING_RGBA, "LOADING")
    } else if status.has_bitmap {
        (DEBUG_READY_RGBA, "RDY")
    } else {
        (DEBUG_LOADING_RGBA, "EMPTY")
    };
    surface.stroke_rect(screen, color);

    let src = tile.source_rect();
    let origin = PointF::new(screen.left + 5.0, screen.top + 15.0);
    surface.draw_label(
        origin,
        &format!(
            "ISS {} {} SRC {},{},{},{}",
            tile.sample_size(),
            state,
            src.left,
            src.top,
            src.right,
            src.bottom
        ),
    );
    surface.draw_label(
        PointF::new(origin.x, origin.y + 15.0),
        &format!(
            "VIS {:.0},{:.0},{:.0},{:.0}",
            screen.left, screen.top, screen.right, screen.bottom
        ),
    );
}

/// In-memory RGBA canvas implementing [`DrawSurface`].
///
/// Bitmaps are resampled nearest-neighbour through the inverse mapping, so
/// each destination pixel centre belongs to exactly one tile and adjacent
/// tiles meet without seams. Labels are collected rather than rasterized.
#[derive(Clone, Debug)]
pub struct RasterSurface {
    canvas: RgbaImage,
    background: [u8; 4],
    labels: Vec<(PointF, String)>,
}

impl RasterSurface {
    pub fn new(size: Size) -> Self {
        Self::with_background(size, DEFAULT_BACKGROUND_RGBA)
    }

    pub fn with_background(size: Size, background: [u8; 4]) -> Self {
        Self {
            canvas: RgbaImage::from_pixel(size.width, size.height, Rgba(background)),
            background,
            labels: Vec::new(),
        }
    }

    /// Fill with the background colour and forget labels.
    pub fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba(self.background);
        }
        self.labels.clear();
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn into_image(self) -> RgbaImage {
        self.canvas
    }

    pub fn labels(&self) -> &[(PointF, String)] {
        &self.labels
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.canvas.save(path)?;
        Ok(())
    }

    /// Destination pixel range covered by `rect`, clipped to the canvas.
    fn clip(&self, rect: &RectF) -> Option<(u32, u32, u32, u32)> {
        let x0 = rect.left.floor().max(0.0) as u32;
        let y0 = rect.top.floor().max(0.0) as u32;
        let x1 = (rect.right.ceil().max(0.0) as u32).min(self.canvas.width());
        let y1 = (rect.bottom.ceil().max(0.0) as u32).min(self.canvas.height());
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }
}

impl DrawSurface for RasterSurface {
    fn size(&self) -> Size {
        Size::new(self.canvas.width(), self.canvas.height())
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, mapping: &QuadMapping) {
        let Some(inverse) = mapping.inverse() else {
            return;
        };
        let src = RectF::new(0.0, 0.0, bitmap.width() as f32, bitmap.height() as f32);
        let Some(dst) = mapping.map_rect(&src) else {
            return;
        };
        let Some((x0, y0, x1, y1)) = self.clip(&dst) else {
            return;
        };

        for y in y0..y1 {
            for x in x0..x1 {
                let Some(p) = inverse.map(PointF::new(x as f32 + 0.5, y as f32 + 0.5)) else {
                    continue;
                };
                if p.x < 0.0 || p.y < 0.0 || p.x >= src.right || p.y >= src.bottom {
                    continue;
                }
                let texel = bitmap.get_pixel(p.x as u32, p.y as u32);
                blend(self.canvas.get_pixel_mut(x, y), texel);
            }
        }
    }

    fn fill_rect(&mut self, rect: &RectF, color: [u8; 4]) {
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                blend(self.canvas.get_pixel_mut(x, y), &Rgba(color));
            }
        }
    }

    fn stroke_rect(&mut self, rect: &RectF, color: [u8; 4]) {
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return;
        };
        for x in x0..x1 {
            self.canvas.put_pixel(x, y0, Rgba(color));
            self.canvas.put_pixel(x, y1 - 1, Rgba(color));
        }
        for y in y0..y1 {
            self.canvas.put_pixel(x0, y, Rgba(color));
            self.canvas.put_pixel(x1 - 1, y, Rgba(color));
        }
    }

    fn draw_label(&mut self, origin: PointF, text: &str) {
        self.labels.push((origin, text.to_string()));
    }
}

/// Source-over compositing of `src` onto `dst`.
fn blend(dst: &mut Rgba<u8>, src: &Rgba<u8>) {
    let alpha = src.0[3] as u32;
    if alpha == 255 {
        *dst = *src;
        return;
    }
    if alpha == 0 {
        return;
    }
    let inv = 255 - alpha;
    for c in 0..3 {
        dst.0[c] = ((src.0[c] as u32 * alpha + dst.0[c] as u32 * inv) / 255) as u8;
    }
    dst.0[3] = (alpha + dst.0[3] as u32 * inv / 255).min(255) as u8;
}
