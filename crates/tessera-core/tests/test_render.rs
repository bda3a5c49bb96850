mod common;

use std::sync::Arc;

use tessera_core::config::{ViewportConfig, WorkerConfig};
use tessera_core::decoder::{Bitmap, ImageDecoder, PatternDecoder};
use tessera_core::geometry::{PointF, QuadMapping, RectF, Size};
use tessera_core::render::{DrawSurface, RasterSurface, TileRenderer};
use tessera_core::scheduler::TileScheduler;
use tessera_core::tile_map::{base_sample_size, PyramidParams, TileMap};
use tessera_core::viewport::Viewport;

use common::{empty_stream, StubDecoder};

/// Surface that only records what it was asked to draw.
#[derive(Default)]
struct RecordingSurface {
    size: Size,
    bitmaps: Vec<RectF>,
    fills: Vec<RectF>,
    strokes: usize,
    labels: Vec<String>,
}

impl RecordingSurface {
    fn new(size: Size) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }
}

impl DrawSurface for RecordingSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, mapping: &QuadMapping) {
        let src = RectF::new(0.0, 0.0, bitmap.width() as f32, bitmap.height() as f32);
        if let Some(dst) = mapping.map_rect(&src) {
            self.bitmaps.push(dst);
        }
    }

    fn fill_rect(&mut self, rect: &RectF, _color: [u8; 4]) {
        self.fills.push(*rect);
    }

    fn stroke_rect(&mut self, _rect: &RectF, _color: [u8; 4]) {
        self.strokes += 1;
    }

    fn draw_label(&mut self, _origin: PointF, text: &str) {
        self.labels.push(text.to_string());
    }
}

struct Scene {
    map: TileMap,
    viewport: Viewport,
    scheduler: TileScheduler,
}

fn scene(decoder: Arc<dyn ImageDecoder>, available: Size) -> Scene {
    let source = decoder.open(empty_stream()).unwrap();
    let mut viewport = Viewport::new(ViewportConfig::default());
    viewport.set_source(source.size());
    viewport.set_available_size(available);
    viewport.fit_initial(None, None);

    let base = base_sample_size(&source, viewport.min_scale(), 1.0, true);
    let params = PyramidParams {
        max_tile_size: decoder.max_tile_size(),
        viewport: available,
        viewport_tile_ratio: 1.25,
    };
    let map = TileMap::build(source, base, &params).unwrap();
    let scheduler = TileScheduler::new(
        decoder,
        &WorkerConfig {
            threads: Some(2),
        },
        1.0,
    )
    .unwrap();
    Scene {
        map,
        viewport,
        scheduler,
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

#[test]
fn test_tiles_compose_without_seams() {
    let pattern = Arc::new(
        PatternDecoder::new(64, 64)
            .with_cell_size(8)
            .with_max_tile_size(Size::new(20, 20)),
    );
    let mut s = scene(pattern.clone(), Size::new(64, 64));
    assert_eq!(s.map.base_level(), 1);
    assert!(s.map.tiles(1).len() > 1);
    s.scheduler.load_base_layer(&s.map).unwrap().wait();

    let mut surface = RasterSurface::with_background(Size::new(64, 64), [0, 0, 0, 0]);
    let working = s.scheduler.working_sample_size(&s.map, s.viewport.scale());
    let stats = TileRenderer::new(false).draw(&s.map, &s.viewport, working, &mut surface);

    assert_eq!(stats.missing, 0);
    assert_eq!(stats.fallback_sample_size, None);
    for y in 0..64 {
        for x in 0..64 {
            assert_eq!(
                surface.image().get_pixel(x, y),
                &pattern.pixel_at(x, y),
                "pixel ({x},{y})"
            );
        }
    }
}

#[test]
fn test_coarser_level_fills_missing_tiles() {
    let stub = Arc::new(StubDecoder::new(4000, 4000));
    let mut s = scene(stub.clone(), Size::new(400, 400));
    s.scheduler.load_base_layer(&s.map).unwrap().wait();

    s.viewport.set_scale_and_center(1.0, PointF::new(1000.0, 1000.0));
    let outcome = s.scheduler.refresh(&s.map, &s.viewport, false);
    assert_eq!(outcome.working_sample_size, 1);

    let mut surface = RecordingSurface::new(Size::new(400, 400));
    let stats = TileRenderer::new(false).draw(&s.map, &s.viewport, 1, &mut surface);

    assert_eq!(stats.fallback_sample_size, Some(s.map.base_level()));
    assert_eq!(stats.missing, outcome.visible);
    assert_eq!(stats.drawn, s.map.tiles(s.map.base_level()).len());
    assert!(surface.fills.is_empty());
}

#[test]
fn test_complete_working_level_skips_fallback() {
    let stub = Arc::new(StubDecoder::new(4000, 4000));
    let mut s = scene(stub.clone(), Size::new(400, 400));
    s.scheduler.load_base_layer(&s.map).unwrap().wait();

    s.viewport.set_scale_and_center(1.0, PointF::new(1000.0, 1000.0));
    let outcome = s.scheduler.refresh(&s.map, &s.viewport, true);
    outcome.batch.unwrap().wait();

    let mut surface = RecordingSurface::new(Size::new(400, 400));
    let stats = TileRenderer::new(false).draw(&s.map, &s.viewport, 1, &mut surface);
    assert_eq!(stats.fallback_sample_size, None);
    assert_eq!(stats.missing, 0);
    assert_eq!(stats.drawn, outcome.visible);
}

#[test]
fn test_error_tile_marked_without_fallback() {
    let stub = Arc::new(StubDecoder::new(5000, 1000).with_max_tile_size(Size::new(1024, 1024)));
    let mut s = scene(stub.clone(), Size::new(5000, 1000));
    assert_eq!(s.map.base_level(), 1);
    let tiles = s.map.tiles(1);
    stub.fail_on(tiles[2].source_rect());
    s.scheduler.load_base_layer(&s.map).unwrap().wait();

    let mut surface = RecordingSurface::new(Size::new(5000, 1000));
    let stats = TileRenderer::new(false).draw(&s.map, &s.viewport, 1, &mut surface);
    assert_eq!(stats.errored, 1);
    assert_eq!(stats.drawn, 4);
    assert_eq!(surface.fills.len(), 1);
}

#[test]
fn test_offscreen_tiles_are_culled() {
    let stub = Arc::new(StubDecoder::new(4000, 4000));
    let mut s = scene(stub.clone(), Size::new(400, 400));
    s.viewport.set_scale_and_center(1.0, PointF::new(1000.0, 1000.0));
    s.scheduler.refresh(&s.map, &s.viewport, true).batch.unwrap().wait();

    // Force every working tile to hold a bitmap, visible or not.
    for tile in s.map.tiles(1) {
        if !tile.has_bitmap() {
            tile.finish_loaded(Arc::new(Bitmap::new(500, 500)));
        }
    }

    let mut surface = RecordingSurface::new(Size::new(400, 400));
    TileRenderer::new(false).draw(&s.map, &s.viewport, 1, &mut surface);
    let bounds = RectF::new(0.0, 0.0, 400.0, 400.0);
    assert_eq!(surface.bitmaps.len(), 4);
    assert!(surface.bitmaps.iter().all(|r| r.intersects(&bounds)));
}

// ---------------------------------------------------------------------------
// Debug overlay
// ---------------------------------------------------------------------------

#[test]
fn test_debug_overlay_labels_tiles() {
    let stub = Arc::new(StubDecoder::new(5000, 1000).with_max_tile_size(Size::new(1024, 1024)));
    let mut s = scene(stub, Size::new(5000, 1000));
    s.scheduler.load_base_layer(&s.map).unwrap().wait();

    let mut renderer = TileRenderer::new(false);
    let mut plain = RecordingSurface::new(Size::new(5000, 1000));
    renderer.draw(&s.map, &s.viewport, 1, &mut plain);
    assert!(plain.labels.is_empty());

    renderer.set_debug(true);
    let mut surface = RecordingSurface::new(Size::new(5000, 1000));
    renderer.draw(&s.map, &s.viewport, 1, &mut surface);
    assert_eq!(surface.strokes, 5);
    assert_eq!(surface.labels.len(), 10);
    assert!(surface.labels[0].starts_with("ISS 1 RDY SRC 0,0,1000,1000"));
    assert!(surface.labels[1].starts_with("VIS "));
}

#[test]
fn test_screen_rect_recorded_on_draw() {
    let stub = Arc::new(StubDecoder::new(5000, 1000).with_max_tile_size(Size::new(1024, 1024)));
    let s = scene(stub, Size::new(500, 100));
    let base = s.map.base_level();
    assert_eq!(base, 4);
    let mut surface = RecordingSurface::new(Size::new(500, 100));
    TileRenderer::new(false).draw(&s.map, &s.viewport, base, &mut surface);

    // Two base tiles side by side at scale 0.1.
    let tiles = s.map.tiles(base);
    assert_eq!(tiles.len(), 2);
    let screen = tiles[1].screen_rect();
    assert!((screen.left - 250.0).abs() < 0.01);
    assert!((screen.right - 500.0).abs() < 0.01);
    assert!((screen.bottom - 100.0).abs() < 0.01);
}
