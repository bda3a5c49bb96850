use approx::assert_relative_eq;

use tessera_core::config::{Insets, PanLimit, ViewportConfig};
use tessera_core::geometry::{PointF, ScaleAndTranslate, Size};
use tessera_core::viewport::Viewport;

fn fitted(config: ViewportConfig, source: Size, available: Size) -> Viewport {
    let mut vp = Viewport::new(config);
    vp.set_source(source);
    vp.set_available_size(available);
    vp.fit_initial(None, None);
    vp
}

fn default_fitted(source: Size, available: Size) -> Viewport {
    fitted(ViewportConfig::default(), source, available)
}

// ---------------------------------------------------------------------------
// Scale limits
// ---------------------------------------------------------------------------

#[test]
fn test_min_scale_fits_tighter_axis() {
    let vp = default_fitted(Size::new(10000, 8000), Size::new(1080, 1920));
    assert_relative_eq!(vp.min_scale(), 0.108, epsilon = 1e-6);
    assert_relative_eq!(vp.scale(), vp.min_scale());
}

#[test]
fn test_limited_scale_clamps_every_target() {
    let vp = default_fitted(Size::new(4000, 3000), Size::new(800, 600));
    let min = vp.min_scale();
    for target in [-5.0, 0.0, 0.01, 0.2, 1.0, 2.9, 3.0, 50.0, f32::INFINITY, f32::NAN] {
        let s = vp.limited_scale(target);
        assert!(s >= min && s <= 3.0, "target {target} gave {s}");
    }
}

#[test]
fn test_tiny_image_max_scale_not_below_min() {
    let vp = default_fitted(Size::new(10, 10), Size::new(1000, 1000));
    assert_relative_eq!(vp.min_scale(), 100.0);
    assert!(vp.max_scale() >= vp.min_scale());
    assert_relative_eq!(vp.limited_scale(1.0), 100.0);
}

#[test]
fn test_padding_shrinks_min_scale() {
    let config = ViewportConfig {
        padding: Insets {
            left: 50.0,
            top: 0.0,
            right: 50.0,
            bottom: 0.0,
        },
        ..Default::default()
    };
    let vp = fitted(config, Size::new(1000, 100), Size::new(1100, 1000));
    assert_relative_eq!(vp.min_scale(), 1.0);
}

// ---------------------------------------------------------------------------
// Bounds fitting
// ---------------------------------------------------------------------------

#[test]
fn test_fit_to_bounds_is_idempotent() {
    for pan_limit in [PanLimit::Inside, PanLimit::Outside, PanLimit::Center] {
        let config = ViewportConfig {
            pan_limit,
            ..Default::default()
        };
        let mut vp = fitted(config, Size::new(5000, 3000), Size::new(800, 600));
        vp.zoom_around(3.7, PointF::new(120.0, 480.0));
        vp.pan_by(-250.0, 90.0);

        for center in [true, false] {
            vp.fit_to_bounds(center);
            let once = vp.state();
            vp.fit_to_bounds(center);
            assert_eq!(vp.state(), once, "{pan_limit} center={center}");
        }
    }
}

#[test]
fn test_initial_fit_shows_whole_image_centred() {
    let source = Size::new(10000, 8000);
    let available = Size::new(1080, 1920);
    let vp = default_fitted(source, available);
    let t = vp.translate();
    let scaled_w = source.width as f32 * vp.scale();
    let scaled_h = source.height as f32 * vp.scale();

    // Whole image on screen.
    assert!(t.x >= -0.01 && t.x + scaled_w <= available.width as f32 + 0.01);
    assert!(t.y >= -0.01 && t.y + scaled_h <= available.height as f32 + 0.01);

    // Blank space split by the default ratio.
    let blank_h = available.height as f32 - scaled_h;
    assert_relative_eq!(t.y, blank_h * 0.5, epsilon = 0.01);
    assert_relative_eq!(t.x, 0.0, epsilon = 0.01);
}

#[test]
fn test_asymmetric_padding_biases_small_image() {
    let config = ViewportConfig {
        padding: Insets {
            left: 0.0,
            top: 30.0,
            right: 0.0,
            bottom: 10.0,
        },
        ..Default::default()
    };
    let vp = fitted(config, Size::new(1000, 200), Size::new(1000, 1000));
    let scaled_h = 200.0 * vp.scale();
    let blank = 1000.0 - scaled_h;
    assert_relative_eq!(vp.translate().y, blank * 0.75, epsilon = 0.01);
}

#[test]
fn test_inside_limit_blocks_panning_off_screen() {
    let mut vp = default_fitted(Size::new(4000, 3000), Size::new(800, 600));
    vp.zoom_around(10.0, PointF::new(400.0, 300.0));
    vp.pan_by(1.0e6, 1.0e6);
    assert_relative_eq!(vp.translate().x, 0.0);
    assert_relative_eq!(vp.translate().y, 0.0);

    vp.pan_by(-1.0e7, -1.0e7);
    let scaled_w = 4000.0 * vp.scale();
    let scaled_h = 3000.0 * vp.scale();
    assert_relative_eq!(vp.translate().x, 800.0 - scaled_w, epsilon = 0.5);
    assert_relative_eq!(vp.translate().y, 600.0 - scaled_h, epsilon = 0.5);
}

#[test]
fn test_outside_limit_allows_edge_only_view() {
    let config = ViewportConfig {
        pan_limit: PanLimit::Outside,
        ..Default::default()
    };
    let mut vp = fitted(config, Size::new(4000, 3000), Size::new(800, 600));
    vp.zoom_around(10.0, PointF::new(400.0, 300.0));
    vp.pan_by(1.0e6, 1.0e6);
    assert_relative_eq!(vp.translate().x, 800.0);
    assert_relative_eq!(vp.translate().y, 600.0);
}

#[test]
fn test_center_limit_reaches_every_point() {
    let config = ViewportConfig {
        pan_limit: PanLimit::Center,
        ..Default::default()
    };
    let mut vp = fitted(config, Size::new(4000, 3000), Size::new(800, 600));
    vp.set_scale_and_center(1.0, PointF::new(0.0, 0.0));
    let c = vp.view_to_source(PointF::new(400.0, 300.0));
    assert_relative_eq!(c.x, 0.0, epsilon = 0.01);
    assert_relative_eq!(c.y, 0.0, epsilon = 0.01);
}

#[test]
fn test_fitted_does_not_mutate() {
    let vp = default_fitted(Size::new(4000, 3000), Size::new(800, 600));
    let before = vp.state();
    let out = vp.fitted(true, ScaleAndTranslate::new(100.0, PointF::new(9999.0, 9999.0)));
    assert_eq!(vp.state(), before);
    assert_relative_eq!(out.scale, 3.0);
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

#[test]
fn test_set_scale_and_center_targets_point() {
    let mut vp = default_fitted(Size::new(4000, 3000), Size::new(800, 600));
    vp.set_scale_and_center(1.0, PointF::new(2000.0, 1500.0));
    let c = vp.center();
    assert_relative_eq!(c.x, 2000.0, epsilon = 0.01);
    assert_relative_eq!(c.y, 1500.0, epsilon = 0.01);
}

#[test]
fn test_visible_source_rect_matches_viewport() {
    let mut vp = default_fitted(Size::new(4000, 3000), Size::new(800, 600));
    vp.set_scale_and_center(2.0, PointF::new(2000.0, 1500.0));
    let r = vp.visible_source_rect();
    assert_relative_eq!(r.width(), 400.0, epsilon = 0.01);
    assert_relative_eq!(r.height(), 300.0, epsilon = 0.01);
    assert_relative_eq!(r.left, 1800.0, epsilon = 0.01);
    assert_relative_eq!(r.top, 1350.0, epsilon = 0.01);
}

#[test]
fn test_resize_keeps_transform_in_bounds() {
    let mut vp = default_fitted(Size::new(4000, 3000), Size::new(800, 600));
    vp.set_available_size(Size::new(2000, 2000));
    assert!(vp.scale() >= vp.min_scale());
    assert_relative_eq!(vp.min_scale(), 0.5);
}

#[test]
fn test_reset_restores_defaults() {
    let mut vp = default_fitted(Size::new(4000, 3000), Size::new(800, 600));
    vp.reset();
    assert_eq!(vp.scale(), 0.0);
    assert!(!vp.is_ready());
}
