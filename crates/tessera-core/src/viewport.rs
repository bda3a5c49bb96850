//! Scale/translate state and the bounds fitter.
//!
//! The transform is `screen = source * scale + translate`. Every mutation
//! goes through [`Viewport::fit_to_bounds`], so the scale always lies in
//! `[min_scale, max_scale]` and the image can never be panned out of view.

use crate::config::{PanLimit, ViewportConfig};
use crate::geometry::{PointF, RectF, ScaleAndTranslate, Size, SourceRect};

#[derive(Clone, Debug)]
pub struct Viewport {
    config: ViewportConfig,
    source: Size,
    available: Size,
    state: ScaleAndTranslate,
}

impl Viewport {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            source: Size::default(),
            available: Size::default(),
            state: ScaleAndTranslate::default(),
        }
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn scale(&self) -> f32 {
        self.state.scale
    }

    pub fn translate(&self) -> PointF {
        self.state.translate
    }

    pub fn state(&self) -> ScaleAndTranslate {
        self.state
    }

    pub fn available_size(&self) -> Size {
        self.available
    }

    pub fn source_size(&self) -> Size {
        self.source
    }

    /// True once both the source and the viewport have non-zero size.
    pub fn is_ready(&self) -> bool {
        !self.source.is_empty() && !self.available.is_empty()
    }

    pub fn set_source(&mut self, source: Size) {
        self.source = source;
    }

    /// Update the viewport size and re-clamp the current transform.
    pub fn set_available_size(&mut self, available: Size) {
        if self.available == available {
            return;
        }
        self.available = available;
        if self.is_ready() && self.state.scale > 0.0 {
            self.fit_to_bounds(true);
        }
    }

    /// Restore defaults and forget the source.
    pub fn reset(&mut self) {
        self.source = Size::default();
        self.state = ScaleAndTranslate::default();
    }

    /// Scale at which the whole image fits the padded viewport on its
    /// tighter axis.
    pub fn min_scale(&self) -> f32 {
        if !self.is_ready() {
            return 1.0;
        }
        let padding = &self.config.padding;
        let width = (self.available.width as f32 - padding.horizontal()).max(1.0);
        let height = (self.available.height as f32 - padding.vertical()).max(1.0);
        (width / self.source.width as f32).min(height / self.source.height as f32)
    }

    /// Upper scale bound, raised to `min_scale` for images so small that
    /// fitting them already exceeds the configured maximum.
    pub fn max_scale(&self) -> f32 {
        self.config.max_scale.max(self.min_scale())
    }

    /// Clamp `target` into `[min_scale, max_scale]`.
    pub fn limited_scale(&self, target: f32) -> f32 {
        let min = self.min_scale();
        if target.is_nan() {
            return min;
        }
        target.clamp(min, self.max_scale())
    }

    /// Clamp the current scale and translate in place.
    pub fn fit_to_bounds(&mut self, center: bool) {
        self.state = self.fitted(center, self.state);
    }

    /// Clamp `sat` without touching the viewport.
    pub fn fitted(&self, center: bool, sat: ScaleAndTranslate) -> ScaleAndTranslate {
        let pan_limit = self.config.pan_limit;
        let center = center && pan_limit != PanLimit::Outside;

        let scale = self.limited_scale(sat.scale);
        let scaled_w = scale * self.source.width as f32;
        let scaled_h = scale * self.source.height as f32;
        let avail_w = self.available.width as f32;
        let avail_h = self.available.height as f32;
        let mut t = sat.translate;

        match (pan_limit, center) {
            (PanLimit::Center, _) => {
                t.x = t.x.max(avail_w / 2.0 - scaled_w);
                t.y = t.y.max(avail_h / 2.0 - scaled_h);
            }
            (_, true) => {
                t.x = t.x.max(avail_w - scaled_w);
                t.y = t.y.max(avail_h - scaled_h);
            }
            (_, false) => {
                t.x = t.x.max(-scaled_w);
                t.y = t.y.max(-scaled_h);
            }
        }

        let padding = &self.config.padding;
        let (max_tx, max_ty) = match (pan_limit, center) {
            (PanLimit::Center, _) => ((avail_w / 2.0).max(0.0), (avail_h / 2.0).max(0.0)),
            (_, true) => (
                ((avail_w - scaled_w) * padding.x_ratio()).max(0.0),
                ((avail_h - scaled_h) * padding.y_ratio()).max(0.0),
            ),
            (_, false) => (avail_w.max(0.0), avail_h.max(0.0)),
        };
        t.x = t.x.min(max_tx);
        t.y = t.y.min(max_ty);

        ScaleAndTranslate::new(scale, t)
    }

    /// First fit for a freshly opened image.
    ///
    /// Solves translate so `center` (source space, defaulting to the image
    /// centre) lands in the middle of the padded viewport at `scale`
    /// (defaulting to `min_scale`), then clamps.
    pub fn fit_initial(&mut self, scale: Option<f32>, center: Option<PointF>) {
        let scale = self.limited_scale(scale.unwrap_or_else(|| self.min_scale()));
        let center = center.unwrap_or_else(|| {
            PointF::new(
                self.source.width as f32 / 2.0,
                self.source.height as f32 / 2.0,
            )
        });
        self.state = ScaleAndTranslate::new(scale, self.translate_for_center(scale, center));
        self.fit_to_bounds(true);
    }

    /// Jump to `scale` with `center` in the middle of the viewport.
    pub fn set_scale_and_center(&mut self, scale: f32, center: PointF) {
        self.fit_initial(Some(scale), Some(center));
    }

    /// Source point currently drawn at the middle of the padded viewport.
    pub fn center(&self) -> PointF {
        self.view_to_source(self.padded_center())
    }

    /// Pan by a screen-space delta.
    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.state.translate.x += dx;
        self.state.translate.y += dy;
        self.fit_to_bounds(true);
    }

    /// Multiply the scale by `factor`, keeping the source point under
    /// `focus` (screen space) fixed where the clamps allow it.
    pub fn zoom_around(&mut self, factor: f32, focus: PointF) {
        if !self.is_ready() || !(factor > 0.0) {
            return;
        }
        let anchor = self.view_to_source(focus);
        let scale = self.limited_scale(self.state.scale * factor);
        self.state = ScaleAndTranslate::new(
            scale,
            PointF::new(focus.x - anchor.x * scale, focus.y - anchor.y * scale),
        );
        self.fit_to_bounds(true);
    }

    pub fn view_to_source(&self, p: PointF) -> PointF {
        let scale = self.state.scale;
        if scale <= 0.0 {
            return PointF::default();
        }
        PointF::new(
            (p.x - self.state.translate.x) / scale,
            (p.y - self.state.translate.y) / scale,
        )
    }

    pub fn source_to_view(&self, p: PointF) -> PointF {
        PointF::new(
            p.x * self.state.scale + self.state.translate.x,
            p.y * self.state.scale + self.state.translate.y,
        )
    }

    pub fn source_to_view_rect(&self, rect: &SourceRect) -> RectF {
        let top_left = self.source_to_view(PointF::new(rect.left as f32, rect.top as f32));
        let bottom_right = self.source_to_view(PointF::new(rect.right as f32, rect.bottom as f32));
        RectF::new(top_left.x, top_left.y, bottom_right.x, bottom_right.y)
    }

    /// Source-space bounding box of the four inverse-mapped viewport corners.
    pub fn visible_source_rect(&self) -> RectF {
        let screen = RectF::new(
            0.0,
            0.0,
            self.available.width as f32,
            self.available.height as f32,
        );
        let corners = screen.corners().map(|c| self.view_to_source(c));
        RectF::bounding(&corners)
    }

    fn padded_center(&self) -> PointF {
        let padding = &self.config.padding;
        PointF::new(
            padding.left + (self.available.width as f32 - padding.horizontal()) / 2.0,
            padding.top + (self.available.height as f32 - padding.vertical()) / 2.0,
        )
    }

    fn translate_for_center(&self, scale: f32, center: PointF) -> PointF {
        let view_center = self.padded_center();
        PointF::new(
            view_center.x - center.x * scale,
            view_center.y - center.y * scale,
        )
    }
}
