//! Rectangles, points and the projective mapping used to blit tiles.
//!
//! Source-space rectangles are integer, half-open (`right`/`bottom`
//! exclusive) and expressed in full-resolution pixels. Screen-space values
//! are `f32`, matching what a raster compositor consumes.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

/// Pixel dimensions of a surface, viewport or image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A point in screen or source space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Integer rectangle in full-resolution source coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl SourceRect {
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle covering a whole `width` x `height` image.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// True if `self` lies inside `[0,width) x [0,height)` and is non-empty.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        !self.is_empty() && self.right <= width && self.bottom <= height
    }

    /// Positive-area overlap with another source rectangle.
    pub fn intersects(&self, other: &SourceRect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// Positive-area overlap with a fractional source-space area.
    pub fn overlaps(&self, area: &RectF) -> bool {
        (self.left as f32) < area.right
            && area.left < self.right as f32
            && (self.top as f32) < area.bottom
            && area.top < self.bottom as f32
    }

    pub fn to_rect_f(&self) -> RectF {
        RectF::new(
            self.left as f32,
            self.top as f32,
            self.right as f32,
            self.bottom as f32,
        )
    }
}

/// Floating-point rectangle, used for screen projections and for the
/// inverse-projected viewport in source space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RectF {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Axis-aligned bounding box of a set of points.
    pub fn bounding(points: &[PointF]) -> Self {
        let mut rect = RectF::new(f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for p in points {
            rect.left = rect.left.min(p.x);
            rect.top = rect.top.min(p.y);
            rect.right = rect.right.max(p.x);
            rect.bottom = rect.bottom.max(p.y);
        }
        rect
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn intersects(&self, other: &RectF) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// Corners in clockwise order starting top-left.
    pub fn corners(&self) -> [PointF; 4] {
        [
            PointF::new(self.left, self.top),
            PointF::new(self.right, self.top),
            PointF::new(self.right, self.bottom),
            PointF::new(self.left, self.bottom),
        ]
    }
}

/// Scale and translate pair describing the source-to-screen transform:
/// `screen = source * scale + translate`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleAndTranslate {
    pub scale: f32,
    pub translate: PointF,
}

impl ScaleAndTranslate {
    pub const fn new(scale: f32, translate: PointF) -> Self {
        Self { scale, translate }
    }
}

impl Default for ScaleAndTranslate {
    fn default() -> Self {
        Self::new(0.0, PointF::default())
    }
}

/// Projective mapping defined by four point correspondences.
///
/// Equivalent to a poly-to-poly matrix with four points: it maps any
/// quadrilateral onto any other, so rectangular tiles of arbitrary aspect
/// ratio land on their screen rectangle without distortion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadMapping {
    matrix: Matrix3<f64>,
}

impl QuadMapping {
    /// Solve the homography taking each `src[i]` to `dst[i]`.
    ///
    /// Returns `None` for degenerate input (three collinear points).
    pub fn from_quads(src: &[PointF; 4], dst: &[PointF; 4]) -> Option<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for i in 0..4 {
            let (x, y) = (src[i].x as f64, src[i].y as f64);
            let (u, v) = (dst[i].x as f64, dst[i].y as f64);
            let r = i * 2;

            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -x * u;
            a[(r, 7)] = -y * u;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -x * v;
            a[(r + 1, 7)] = -y * v;
            b[r + 1] = v;
        }

        let h = a.lu().solve(&b)?;
        if h.iter().any(|v| !v.is_finite()) {
            return None;
        }

        Some(Self {
            matrix: Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0),
        })
    }

    /// Mapping from a `width` x `height` bitmap onto `dst`.
    pub fn bitmap_to_rect(width: u32, height: u32, dst: &RectF) -> Option<Self> {
        let src = RectF::new(0.0, 0.0, width as f32, height as f32);
        Self::from_quads(&src.corners(), &dst.corners())
    }

    pub fn map(&self, p: PointF) -> Option<PointF> {
        let v = self.matrix * Vector3::new(p.x as f64, p.y as f64, 1.0);
        let w = v[2];
        if !w.is_finite() || w.abs() <= f64::EPSILON {
            return None;
        }
        Some(PointF::new((v[0] / w) as f32, (v[1] / w) as f32))
    }

    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// Bounding box of the four mapped corners of `rect`.
    pub fn map_rect(&self, rect: &RectF) -> Option<RectF> {
        let mut mapped = [PointF::default(); 4];
        for (out, corner) in mapped.iter_mut().zip(rect.corners()) {
            *out = self.map(corner)?;
        }
        Some(RectF::bounding(&mapped))
    }
}
