use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_MAX_SCALE, DEFAULT_MINIMUM_TILE_DPI, DEFAULT_PADDING_RATIO, DEFAULT_SCREEN_DPI,
    DEFAULT_VIEWPORT_TILE_RATIO,
};
use crate::error::{Result, TesseraError};
use crate::geometry::Size;

/// How far the image may be panned relative to the viewport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanLimit {
    /// The image cannot move past its centred position while it is smaller
    /// than the viewport, and never fully off-screen.
    #[default]
    Inside,
    /// The image may be panned until only its edge remains on screen.
    Outside,
    /// Any image point can be brought to the viewport centre.
    Center,
}

impl fmt::Display for PanLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inside => write!(f, "Inside"),
            Self::Outside => write!(f, "Outside"),
            Self::Center => write!(f, "Center"),
        }
    }
}

/// Padding around the image inside the viewport, in screen pixels.
///
/// The ratio `left / (left + right)` decides where a small image settles
/// horizontally (and likewise vertically); equal or zero insets centre it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Insets {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Insets {
    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }

    pub fn x_ratio(&self) -> f32 {
        padding_ratio(self.left, self.right)
    }

    pub fn y_ratio(&self) -> f32 {
        padding_ratio(self.top, self.bottom)
    }
}

fn padding_ratio(start: f32, end: f32) -> f32 {
    if start > 0.0 || end > 0.0 {
        start / (start + end)
    } else {
        DEFAULT_PADDING_RATIO
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Halve the base-layer sample size once so it is not overly coarse.
    pub halve_base_layer: bool,
    /// Finer levels keep each tile within this multiple of the viewport.
    pub viewport_tile_ratio: f32,
    /// Decode tiles at no less than this density. `None` disables the
    /// DPI adjustment.
    pub minimum_tile_dpi: Option<f32>,
    /// Density of the drawing surface.
    pub screen_dpi: f32,
    /// Override the backend's maximum decoded tile size.
    pub max_tile_size: Option<Size>,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            halve_base_layer: true,
            viewport_tile_ratio: DEFAULT_VIEWPORT_TILE_RATIO,
            minimum_tile_dpi: Some(DEFAULT_MINIMUM_TILE_DPI),
            screen_dpi: DEFAULT_SCREEN_DPI,
            max_tile_size: None,
        }
    }
}

impl TilingConfig {
    /// Multiplier applied to the scale before picking a sample size.
    pub fn dpi_factor(&self) -> f32 {
        match self.minimum_tile_dpi {
            Some(dpi) if dpi > 0.0 && self.screen_dpi > 0.0 => dpi / self.screen_dpi,
            _ => 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Upper bound for the scale.
    pub max_scale: f32,
    pub pan_limit: PanLimit,
    pub padding: Insets,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            max_scale: DEFAULT_MAX_SCALE,
            pan_limit: PanLimit::default(),
            padding: Insets::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Decode threads. `None` uses the available parallelism.
    pub threads: Option<usize>,
}

impl WorkerConfig {
    pub fn resolved_threads(&self) -> usize {
        match self.threads {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Complete renderer configuration, serializable as TOML.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Draw per-tile debug overlays.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub tiling: TilingConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
}

impl RendererConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| TesseraError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| TesseraError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values the renderer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.viewport.max_scale > 0.0) {
            return Err(TesseraError::Config(format!(
                "max_scale must be positive, got {}",
                self.viewport.max_scale
            )));
        }
        if !(self.tiling.viewport_tile_ratio > 0.0) {
            return Err(TesseraError::Config(format!(
                "viewport_tile_ratio must be positive, got {}",
                self.tiling.viewport_tile_ratio
            )));
        }
        if let Some(size) = self.tiling.max_tile_size {
            if size.is_empty() {
                return Err(TesseraError::Config("max_tile_size must be non-zero".into()));
            }
        }
        let p = &self.viewport.padding;
        if [p.left, p.top, p.right, p.bottom].iter().any(|v| *v < 0.0) {
            return Err(TesseraError::Config("padding insets must not be negative".into()));
        }
        Ok(())
    }
}
