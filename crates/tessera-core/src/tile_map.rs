//! Resolution pyramid: one tile grid per power-of-two sample size.
//!
//! The coarsest level (the base layer) is sized so that the whole image,
//! fitted to the viewport, is covered by a handful of tiles that stay
//! decoded for the lifetime of the image. Finer levels are split until each
//! tile decodes to at most the backend's maximum tile size and roughly one
//! viewport, so zooming in only ever decodes what is on screen.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::decoder::SourceImageDescriptor;
use crate::error::{Result, TesseraError};
use crate::geometry::{SourceRect, Size};
use crate::sampling::calculate_in_sample_size;
use crate::tile::Tile;

/// Inputs of the grid-splitting loop besides the source dimensions.
#[derive(Clone, Copy, Debug)]
pub struct PyramidParams {
    /// Largest decoded tile the backend accepts.
    pub max_tile_size: Size,
    /// Viewport the tiles are drawn into.
    pub viewport: Size,
    /// Finer levels split tiles wider than `viewport * viewport_tile_ratio`.
    pub viewport_tile_ratio: f32,
}

/// Sample size of the base layer.
///
/// Evaluated at `fit_scale` (the scale at which the whole image fits the
/// viewport). With `halve` set the result is halved once so the base layer
/// is not overly blocky; this trades memory for quality.
pub fn base_sample_size(
    source: &SourceImageDescriptor,
    fit_scale: f32,
    dpi_factor: f32,
    halve: bool,
) -> u32 {
    let sample_size = calculate_in_sample_size(source.width, source.height, fit_scale, dpi_factor);
    if halve && sample_size > 1 {
        sample_size / 2
    } else {
        sample_size
    }
}

/// All tiles of one image, keyed by sample size (finest level first).
#[derive(Debug)]
pub struct TileMap {
    source: SourceImageDescriptor,
    full_image_sample_size: u32,
    levels: BTreeMap<u32, Vec<Arc<Tile>>>,
}

/// Tile counts along each axis for one level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelGrid {
    pub sample_size: u32,
    pub x_tiles: u32,
    pub y_tiles: u32,
}

impl TileMap {
    /// Build every level from `full_image_sample_size` down to 1.
    pub fn build(
        source: SourceImageDescriptor,
        full_image_sample_size: u32,
        params: &PyramidParams,
    ) -> Result<Self> {
        if source.width == 0 || source.height == 0 {
            return Err(TesseraError::InvalidDimensions {
                width: source.width,
                height: source.height,
            });
        }

        let full_image_sample_size = full_image_sample_size.max(1).next_power_of_two();
        let mut levels = BTreeMap::new();

        for grid in level_grids(&source, full_image_sample_size, params) {
            let tiles = grid_tiles(&source, &grid, full_image_sample_size);
            debug!(
                sample_size = grid.sample_size,
                x_tiles = grid.x_tiles,
                y_tiles = grid.y_tiles,
                "Built pyramid level"
            );
            levels.insert(grid.sample_size, tiles);
        }

        Ok(Self {
            source,
            full_image_sample_size,
            levels,
        })
    }

    pub fn source(&self) -> SourceImageDescriptor {
        self.source
    }

    /// Sample size of the base layer (the coarsest level).
    pub fn base_level(&self) -> u32 {
        self.full_image_sample_size
    }

    /// Sample sizes present, finest first.
    pub fn levels(&self) -> impl Iterator<Item = u32> + '_ {
        self.levels.keys().copied()
    }

    pub fn tiles(&self, sample_size: u32) -> &[Arc<Tile>] {
        self.levels
            .get(&sample_size)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every tile of every level, finest level first.
    pub fn all_tiles(&self) -> impl Iterator<Item = &Arc<Tile>> + '_ {
        self.levels.values().flatten()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn tile_count(&self) -> usize {
        self.levels.values().map(Vec::len).sum()
    }

    /// True if any visible tile at `sample_size` is loading or has no bitmap.
    pub fn has_missing_tiles(&self, sample_size: u32) -> bool {
        self.tiles(sample_size).iter().any(|t| t.is_missing())
    }

    /// Closest level coarser than `sample_size` holding at least one bitmap.
    pub fn nearest_coarser_populated(&self, sample_size: u32) -> Option<u32> {
        self.levels
            .range(sample_size.saturating_add(1)..)
            .find(|(_, tiles)| tiles.iter().any(|t| t.has_bitmap()))
            .map(|(&level, _)| level)
    }

    /// Drop every decoded bitmap, returning how many were held.
    pub fn free_all(&self) -> usize {
        self.all_tiles().filter(|t| t.free_bitmap()).count()
    }

    /// Number of decoded bitmaps currently held.
    pub fn bitmap_count(&self) -> usize {
        self.all_tiles().filter(|t| t.has_bitmap()).count()
    }
}

/// Compute the tile grid of every level, base layer first.
///
/// Counts carry over from one level to the next finer one, so finer levels
/// never have fewer tiles than coarser ones.
pub fn level_grids(
    source: &SourceImageDescriptor,
    full_image_sample_size: u32,
    params: &PyramidParams,
) -> Vec<LevelGrid> {
    let max_w = params.max_tile_size.width.max(1);
    let max_h = params.max_tile_size.height.max(1);
    let viewport_w = params.viewport.width as f32 * params.viewport_tile_ratio;
    let viewport_h = params.viewport.height as f32 * params.viewport_tile_ratio;

    let mut grids = Vec::new();
    let mut sample_size = full_image_sample_size;
    let mut x_tiles = 1;
    let mut y_tiles = 1;

    loop {
        let finer_than_base = sample_size < full_image_sample_size;
        x_tiles = grow_tiles(source.width, x_tiles, sample_size, max_w, viewport_w, finer_than_base);
        y_tiles = grow_tiles(source.height, y_tiles, sample_size, max_h, viewport_h, finer_than_base);
        grids.push(LevelGrid {
            sample_size,
            x_tiles,
            y_tiles,
        });

        if sample_size <= 1 {
            break;
        }
        sample_size /= 2;
    }

    grids
}

/// Grow the tile count along one axis until each decoded span fits.
///
/// The `+ tiles + 1` slack covers the remainder absorbed by the last tile.
fn grow_tiles(
    source_dim: u32,
    mut tiles: u32,
    sample_size: u32,
    max_dim: u32,
    viewport_span: f32,
    limit_to_viewport: bool,
) -> u32 {
    loop {
        // A tile is never narrower than one source pixel.
        if tiles >= source_dim {
            return source_dim.max(1);
        }
        let sub_tile = (source_dim / tiles) / sample_size;
        let over_backend = sub_tile + tiles + 1 > max_dim;
        let over_viewport =
            limit_to_viewport && viewport_span > 0.0 && sub_tile as f32 > viewport_span;
        if !over_backend && !over_viewport {
            return tiles;
        }
        tiles += 1;
    }
}

fn grid_tiles(
    source: &SourceImageDescriptor,
    grid: &LevelGrid,
    full_image_sample_size: u32,
) -> Vec<Arc<Tile>> {
    let tile_w = source.width / grid.x_tiles;
    let tile_h = source.height / grid.y_tiles;
    let visible = grid.sample_size == full_image_sample_size;

    let mut tiles = Vec::with_capacity((grid.x_tiles * grid.y_tiles) as usize);
    for x in 0..grid.x_tiles {
        for y in 0..grid.y_tiles {
            let right = if x == grid.x_tiles - 1 {
                source.width
            } else {
                (x + 1) * tile_w
            };
            let bottom = if y == grid.y_tiles - 1 {
                source.height
            } else {
                (y + 1) * tile_h
            };
            let rect = SourceRect::new(x * tile_w, y * tile_h, right, bottom);
            tiles.push(Arc::new(Tile::new(grid.sample_size, rect, visible)));
        }
    }
    tiles
}
