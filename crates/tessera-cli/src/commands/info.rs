use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tessera_core::decoder::ImageDecoder;
use tessera_core::geometry::Size;
use tessera_core::tile_map::{base_sample_size, level_grids, PyramidParams};
use tessera_core::viewport::Viewport;
use tessera_core::{RasterDecoder, RendererConfig};

#[derive(Args)]
pub struct InfoArgs {
    /// Input image file
    pub file: PathBuf,

    /// Viewport width used to size the pyramid
    #[arg(long, default_value = "1280")]
    pub width: u32,

    /// Viewport height used to size the pyramid
    #[arg(long, default_value = "800")]
    pub height: u32,

    /// Renderer config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => RendererConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RendererConfig::default(),
    };

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let decoder = RasterDecoder::new();
    let desc = decoder
        .open(Box::new(BufReader::new(file)))
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let available = Size::new(args.width, args.height);
    let mut viewport = Viewport::new(config.viewport.clone());
    viewport.set_source(desc.size());
    viewport.set_available_size(available);
    viewport.fit_initial(None, None);

    let tiling = &config.tiling;
    let base = base_sample_size(
        &desc,
        viewport.min_scale(),
        tiling.dpi_factor(),
        tiling.halve_base_layer,
    )
    .next_power_of_two();
    let params = PyramidParams {
        max_tile_size: tiling.max_tile_size.unwrap_or_else(|| decoder.max_tile_size()),
        viewport: available,
        viewport_tile_ratio: tiling.viewport_tile_ratio,
    };

    println!("File:        {}", args.file.display());
    if let Some(format) = decoder.format() {
        println!("Format:      {:?}", format);
    }
    println!("Dimensions:  {}x{}", desc.width, desc.height);
    let megapixels = desc.width as f64 * desc.height as f64 / 1.0e6;
    println!("Megapixels:  {:.1}", megapixels);
    println!("Viewport:    {}x{}", available.width, available.height);
    println!("Fit scale:   {:.4}", viewport.min_scale());
    println!("Base level:  {}", base);
    println!();
    println!("  Level   Grid      Tiles   Tile size");

    let mut total = 0;
    for grid in level_grids(&desc, base, &params) {
        let tiles = grid.x_tiles * grid.y_tiles;
        total += tiles;
        let tile_w = (desc.width / grid.x_tiles).div_ceil(grid.sample_size);
        let tile_h = (desc.height / grid.y_tiles).div_ceil(grid.sample_size);
        println!(
            "  {:>5}   {:<8}  {:>5}   ~{}x{}",
            grid.sample_size,
            format!("{}x{}", grid.x_tiles, grid.y_tiles),
            tiles,
            tile_w,
            tile_h
        );
    }
    println!();
    println!("Total tiles: {}", total);

    decoder.release();
    Ok(())
}
