use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tessera_core::consts::PATTERN_CELL_SIZE;
use tessera_core::PatternDecoder;

use super::{render_view, ViewArgs};

#[derive(Args)]
pub struct SimulateArgs {
    /// Width of the procedural source in pixels
    #[arg(long, default_value = "20000")]
    pub source_width: u32,

    /// Height of the procedural source in pixels
    #[arg(long, default_value = "15000")]
    pub source_height: u32,

    /// Checkerboard cell size in source pixels
    #[arg(long, default_value_t = PATTERN_CELL_SIZE)]
    pub cell_size: u32,

    /// Output PNG path
    #[arg(short, long, default_value = "simulate.png")]
    pub output: PathBuf,

    #[command(flatten)]
    pub view: ViewArgs,
}

pub fn run(args: &SimulateArgs) -> Result<()> {
    let decoder = PatternDecoder::new(args.source_width, args.source_height)
        .with_cell_size(args.cell_size);
    render_view(
        Arc::new(decoder),
        Box::new(io::empty()),
        &args.view,
        &args.output,
    )
}
