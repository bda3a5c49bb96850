use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tessera_core::RasterDecoder;

use super::{render_view, ViewArgs};

#[derive(Args)]
pub struct RenderArgs {
    /// Input image file
    pub file: PathBuf,

    /// Output PNG path
    #[arg(short, long, default_value = "view.png")]
    pub output: PathBuf,

    #[command(flatten)]
    pub view: ViewArgs,
}

pub fn run(args: &RenderArgs) -> Result<()> {
    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    render_view(
        Arc::new(RasterDecoder::new()),
        Box::new(BufReader::new(file)),
        &args.view,
        &args.output,
    )
}
