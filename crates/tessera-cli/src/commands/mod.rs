pub mod config;
pub mod info;
pub mod render;
pub mod simulate;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tessera_core::decoder::ImageDecoder;
use tessera_core::geometry::{PointF, Size};
use tessera_core::render::RasterSurface;
use tessera_core::scheduler::{BatchSummary, TileEvent};
use tessera_core::{InitializationState, RendererConfig, SubsamplingImage};
use tracing::warn;

use crate::summary;

/// Viewport options shared by `render` and `simulate`.
#[derive(Args)]
pub struct ViewArgs {
    /// Viewport width in pixels
    #[arg(long, default_value = "1280")]
    pub width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value = "800")]
    pub height: u32,

    /// Scale to render at (clamped; defaults to fit-to-viewport)
    #[arg(long)]
    pub scale: Option<f32>,

    /// Source X coordinate to centre on
    #[arg(long)]
    pub center_x: Option<f32>,

    /// Source Y coordinate to centre on
    #[arg(long)]
    pub center_y: Option<f32>,

    /// Draw tile outlines and labels
    #[arg(long)]
    pub debug: bool,

    /// Decode threads (defaults to available parallelism)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Renderer config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ViewArgs {
    fn available(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn renderer_config(&self) -> Result<RendererConfig> {
        let mut config = match &self.config {
            Some(path) => RendererConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => RendererConfig::default(),
        };
        if self.debug {
            config.debug = true;
        }
        if self.threads.is_some() {
            config.workers.threads = self.threads;
        }
        Ok(config)
    }

    fn wants_custom_view(&self) -> bool {
        self.scale.is_some() || self.center_x.is_some() || self.center_y.is_some()
    }
}

/// Initialize `decoder` from `stream`, settle the requested view, and save
/// the composited viewport to `output`.
pub fn render_view(
    decoder: Arc<dyn ImageDecoder>,
    stream: Box<dyn Read + Send>,
    view: &ViewArgs,
    output: &Path,
) -> Result<()> {
    let config = view.renderer_config()?;
    let mut image = SubsamplingImage::new(decoder, config)?;
    let events = image.subscribe();

    if let InitializationState::Error(err) = image.initialize(stream, view.available()) {
        bail!("Failed to initialize image: {err}");
    }
    let mut resolved = settle(&image, &events, "Base layer")?;

    if view.wants_custom_view() {
        let source = image.viewport().source_size();
        let center = PointF::new(
            view.center_x.unwrap_or(source.width as f32 / 2.0),
            view.center_y.unwrap_or(source.height as f32 / 2.0),
        );
        let scale = view.scale.unwrap_or_else(|| image.viewport().scale());
        image.set_scale_and_center(scale, center);
        resolved.merge(&settle(&image, &events, "Visible tiles")?);
    }

    let mut surface = RasterSurface::new(view.available());
    let stats = image.draw(&mut surface);
    surface
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    summary::print_render_summary(&image, &stats, &resolved, output);
    if image.debug() {
        for (origin, text) in surface.labels() {
            println!("  [{:>6.0},{:>6.0}] {}", origin.x, origin.y, text);
        }
    }
    image.reset();
    Ok(())
}

/// Wait for all outstanding decodes, advancing a progress bar as tile events
/// arrive.
fn settle(
    image: &SubsamplingImage,
    events: &Receiver<TileEvent>,
    label: &str,
) -> Result<BatchSummary> {
    let total = image.pending().total;
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:14} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    pb.set_message(label.to_string());

    let mut summary = BatchSummary {
        total,
        ..Default::default()
    };
    let mut record = |event: TileEvent| {
        match event {
            TileEvent::Loaded { .. } => summary.loaded += 1,
            TileEvent::Failed {
                sample_size,
                rect,
                error,
            } => {
                warn!(sample_size, ?rect, %error, "Tile failed");
                summary.failed += 1;
            }
        }
        pb.inc(1);
    };

    while image.pending().total > 0 {
        match events.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => record(event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    // Jobs publish their event before their batch settles.
    for event in events.try_iter() {
        record(event);
    }

    summary.cancelled = total.saturating_sub(summary.loaded + summary.failed);
    pb.set_position(total as u64);
    pb.finish_with_message(label.to_string());
    Ok(summary)
}
