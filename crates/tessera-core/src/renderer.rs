use std::io::Read;
use std::sync::mpsc;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::RendererConfig;
use crate::decoder::{ImageDecoder, SourceImageDescriptor};
use crate::error::{Result, TesseraError};
use crate::geometry::{PointF, Size};
use crate::render::{DrawStats, DrawSurface, TileRenderer};
use crate::scheduler::{retry_errored, BatchSummary, RefreshOutcome, TileEvent, TileScheduler};
use crate::tile_map::{base_sample_size, PyramidParams, TileMap};
use crate::viewport::Viewport;

/// Lifecycle of one renderer instance.
#[derive(Debug, Default)]
pub enum InitializationState {
    #[default]
    Uninitialized,
    Success(SourceImageDescriptor),
    Error(TesseraError),
}

impl InitializationState {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn descriptor(&self) -> Option<SourceImageDescriptor> {
        match self {
            Self::Success(descriptor) => Some(*descriptor),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TesseraError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Deep-zoom view of one large image.
///
/// The host calls [`initialize`](Self::initialize) once the viewport has a
/// size, forwards size changes and pan/zoom deltas, calls
/// [`draw`](Self::draw) every frame, and [`reset`](Self::reset) when the
/// view is detached. Dropping the value resets it.
pub struct SubsamplingImage {
    config: RendererConfig,
    decoder: Arc<dyn ImageDecoder>,
    scheduler: TileScheduler,
    viewport: Viewport,
    renderer: TileRenderer,
    tile_map: Option<TileMap>,
    state: InitializationState,
}

impl SubsamplingImage {
    pub fn new(decoder: Arc<dyn ImageDecoder>, config: RendererConfig) -> Result<Self> {
        config.validate()?;
        let scheduler = TileScheduler::new(
            Arc::clone(&decoder),
            &config.workers,
            config.tiling.dpi_factor(),
        )?;
        Ok(Self {
            viewport: Viewport::new(config.viewport.clone()),
            renderer: TileRenderer::new(config.debug),
            config,
            decoder,
            scheduler,
            tile_map: None,
            state: InitializationState::Uninitialized,
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn state(&self) -> &InitializationState {
        &self.state
    }

    pub fn descriptor(&self) -> Option<SourceImageDescriptor> {
        self.state.descriptor()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn tile_map(&self) -> Option<&TileMap> {
        self.tile_map.as_ref()
    }

    pub fn decoder(&self) -> &Arc<dyn ImageDecoder> {
        &self.decoder
    }

    pub fn worker_threads(&self) -> usize {
        self.scheduler.threads()
    }

    pub fn debug(&self) -> bool {
        self.renderer.debug()
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.renderer.set_debug(debug);
    }

    /// Receive a [`TileEvent`] whenever a decode resolves. Replaces any
    /// previous subscription.
    pub fn subscribe(&mut self) -> mpsc::Receiver<TileEvent> {
        let (tx, rx) = mpsc::channel();
        self.scheduler.set_event_sender(Some(tx));
        rx
    }

    /// Open `stream`, fit the image into `available`, build the pyramid and
    /// start decoding the base layer.
    ///
    /// Failures do not return early as errors: they move the instance to
    /// [`InitializationState::Error`], which the host inspects.
    pub fn initialize(
        &mut self,
        stream: Box<dyn Read + Send>,
        available: Size,
    ) -> &InitializationState {
        if !matches!(self.state, InitializationState::Uninitialized) {
            warn!("initialize called on an instance that is not uninitialized");
            if self.state.is_success() {
                return &self.state;
            }
        }

        self.state = match self.try_initialize(stream, available) {
            Ok(descriptor) => InitializationState::Success(descriptor),
            Err(err) => {
                warn!(error = %err, backend = self.decoder.name(), "Image initialization failed");
                self.tile_map = None;
                InitializationState::Error(err)
            }
        };
        &self.state
    }

    fn try_initialize(
        &mut self,
        stream: Box<dyn Read + Send>,
        available: Size,
    ) -> Result<SourceImageDescriptor> {
        if available.is_empty() {
            return Err(TesseraError::EmptyViewport {
                width: available.width,
                height: available.height,
            });
        }

        let descriptor = self.decoder.open(stream)?;
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(TesseraError::InvalidDimensions {
                width: descriptor.width,
                height: descriptor.height,
            });
        }

        self.viewport.set_source(descriptor.size());
        self.viewport.set_available_size(available);
        self.viewport.fit_initial(None, None);

        let tiling = &self.config.tiling;
        let full_image_sample_size = base_sample_size(
            &descriptor,
            self.viewport.min_scale(),
            tiling.dpi_factor(),
            tiling.halve_base_layer,
        );
        let params = PyramidParams {
            max_tile_size: tiling
                .max_tile_size
                .unwrap_or_else(|| self.decoder.max_tile_size()),
            viewport: available,
            viewport_tile_ratio: tiling.viewport_tile_ratio,
        };
        let map = TileMap::build(descriptor, full_image_sample_size, &params)?;

        info!(
            width = descriptor.width,
            height = descriptor.height,
            backend = self.decoder.name(),
            base_sample_size = map.base_level(),
            levels = map.level_count(),
            tiles = map.tile_count(),
            "Image initialized"
        );

        self.scheduler.load_base_layer(&map);
        self.scheduler.refresh(&map, &self.viewport, true);
        self.tile_map = Some(map);
        Ok(descriptor)
    }

    /// Run a scheduling pass for the current transform.
    pub fn update(&mut self) -> Option<RefreshOutcome> {
        let map = self.tile_map.as_ref()?;
        Some(self.scheduler.refresh(map, &self.viewport, true))
    }

    pub fn set_available_size(&mut self, available: Size) {
        self.viewport.set_available_size(available);
        self.update();
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        if self.tile_map.is_none() {
            return;
        }
        self.viewport.pan_by(dx, dy);
        self.update();
    }

    pub fn zoom_around(&mut self, factor: f32, focus: PointF) {
        if self.tile_map.is_none() {
            return;
        }
        self.viewport.zoom_around(factor, focus);
        self.update();
    }

    pub fn set_scale_and_center(&mut self, scale: f32, center: PointF) {
        if self.tile_map.is_none() {
            return;
        }
        self.viewport.set_scale_and_center(scale, center);
        self.update();
    }

    /// Level the scheduler decodes at for the current scale.
    pub fn working_sample_size(&self) -> Option<u32> {
        let map = self.tile_map.as_ref()?;
        Some(self.scheduler.working_sample_size(map, self.viewport.scale()))
    }

    /// Draw whatever tiles currently have bitmaps. Never waits for decodes.
    pub fn draw(&self, surface: &mut dyn DrawSurface) -> DrawStats {
        let Some(map) = self.tile_map.as_ref() else {
            return DrawStats::default();
        };
        let working = self.scheduler.working_sample_size(map, self.viewport.scale());
        self.renderer.draw(map, &self.viewport, working, surface)
    }

    /// Block until all outstanding decodes have resolved.
    pub fn wait_for_tiles(&self) -> BatchSummary {
        self.scheduler.wait_idle()
    }

    /// Combined counters of the batches that still have unresolved jobs.
    pub fn pending(&self) -> BatchSummary {
        let mut total = BatchSummary::default();
        for batch in self.scheduler.pending_batches() {
            total.merge(&batch.summary());
        }
        total
    }

    /// Clear tile error flags and request those tiles again.
    pub fn retry_errored(&mut self) -> usize {
        let Some(map) = self.tile_map.as_ref() else {
            return 0;
        };
        let cleared = retry_errored(map);
        if cleared > 0 {
            debug!(cleared, "Retrying errored tiles");
            self.scheduler.load_base_layer(map);
            self.update();
        }
        cleared
    }

    /// Cancel decodes, free every tile, release the decoder and restore
    /// viewport defaults. Safe to call repeatedly and from any state.
    pub fn reset(&mut self) {
        self.scheduler.cancel_all();
        if let Some(map) = self.tile_map.take() {
            let freed = map.free_all();
            debug!(freed, "Freed tile bitmaps");
        }
        self.decoder.release();
        self.viewport.reset();
        if !matches!(self.state, InitializationState::Uninitialized) {
            info!(backend = self.decoder.name(), "Image reset");
        }
        self.state = InitializationState::Uninitialized;
    }

    /// Reset and swap in a fresh decoder so the instance can show another
    /// image.
    pub fn replace_decoder(&mut self, decoder: Arc<dyn ImageDecoder>) {
        self.reset();
        self.scheduler.set_decoder(Arc::clone(&decoder));
        self.decoder = decoder;
    }
}

impl Drop for SubsamplingImage {
    fn drop(&mut self) {
        self.reset();
    }
}
