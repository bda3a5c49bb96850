//! Decode scheduling: working-level selection, visibility, and the worker
//! pool that fills tiles with pixels.
//!
//! The owner thread calls [`TileScheduler::refresh`] after every
//! scale/translate change. It never waits for decodes: requests fan out to a
//! rayon pool and each job publishes its result straight into its tile, so
//! the next frame draws whatever has arrived. A [`DecodeBatch`] tracks the
//! fan-in for callers that do want to wait.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use rayon::ThreadPool;
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::decoder::ImageDecoder;
use crate::error::{DecodeError, Result, TesseraError};
use crate::geometry::SourceRect;
use crate::sampling::calculate_in_sample_size;
use crate::tile::Tile;
use crate::tile_map::TileMap;
use crate::viewport::Viewport;

/// Notification pushed to the host as each decode resolves.
#[derive(Clone, Debug, PartialEq)]
pub enum TileEvent {
    Loaded {
        sample_size: u32,
        rect: SourceRect,
    },
    Failed {
        sample_size: u32,
        rect: SourceRect,
        error: DecodeError,
    },
}

/// Counts of how the jobs of a batch resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub loaded: usize,
    pub failed: usize,
    /// Jobs abandoned by a reset, or skipped because the tile left the view.
    pub cancelled: usize,
}

impl BatchSummary {
    pub fn resolved(&self) -> usize {
        self.loaded + self.failed + self.cancelled
    }

    /// Add the counters of `other` to `self`.
    pub fn merge(&mut self, other: &BatchSummary) {
        self.total += other.total;
        self.loaded += other.loaded;
        self.failed += other.failed;
        self.cancelled += other.cancelled;
    }
}

#[derive(Debug)]
struct BatchInner {
    summary: Mutex<BatchSummary>,
    settled: Condvar,
}

/// Fan-out/fan-in handle for one group of decode requests.
///
/// Cloning shares the same counters.
#[derive(Clone, Debug)]
pub struct DecodeBatch {
    inner: Arc<BatchInner>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JobOutcome {
    Loaded,
    Failed,
    Cancelled,
}

impl DecodeBatch {
    fn new(total: usize) -> Self {
        Self {
            inner: Arc::new(BatchInner {
                summary: Mutex::new(BatchSummary {
                    total,
                    ..Default::default()
                }),
                settled: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BatchSummary> {
        self.inner.summary.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn complete(&self, outcome: JobOutcome) {
        let mut summary = self.lock();
        match outcome {
            JobOutcome::Loaded => summary.loaded += 1,
            JobOutcome::Failed => summary.failed += 1,
            JobOutcome::Cancelled => summary.cancelled += 1,
        }
        if summary.resolved() >= summary.total {
            self.inner.settled.notify_all();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().total
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> BatchSummary {
        *self.lock()
    }

    pub fn is_settled(&self) -> bool {
        let summary = self.lock();
        summary.resolved() >= summary.total
    }

    /// Block until every job in the batch has resolved.
    pub fn wait(&self) -> BatchSummary {
        let mut summary = self.lock();
        while summary.resolved() < summary.total {
            summary = self
                .inner
                .settled
                .wait(summary)
                .unwrap_or_else(|e| e.into_inner());
        }
        *summary
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<BatchSummary> {
        let summary = self.lock();
        let (summary, _) = self
            .inner
            .settled
            .wait_timeout_while(summary, timeout, |s| s.resolved() < s.total)
            .unwrap_or_else(|e| e.into_inner());
        if summary.resolved() >= summary.total {
            Some(*summary)
        } else {
            None
        }
    }
}

/// Result of one scheduling pass.
#[derive(Clone, Debug)]
pub struct RefreshOutcome {
    pub working_sample_size: u32,
    /// Tiles at the working level intersecting the viewport.
    pub visible: usize,
    /// Bitmaps dropped because their level is no longer needed.
    pub freed: usize,
    pub batch: Option<DecodeBatch>,
}

/// State shared by every decode job of one scheduler.
struct DecodeContext {
    decoder: Arc<dyn ImageDecoder>,
    generation: AtomicU64,
    serialize: bool,
    serial: Mutex<()>,
}

pub struct TileScheduler {
    pool: ThreadPool,
    threads: usize,
    ctx: Arc<DecodeContext>,
    dpi_factor: f32,
    events: Option<mpsc::Sender<TileEvent>>,
    batches: Vec<DecodeBatch>,
}

impl TileScheduler {
    pub fn new(
        decoder: Arc<dyn ImageDecoder>,
        workers: &WorkerConfig,
        dpi_factor: f32,
    ) -> Result<Self> {
        let threads = workers.resolved_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tessera-decode-{i}"))
            .build()
            .map_err(|e| TesseraError::ThreadPool(e.to_string()))?;

        let serialize = !decoder.supports_concurrent_decode();
        debug!(threads, serialize, backend = decoder.name(), "Decode pool ready");

        Ok(Self {
            pool,
            threads,
            ctx: Arc::new(DecodeContext {
                decoder,
                generation: AtomicU64::new(0),
                serialize,
                serial: Mutex::new(()),
            }),
            dpi_factor,
            events: None,
            batches: Vec::new(),
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn dpi_factor(&self) -> f32 {
        self.dpi_factor
    }

    /// Route [`TileEvent`]s to `sender`.
    pub fn set_event_sender(&mut self, sender: Option<mpsc::Sender<TileEvent>>) {
        self.events = sender;
    }

    /// Level to decode at for the current scale, never coarser than the base.
    pub fn working_sample_size(&self, map: &TileMap, scale: f32) -> u32 {
        let source = map.source();
        let sample_size = calculate_in_sample_size(source.width, source.height, scale, self.dpi_factor);
        sample_size.min(map.base_level())
    }

    /// Update tile visibility for the viewport and, when `load` is set,
    /// enqueue decodes for visible tiles that have nothing to draw.
    pub fn refresh(&mut self, map: &TileMap, viewport: &Viewport, load: bool) -> RefreshOutcome {
        let working = self.working_sample_size(map, viewport.scale());
        let base = map.base_level();
        let visible_area = viewport.visible_source_rect();

        let mut to_load = Vec::new();
        let mut visible = 0;
        let mut freed = 0;

        for level in map.levels() {
            for tile in map.tiles(level) {
                if level < working || (level > working && level != base) {
                    tile.set_visible(false);
                    freed += usize::from(tile.free_bitmap());
                }

                if level == working {
                    if tile.source_rect().overlaps(&visible_area) {
                        tile.set_visible(true);
                        visible += 1;
                        if load && tile.needs_decode() && tile.try_begin_loading() {
                            to_load.push(Arc::clone(tile));
                        }
                    } else if level != base {
                        tile.set_visible(false);
                        freed += usize::from(tile.free_bitmap());
                    }
                } else if level == base {
                    tile.set_visible(true);
                }
            }
        }

        debug!(
            working,
            visible,
            freed,
            enqueued = to_load.len(),
            "Refreshed required tiles"
        );

        let batch = (!to_load.is_empty()).then(|| self.spawn_batch(to_load));
        RefreshOutcome {
            working_sample_size: working,
            visible,
            freed,
            batch,
        }
    }

    /// Enqueue every base-layer tile so the fallback layer is complete.
    pub fn load_base_layer(&mut self, map: &TileMap) -> Option<DecodeBatch> {
        let tiles: Vec<Arc<Tile>> = map
            .tiles(map.base_level())
            .iter()
            .filter(|t| t.needs_decode() && t.try_begin_loading())
            .cloned()
            .collect();
        (!tiles.is_empty()).then(|| self.spawn_batch(tiles))
    }

    /// Decode `tiles`, which the caller has already marked loading.
    fn spawn_batch(&mut self, tiles: Vec<Arc<Tile>>) -> DecodeBatch {
        self.batches.retain(|b| !b.is_settled());

        let batch = DecodeBatch::new(tiles.len());
        let generation = self.ctx.generation.load(Ordering::Acquire);

        for tile in tiles {
            let ctx = Arc::clone(&self.ctx);
            let batch = batch.clone();
            let events = self.events.clone();
            self.pool.spawn(move || {
                let outcome = run_decode(&ctx, &tile, generation, events.as_ref());
                batch.complete(outcome);
            });
        }

        self.batches.push(batch.clone());
        batch
    }

    /// Abandon in-flight work: queued jobs skip their decode and results
    /// still in flight are discarded.
    pub fn cancel_all(&mut self) {
        let generation = self.ctx.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation, "Cancelled outstanding decodes");
        self.batches.clear();
    }

    /// Cancel outstanding work and route future jobs to `decoder`.
    pub fn set_decoder(&mut self, decoder: Arc<dyn ImageDecoder>) {
        self.cancel_all();
        let serialize = !decoder.supports_concurrent_decode();
        debug!(serialize, backend = decoder.name(), "Decoder replaced");
        self.ctx = Arc::new(DecodeContext {
            decoder,
            generation: AtomicU64::new(self.ctx.generation.load(Ordering::Acquire)),
            serialize,
            serial: Mutex::new(()),
        });
    }

    /// Batches with unresolved jobs.
    pub fn pending_batches(&self) -> Vec<DecodeBatch> {
        self.batches
            .iter()
            .filter(|b| !b.is_settled())
            .cloned()
            .collect()
    }

    /// Block until every outstanding batch has resolved.
    pub fn wait_idle(&self) -> BatchSummary {
        let mut total = BatchSummary::default();
        for batch in &self.batches {
            total.merge(&batch.wait());
        }
        total
    }
}

/// Clear error flags so the next refresh requests those tiles again.
pub fn retry_errored(map: &TileMap) -> usize {
    let mut cleared = 0;
    for tile in map.all_tiles() {
        if tile.is_error() {
            tile.set_error(false);
            cleared += 1;
        }
    }
    cleared
}

fn run_decode(
    ctx: &DecodeContext,
    tile: &Tile,
    generation: u64,
    events: Option<&mpsc::Sender<TileEvent>>,
) -> JobOutcome {
    let is_current = || ctx.generation.load(Ordering::Acquire) == generation;

    if !is_current() || !tile.is_visible() || !ctx.decoder.is_ready() {
        tile.set_loading(false);
        return JobOutcome::Cancelled;
    }

    let rect = tile.source_rect();
    let sample_size = tile.sample_size();

    let result = {
        let _guard = ctx
            .serialize
            .then(|| ctx.serial.lock().unwrap_or_else(|e| e.into_inner()));
        catch_unwind(AssertUnwindSafe(|| {
            ctx.decoder.decode_region(rect, sample_size)
        }))
        .unwrap_or_else(|_| Err(DecodeError::Corrupt("decoder panicked".into())))
    };

    if !is_current() {
        tile.set_loading(false);
        return JobOutcome::Cancelled;
    }

    match result {
        Ok(bitmap) if tile.is_visible() => {
            tile.finish_loaded(Arc::new(bitmap));
            debug!(sample_size, ?rect, "Tile decoded");
            notify(events, TileEvent::Loaded { sample_size, rect });
            JobOutcome::Loaded
        }
        Ok(_) => {
            // Scrolled away while decoding; the tile stays eligible.
            tile.set_loading(false);
            JobOutcome::Cancelled
        }
        Err(DecodeError::Cancelled) | Err(DecodeError::Released) => {
            tile.set_loading(false);
            JobOutcome::Cancelled
        }
        Err(error) => {
            warn!(sample_size, ?rect, %error, "Tile decode failed");
            tile.finish_failed();
            notify(
                events,
                TileEvent::Failed {
                    sample_size,
                    rect,
                    error,
                },
            );
            JobOutcome::Failed
        }
    }
}

fn notify(events: Option<&mpsc::Sender<TileEvent>>, event: TileEvent) {
    if let Some(tx) = events {
        // Receiver may be gone.
        let _ = tx.send(event);
    }
}
