/// Default upper bound for the viewport scale (3.0 = 300%).
pub const DEFAULT_MAX_SCALE: f32 = 3.0;

/// Coarsest sample size the calculator returns, also used when the
/// requested dimensions truncate to zero.
pub const MAX_SAMPLE_SIZE: u32 = 32;

/// Finer pyramid levels split tiles until each decoded span is at most this
/// multiple of the viewport span.
pub const DEFAULT_VIEWPORT_TILE_RATIO: f32 = 1.25;

/// Maximum decoded tile edge assumed when the backend does not report one.
pub const DEFAULT_MAX_TILE_SIZE: u32 = 2048;

/// Minimum density (dots per inch) tiles are decoded at before the scheduler
/// switches to a finer level.
pub const DEFAULT_MINIMUM_TILE_DPI: f32 = 320.0;

/// Density of the target surface. Equal to the minimum tile DPI by default,
/// which makes the DPI adjustment a no-op.
pub const DEFAULT_SCREEN_DPI: f32 = 320.0;

/// Centering ratio used when no padding insets are configured.
pub const DEFAULT_PADDING_RATIO: f32 = 0.5;

/// Background colour cleared into raster surfaces (opaque dark grey).
pub const DEFAULT_BACKGROUND_RGBA: [u8; 4] = [24, 24, 24, 255];

/// Debug outline colour for tiles with a bitmap.
pub const DEBUG_READY_RGBA: [u8; 4] = [0, 200, 80, 255];

/// Debug outline colour for tiles still loading.
pub const DEBUG_LOADING_RGBA: [u8; 4] = [230, 190, 0, 255];

/// Debug outline colour for tiles whose decode failed.
pub const DEBUG_ERROR_RGBA: [u8; 4] = [220, 40, 40, 255];

/// Fill used for errored tiles with no fallback drawn beneath them.
pub const ERROR_TILE_FILL_RGBA: [u8; 4] = [90, 20, 20, 255];

/// Checkerboard cell edge (in source pixels) for the procedural source.
pub const PATTERN_CELL_SIZE: u32 = 256;
