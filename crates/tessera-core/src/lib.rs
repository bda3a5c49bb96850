pub mod config;
pub mod consts;
pub mod decoder;
pub mod error;
pub mod geometry;
pub mod render;
pub mod renderer;
pub mod sampling;
pub mod scheduler;
pub mod tile;
pub mod tile_map;
pub mod viewport;

pub use config::RendererConfig;
pub use decoder::{Bitmap, ImageDecoder, PatternDecoder, RasterDecoder, SourceImageDescriptor};
pub use error::{DecodeError, Result, TesseraError};
pub use render::{DrawStats, DrawSurface, RasterSurface};
pub use renderer::{InitializationState, SubsamplingImage};
