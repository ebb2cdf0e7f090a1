//! Fence Render - Cache, renderers, and concurrent orchestration
//!
//! This crate turns delimited regions into displayable artifacts:
//! - Content-addressed art directory cache
//! - External LaTeX/gnuplot renderer adapters and SVG rasterization
//! - Bounded worker pool and change detection
//! - Background render worker fed with buffer snapshots

pub mod cache;
pub mod change;
pub mod error;
pub mod orchestrator;
pub mod pool;
pub mod raster;
pub mod renderer;
pub mod worker;

// Re-export main types
pub use cache::RenderCache;
pub use change::ChangeDetector;
pub use error::RenderError;
pub use orchestrator::{Batch, Orchestrator, RenderStatus, RenderedRegion};
pub use pool::WorkerPool;
pub use raster::{default_rasterizer, Rasterizer};
pub use renderer::{CommandRenderer, Renderer};
pub use worker::{RenderRequest, RenderUpdate, RenderWorker};
