//! Rasterpipe - raster processing pipelines and web-mercator tile
//! pyramids.
//!
//! The crate is organized around three layers:
//!
//! - [`pipeline`] runs an ordered list of stages over an artifact
//!   triple (artifact reference, raster data, provenance log),
//!   fail-fast and strictly sequential.
//! - [`tiler`] and [`ops`] hold the raster operations the stages wrap:
//!   reprojection, raster copies, image encoding, and the per-zoom
//!   cache / enlarge / slice tile generator.
//! - [`raster`] abstracts dataset access behind the [`raster::RasterBackend`]
//!   trait; [`raster::MemoryBackend`] is the built-in implementation.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rasterpipe::pipeline::{Artifact, Pipeline};
//! use rasterpipe::raster::MemoryBackend;
//! use rasterpipe::tasks::{GenerateTilesTask, ReadDataTask};
//! use rasterpipe::tiler::TileOptions;
//!
//! let mut pipeline = Pipeline::new(Arc::new(MemoryBackend::new()));
//! pipeline.register(ReadDataTask::new());
//! pipeline.register(GenerateTilesTask::new("/data/out", TileOptions::default()));
//! let result = pipeline.run(Artifact::Path("/data/src.tiff".into())).await?;
//! ```

pub mod config;
pub mod coord;
pub mod logging;
pub mod ops;
pub mod pipeline;
pub mod pixels;
pub mod raster;
pub mod store;
pub mod tasks;
pub mod tiler;

/// Version of the rasterpipe library and CLI.
///
/// Synchronized across all components in the workspace via `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
