//! Task pipeline engine
//!
//! A pipeline threads the `(artifact reference, in-memory handle,
//! provenance log)` triple through an ordered sequence of stages with
//! fail-fast semantics. Stages are opaque behind the [`Stage`] trait;
//! the engine only sequences them and attaches the failing stage's
//! identity to any error.
//!
//! # Example
//!
//! ```ignore
//! use rasterpipe::pipeline::{Artifact, Pipeline};
//! use rasterpipe::raster::MemoryBackend;
//! use rasterpipe::tasks::{GenerateTilesTask, ReadDataTask};
//!
//! let mut pipeline = Pipeline::new(Arc::new(MemoryBackend::new()));
//! pipeline
//!     .register(ReadDataTask::new())
//!     .register(GenerateTilesTask::new(out_dir, TileOptions::default()));
//! let result = pipeline.run(Artifact::Path(source)).await?;
//! ```

mod artifact;
mod engine;
mod stage;

pub use artifact::{Artifact, DataSummary, ProvenanceRecord, RasterData, TaskData};
pub use engine::{Pipeline, PipelineError};
pub use stage::{Stage, StageError};
