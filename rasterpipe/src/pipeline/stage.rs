//! Stage trait and stage-level errors.

use std::path::PathBuf;

use futures::future::BoxFuture;
use thiserror::Error;

use super::TaskData;
use crate::coord::CoordError;
use crate::raster::{BackendError, RasterBackend};
use crate::store::{ArchiveError, StoreError};
use crate::tiler::TileError;

/// Errors a stage can fail with.
#[derive(Debug, Error)]
pub enum StageError {
    /// A raster backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Tile pyramid generation failed before any tile work started.
    #[error(transparent)]
    Tiles(#[from] TileError),

    /// Coordinate or zoom range error.
    #[error(transparent)]
    Coord(#[from] CoordError),

    /// Archive writer failure.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Object storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Filesystem failure outside the backend.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stage received neither a reusable in-memory handle nor a
    /// resolvable artifact reference.
    #[error("missing predecessor data: {0}")]
    MissingData(String),

    /// The stage received an artifact shape it cannot process.
    #[error("unexpected artifact for stage: {0}")]
    InvalidArtifact(String),
}

/// One opaque transformation over the artifact triple.
///
/// Stages are registered with a [`Pipeline`](super::Pipeline) and executed
/// strictly in registration order. A stage receives the triple produced by
/// its predecessor, returns a new triple on success, and appends exactly
/// one provenance record. Idempotence is a property of individual stages;
/// the engine imposes no retry.
///
/// `execute` returns a boxed future so the trait stays dyn-compatible,
/// following the same shape as other capability traits in this crate.
pub trait Stage<B: RasterBackend>: Send + Sync {
    /// Short identifier used in logs, errors, and provenance records.
    fn id(&self) -> &str;

    /// Runs the stage.
    fn execute<'a>(
        &'a self,
        backend: &'a B,
        data: TaskData<B::Handle>,
    ) -> BoxFuture<'a, Result<TaskData<B::Handle>, StageError>>;
}
