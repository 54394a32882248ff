//! The artifact triple threaded through the pipeline.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::coord::TileId;

/// Where an artifact currently lives on durable storage.
///
/// Immutable once produced by a stage; the next stage receives it as-is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Artifact {
    /// No artifact yet (or a stage that only mutated in-memory state).
    #[default]
    None,
    /// A single file.
    Path(PathBuf),
    /// An ordered list of files.
    Paths(Vec<PathBuf>),
    /// A tile set: tile identifier to file path.
    Tiles(BTreeMap<TileId, PathBuf>),
}

impl Artifact {
    /// The first (or only) path, if any.
    pub fn primary_path(&self) -> Option<&PathBuf> {
        match self {
            Artifact::None => None,
            Artifact::Path(p) => Some(p),
            Artifact::Paths(ps) => ps.first(),
            Artifact::Tiles(map) => map.values().next(),
        }
    }

    /// All paths the artifact refers to, in deterministic order.
    pub fn paths(&self) -> Vec<&PathBuf> {
        match self {
            Artifact::None => Vec::new(),
            Artifact::Path(p) => vec![p],
            Artifact::Paths(ps) => ps.iter().collect(),
            Artifact::Tiles(map) => map.values().collect(),
        }
    }
}

/// The in-memory raster side of the triple.
///
/// Handles are exclusively owned by the stage currently processing them;
/// whichever stage last holds one must release it through the backend.
#[derive(Debug, Default)]
pub enum RasterData<H> {
    #[default]
    None,
    /// One open dataset.
    Single(H),
    /// One open dataset per tile.
    Tiles(BTreeMap<TileId, H>),
}

impl<H> RasterData<H> {
    pub fn is_none(&self) -> bool {
        matches!(self, RasterData::None)
    }

    /// Takes the data out, leaving `None` behind.
    pub fn take(&mut self) -> RasterData<H> {
        std::mem::take(self)
    }

    /// Shape of the data for provenance snapshots.
    pub fn summary(&self) -> DataSummary {
        match self {
            RasterData::None => DataSummary::None,
            RasterData::Single(_) => DataSummary::Single,
            RasterData::Tiles(map) => DataSummary::Tiles(map.len()),
        }
    }
}

/// A serializable snapshot of [`RasterData`] without the handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSummary {
    None,
    Single,
    Tiles(usize),
}

/// One completed stage's entry in the provenance log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Identifier of the stage that produced the artifact.
    pub stage: String,
    /// The artifact reference the stage produced.
    pub artifact: Artifact,
    /// Snapshot of the in-memory data shape at completion.
    pub data: DataSummary,
    /// The options the stage ran with, serialized for auditability.
    pub options: serde_json::Value,
}

/// The `(artifact, in-memory data, provenance)` triple.
#[derive(Debug)]
pub struct TaskData<H> {
    pub artifact: Artifact,
    pub data: RasterData<H>,
    pub provenance: Vec<ProvenanceRecord>,
}

impl<H> TaskData<H> {
    /// The triple handed to the first stage: an initial artifact
    /// reference, no handle, empty log.
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            data: RasterData::None,
            provenance: Vec::new(),
        }
    }

    /// Appends the executing stage's record. Called exactly once per
    /// successful stage, after `artifact` and `data` have been updated.
    pub fn push_record(&mut self, stage: &str, options: serde_json::Value) {
        self.provenance.push(ProvenanceRecord {
            stage: stage.to_string(),
            artifact: self.artifact.clone(),
            data: self.data.summary(),
            options,
        });
    }
}
