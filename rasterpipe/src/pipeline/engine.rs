//! The sequential pipeline engine.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info};

use super::{Artifact, ProvenanceRecord, Stage, StageError, TaskData};
use crate::raster::RasterBackend;

/// Failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage failed; no later stage was run.
    #[error("stage {stage} failed: {source}")]
    Stage {
        /// Identifier of the failing stage.
        stage: String,
        #[source]
        source: StageError,
        /// Provenance accumulated before the failing stage ran.
        provenance: Vec<ProvenanceRecord>,
    },
}

impl PipelineError {
    /// Identifier of the stage that failed.
    pub fn failing_stage(&self) -> &str {
        match self {
            PipelineError::Stage { stage, .. } => stage,
        }
    }

    /// Provenance log as of the failure.
    pub fn provenance(&self) -> &[ProvenanceRecord] {
        match self {
            PipelineError::Stage { provenance, .. } => provenance,
        }
    }
}

/// Executes an ordered list of stages over the artifact triple.
///
/// Stages run strictly in registration order, one at a time; each
/// receives the triple produced by its predecessor. The first failure
/// aborts the run and is surfaced with the failing stage's identity.
/// Independent pipeline runs (different source rasters) may run in
/// parallel from separate tasks; a single run never overlaps its stages.
pub struct Pipeline<B: RasterBackend> {
    backend: Arc<B>,
    stages: Vec<Box<dyn Stage<B>>>,
}

impl<B: RasterBackend> Pipeline<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            stages: Vec::new(),
        }
    }

    /// The backend stages execute against.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Registers a stage at the end of the sequence.
    ///
    /// Registration emits a diagnostic event but has no effect beyond
    /// appending to the execution order.
    pub fn register<S>(&mut self, stage: S) -> &mut Self
    where
        S: Stage<B> + 'static,
    {
        info!(stage = stage.id(), "stage registered");
        self.stages.push(Box::new(stage));
        self
    }

    /// Number of registered stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs all stages over `initial`, returning the final triple.
    pub async fn run(&self, initial: Artifact) -> Result<TaskData<B::Handle>, PipelineError> {
        let mut data = TaskData::new(initial);
        for stage in &self.stages {
            let id = stage.id().to_string();
            debug!(stage = %id, "stage starting");
            // The triple moves into the stage; keep the log so a failure
            // can still report what completed before it.
            let completed = data.provenance.clone();
            data = stage
                .execute(self.backend.as_ref(), data)
                .await
                .map_err(|source| {
                    error!(stage = %id, error = %source, "stage failed, aborting run");
                    PipelineError::Stage {
                        stage: id.clone(),
                        source,
                        provenance: completed,
                    }
                })?;
            debug!(stage = %id, records = data.provenance.len(), "stage complete");
        }
        info!(stages = self.stages.len(), "all stages complete");
        Ok(data)
    }
}
