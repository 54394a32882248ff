//! Archive packaging stage.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::pipeline::{Artifact, Stage, StageError, TaskData};
use crate::raster::RasterBackend;
use crate::store::TileArchive;

/// Pushes the produced tiles into a [`TileArchive`].
///
/// The artifact passes through unchanged; the provenance record carries
/// the archive path, its SHA-256 checksum and any tiles that failed to
/// store. A failed tile is logged and skipped, a failed session is
/// fatal.
pub struct WriteArchiveTask {
    archive: Arc<dyn TileArchive>,
    /// Path of the finished archive file, hashed after `finish`.
    path: PathBuf,
}

impl WriteArchiveTask {
    const ID: &'static str = "write-archive";

    pub fn new(archive: Arc<dyn TileArchive>, path: impl Into<PathBuf>) -> Self {
        Self {
            archive,
            path: path.into(),
        }
    }

    async fn checksum(&self) -> Result<Option<String>, StageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| StageError::Io {
                path: self.path.clone(),
                source,
            })?;
        let digest = Sha256::digest(&bytes);
        Ok(Some(digest.iter().map(|b| format!("{b:02x}")).collect()))
    }
}

impl<B: RasterBackend> Stage<B> for WriteArchiveTask {
    fn id(&self) -> &str {
        Self::ID
    }

    fn execute<'a>(
        &'a self,
        _backend: &'a B,
        mut data: TaskData<B::Handle>,
    ) -> BoxFuture<'a, Result<TaskData<B::Handle>, StageError>> {
        Box::pin(async move {
            let tiles = match &data.artifact {
                Artifact::Tiles(tiles) => tiles.clone(),
                other => {
                    return Err(StageError::InvalidArtifact(format!(
                        "write-archive needs a tile map, got {other:?}"
                    )))
                }
            };

            self.archive.begin().await?;
            let mut failed = Vec::new();
            for (id, path) in &tiles {
                let bytes = match tokio::fs::read(path).await {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!(tile = %id, error = %err, "tile unreadable, skipping");
                        failed.push(id.to_string());
                        continue;
                    }
                };
                if let Err(err) = self.archive.put_tile(id.coord, bytes).await {
                    warn!(tile = %id, error = %err, "tile store failed, skipping");
                    failed.push(id.to_string());
                }
            }
            self.archive.finish().await?;

            let checksum = self.checksum().await?;
            debug!(
                archive = %self.path.display(),
                tiles = tiles.len() - failed.len(),
                failed = failed.len(),
                "archive written"
            );
            data.push_record(
                Self::ID,
                json!({
                    "archive": self.path,
                    "sha256": checksum,
                    "failed_tiles": failed,
                }),
            );
            Ok(data)
        })
    }
}
