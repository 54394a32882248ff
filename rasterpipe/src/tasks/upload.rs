//! Remote upload stage.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, warn};

use crate::pipeline::{Artifact, Stage, StageError, TaskData};
use crate::raster::RasterBackend;
use crate::store::ObjectStore;

/// Uploads the artifact's files to an [`ObjectStore`] under a key
/// prefix.
///
/// Tile maps keep their `band/z/x/y` layout in the key space; plain
/// paths upload under their file name. Individual upload failures are
/// logged and collected, not fatal.
pub struct UploadTask {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl UploadTask {
    const ID: &'static str = "upload";

    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }
}

impl<B: RasterBackend> Stage<B> for UploadTask {
    fn id(&self) -> &str {
        Self::ID
    }

    fn execute<'a>(
        &'a self,
        _backend: &'a B,
        mut data: TaskData<B::Handle>,
    ) -> BoxFuture<'a, Result<TaskData<B::Handle>, StageError>> {
        Box::pin(async move {
            let mut uploaded = 0usize;
            let mut failed = Vec::new();

            match &data.artifact {
                Artifact::Tiles(tiles) => {
                    for (id, path) in tiles {
                        let extension = path
                            .extension()
                            .and_then(|e| e.to_str())
                            .unwrap_or("tiff");
                        let mut key = self.prefix.clone();
                        if !id.band.is_empty() {
                            key.push('/');
                            key.push_str(&id.band);
                        }
                        key.push_str(&format!(
                            "/{}/{}/{}.{}",
                            id.coord.z, id.coord.x, id.coord.y, extension
                        ));
                        match self.store.put(path, &key).await {
                            Ok(()) => uploaded += 1,
                            Err(err) => {
                                warn!(key = %key, error = %err, "upload failed, skipping");
                                failed.push(key);
                            }
                        }
                    }
                }
                artifact => {
                    for path in artifact.paths() {
                        let name = path
                            .file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("artifact");
                        let key = format!("{}/{}", self.prefix, name);
                        match self.store.put(path, &key).await {
                            Ok(()) => uploaded += 1,
                            Err(err) => {
                                warn!(key = %key, error = %err, "upload failed, skipping");
                                failed.push(key);
                            }
                        }
                    }
                }
            }

            debug!(uploaded, failed = failed.len(), prefix = %self.prefix, "upload finished");
            data.push_record(
                Self::ID,
                json!({
                    "prefix": self.prefix,
                    "uploaded": uploaded,
                    "failed_keys": failed,
                }),
            );
            Ok(data)
        })
    }
}
