//! Opens the source dataset named by the artifact reference.

use futures::future::BoxFuture;
use tracing::debug;

use crate::pipeline::{Artifact, RasterData, Stage, StageError, TaskData};
use crate::raster::RasterBackend;

/// First stage of most pipelines: turns a path artifact into an open
/// raster handle for downstream stages.
#[derive(Debug, Default)]
pub struct ReadDataTask;

impl ReadDataTask {
    const ID: &'static str = "read-data";

    pub fn new() -> Self {
        Self
    }
}

impl<B: RasterBackend> Stage<B> for ReadDataTask {
    fn id(&self) -> &str {
        Self::ID
    }

    fn execute<'a>(
        &'a self,
        backend: &'a B,
        mut data: TaskData<B::Handle>,
    ) -> BoxFuture<'a, Result<TaskData<B::Handle>, StageError>> {
        Box::pin(async move {
            if !data.data.is_none() {
                return Err(StageError::InvalidArtifact(
                    "read-data expects no open handle".to_string(),
                ));
            }
            let path = match &data.artifact {
                Artifact::Path(path) => path.clone(),
                other => {
                    return Err(StageError::MissingData(format!(
                        "read-data needs a path artifact, got {other:?}"
                    )))
                }
            };
            let handle = backend.open(&path).await?;
            debug!(path = %path.display(), "opened source dataset");
            data.data = RasterData::Single(handle);
            data.push_record(Self::ID, serde_json::Value::Null);
            Ok(data)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{DataType, MemoryBackend, RasterFormat};

    #[tokio::test]
    async fn opens_the_artifact_path() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src.tiff");
        let handle = backend
            .create(&path, RasterFormat::GTiff, 2, 2, 1, DataType::Float32)
            .await
            .unwrap();
        backend.close(handle).await.unwrap();

        let task = ReadDataTask::new();
        let out = Stage::<MemoryBackend>::execute(
            &task,
            &backend,
            TaskData::new(Artifact::Path(path.clone())),
        )
        .await
        .unwrap();

        assert_eq!(out.artifact.primary_path(), Some(&path));
        assert_eq!(out.provenance.len(), 1);
        assert_eq!(out.provenance[0].stage, "read-data");
        if let RasterData::Single(handle) = out.data {
            backend.close(handle).await.unwrap();
        } else {
            panic!("expected an open handle");
        }
    }

    #[tokio::test]
    async fn rejects_a_missing_artifact() {
        let backend = MemoryBackend::new();
        let task = ReadDataTask::new();
        let err = Stage::<MemoryBackend>::execute(&task, &backend, TaskData::new(Artifact::None))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::MissingData(_)));
    }
}
