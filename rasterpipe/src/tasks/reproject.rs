//! Reprojection stage.

use std::path::PathBuf;

use futures::future::BoxFuture;

use crate::ops::{self, ReprojectOptions};
use crate::pipeline::{Artifact, RasterData, Stage, StageError, TaskData};
use crate::raster::RasterBackend;

use super::options_value;

/// Warps the incoming raster into a new CRS/grid at a fixed path.
#[derive(Debug)]
pub struct ReprojectTask {
    path: PathBuf,
    options: ReprojectOptions,
}

impl ReprojectTask {
    const ID: &'static str = "reproject";

    pub fn new(path: impl Into<PathBuf>, options: ReprojectOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }
}

impl<B: RasterBackend> Stage<B> for ReprojectTask {
    fn id(&self) -> &str {
        Self::ID
    }

    fn execute<'a>(
        &'a self,
        backend: &'a B,
        mut data: TaskData<B::Handle>,
    ) -> BoxFuture<'a, Result<TaskData<B::Handle>, StageError>> {
        Box::pin(async move {
            let incoming = data.data.take();
            let result = match &incoming {
                RasterData::Single(handle) => {
                    ops::reproject(backend, handle, &self.path, &self.options)
                        .await
                        .map_err(StageError::from)
                }
                RasterData::None => match data.artifact.primary_path() {
                    Some(source) => match backend.open(source).await {
                        Ok(src) => {
                            let warped =
                                ops::reproject(backend, &src, &self.path, &self.options).await;
                            backend.close(src).await?;
                            warped.map_err(StageError::from)
                        }
                        Err(err) => Err(StageError::from(err)),
                    },
                    None => Err(StageError::MissingData(
                        "no handle and no path artifact".to_string(),
                    )),
                },
                RasterData::Tiles(_) => Err(StageError::InvalidArtifact(
                    "reproject expects a single raster".to_string(),
                )),
            };
            // the predecessor's raster is released even on failure
            if let RasterData::Single(handle) = incoming {
                backend.close(handle).await?;
            }
            let warped = result?;
            data.artifact = Artifact::Path(self.path.clone());
            data.data = RasterData::Single(warped);
            data.push_record(Self::ID, options_value(&self.options));
            Ok(data)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::WGS84_EXTENT;
    use crate::pixels::PixelBuffer;
    use crate::raster::{
        DataType, GeoTransform, MemoryBackend, RasterFormat, Window, PROJ4_WEB_MERCATOR,
        PROJ4_WGS84,
    };
    use crate::tasks::ReadDataTask;

    #[tokio::test]
    async fn chains_after_read_data() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.tiff");
        let handle = backend
            .create(&source, RasterFormat::GTiff, 4, 4, 1, DataType::Float32)
            .await
            .unwrap();
        backend.set_crs(&handle, PROJ4_WGS84).await.unwrap();
        backend
            .set_transform(&handle, GeoTransform::from_extent(&WGS84_EXTENT, 4, 4))
            .await
            .unwrap();
        backend
            .write_pixels(&handle, 1, Window::full(4, 4), &PixelBuffer::new(4, 4))
            .await
            .unwrap();
        backend.close(handle).await.unwrap();

        let read = ReadDataTask::new();
        let data = Stage::<MemoryBackend>::execute(
            &read,
            &backend,
            TaskData::new(Artifact::Path(source)),
        )
        .await
        .unwrap();

        let dst = dir.path().join("merc.tiff");
        let task = ReprojectTask::new(&dst, ReprojectOptions::default());
        let out = Stage::<MemoryBackend>::execute(&task, &backend, data)
            .await
            .unwrap();

        assert_eq!(out.artifact.primary_path(), Some(&dst));
        assert_eq!(out.provenance.len(), 2);
        assert_eq!(out.provenance[1].stage, "reproject");
        if let RasterData::Single(warped) = out.data {
            assert_eq!(
                backend.crs(&warped).await.unwrap().as_deref(),
                Some(PROJ4_WEB_MERCATOR)
            );
            backend.close(warped).await.unwrap();
        } else {
            panic!("expected a warped handle");
        }
    }
}
