//! Raster copy/normalize stage.

use std::path::PathBuf;

use futures::future::BoxFuture;

use crate::ops::{self, WriteOptions};
use crate::pipeline::{Artifact, RasterData, Stage, StageError, TaskData};
use crate::raster::RasterBackend;

use super::options_value;

/// Writes the incoming raster to a fixed path, optionally as 8-bit gray,
/// recording per-band min/max metadata.
#[derive(Debug)]
pub struct WriteRasterTask {
    path: PathBuf,
    options: WriteOptions,
}

impl WriteRasterTask {
    const ID: &'static str = "write-raster";

    pub fn new(path: impl Into<PathBuf>, options: WriteOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }
}

impl<B: RasterBackend> Stage<B> for WriteRasterTask {
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
                    ops::write_raster(backend, handle, &self.path, &self.options)
                        .await
                        .map_err(StageError::from)
                }
                RasterData::None => match data.artifact.primary_path() {
                    Some(source) => match backend.open(source).await {
                        Ok(src) => {
                            let written =
                                ops::write_raster(backend, &src, &self.path, &self.options).await;
                            backend.close(src).await?;
                            written.map_err(StageError::from)
                        }
                        Err(err) => Err(StageError::from(err)),
                    },
                    None => Err(StageError::MissingData(
                        "no handle and no path artifact".to_string(),
                    )),
                },
                RasterData::Tiles(_) => Err(StageError::InvalidArtifact(
                    "write-raster expects a single raster".to_string(),
                )),
            };
            // the incoming handle is released even on failure
            if let RasterData::Single(handle) = incoming {
                backend.close(handle).await?;
            }
            let written = result?;
            data.artifact = Artifact::Path(self.path.clone());
            data.data = RasterData::Single(written);
            data.push_record(Self::ID, options_value(&self.options));
            Ok(data)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::PixelBuffer;
    use crate::raster::{DataType, MemoryBackend, RasterFormat, Window};

    #[tokio::test]
    async fn writes_a_gray_copy_from_a_path_artifact() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.tiff");
        let handle = backend
            .create(&source, RasterFormat::GTiff, 2, 1, 1, DataType::Float32)
            .await
            .unwrap();
        backend
            .write_pixels(
                &handle,
                1,
                Window::full(2, 1),
                &PixelBuffer::from_vec(2, 1, vec![100.0, 300.0]),
            )
            .await
            .unwrap();
        backend.close(handle).await.unwrap();

        let dst = dir.path().join("gray.tiff");
        let options = WriteOptions {
            gray: true,
            data_type: DataType::Byte,
            ..WriteOptions::default()
        };
        let task = WriteRasterTask::new(&dst, options);
        let out = Stage::<MemoryBackend>::execute(
            &task,
            &backend,
            TaskData::new(Artifact::Path(source)),
        )
        .await
        .unwrap();

        assert_eq!(out.artifact.primary_path(), Some(&dst));
        if let RasterData::Single(written) = out.data {
            let pixels = backend
                .read_pixels(&written, 1, Window::full(2, 1))
                .await
                .unwrap();
            assert_eq!(pixels.as_slice(), &[0.0, 255.0]);
            backend.close(written).await.unwrap();
        } else {
            panic!("expected a written handle");
        }
    }
}
