//! Image encoding stage.

use std::path::PathBuf;

use futures::future::BoxFuture;

use crate::ops::{self, EncodeOptions};
use crate::pipeline::{RasterData, Stage, StageError, TaskData};
use crate::raster::RasterBackend;

use super::options_value;

/// Encodes the incoming raster or tile map as PNG/JPEG images under a
/// fixed output folder.
#[derive(Debug)]
pub struct EncodeImageTask {
    folder: PathBuf,
    options: EncodeOptions,
}

impl EncodeImageTask {
    const ID: &'static str = "encode-image";

    pub fn new(folder: impl Into<PathBuf>, options: EncodeOptions) -> Self {
        Self {
            folder: folder.into(),
            options,
        }
    }
}

impl<B: RasterBackend> Stage<B> for EncodeImageTask {
    fn id(&self) -> &str {
        Self::ID
    }

    fn execute<'a>(
        &'a self,
        backend: &'a B,
        mut data: TaskData<B::Handle>,
    ) -> BoxFuture<'a, Result<TaskData<B::Handle>, StageError>> {
        Box::pin(async move {
            let result = ops::encode_image(backend, &mut data, &self.folder, &self.options).await;
            if result.is_err() {
                // a failed encode must not strand the incoming raster
                if let RasterData::Single(handle) = data.data.take() {
                    backend.close(handle).await?;
                }
            }
            result?;
            data.push_record(Self::ID, options_value(&self.options));
            Ok(data)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileId;
    use crate::pipeline::Artifact;
    use crate::pixels::PixelBuffer;
    use crate::raster::{DataType, MemoryBackend, RasterFormat, Window};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn encodes_a_tile_map_to_png() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let tile_path = dir.path().join("tiles/0/0/0.tiff");
        ops::ensure_parent(&tile_path).await.unwrap();
        let handle = backend
            .create(&tile_path, RasterFormat::GTiff, 2, 2, 1, DataType::Float32)
            .await
            .unwrap();
        backend
            .write_pixels(
                &handle,
                1,
                Window::full(2, 2),
                &PixelBuffer::from_vec(2, 2, vec![0.0, 64.0, 128.0, 255.0]),
            )
            .await
            .unwrap();
        backend.close(handle).await.unwrap();

        let id = TileId::new(0, 0, 0);
        let mut tiles = BTreeMap::new();
        tiles.insert(id.clone(), tile_path);

        let task = EncodeImageTask::new(dir.path(), EncodeOptions::default());
        let out = Stage::<MemoryBackend>::execute(
            &task,
            &backend,
            TaskData::new(Artifact::Tiles(tiles)),
        )
        .await
        .unwrap();

        match &out.artifact {
            Artifact::Tiles(images) => {
                assert_eq!(
                    images.get(&id),
                    Some(&dir.path().join("png/0/0/0.png"))
                );
            }
            other => panic!("unexpected artifact: {other:?}"),
        }
        assert_eq!(out.provenance[0].stage, "encode-image");
    }
}
