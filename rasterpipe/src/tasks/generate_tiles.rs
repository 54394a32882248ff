//! Tile pyramid stage.

use std::path::PathBuf;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::warn;

use crate::ops::SourceRef;
use crate::pipeline::{Artifact, RasterData, Stage, StageError, TaskData};
use crate::raster::RasterBackend;
use crate::tiler::{self, TileOptions};

/// Slices the incoming raster into a web-mercator tile pyramid under a
/// fixed output folder.
///
/// Tiles that fail individually do not fail the stage; their ids land in
/// the provenance record under `missing_tiles` and are logged.
#[derive(Debug)]
pub struct GenerateTilesTask {
    folder: PathBuf,
    options: TileOptions,
}

impl GenerateTilesTask {
    const ID: &'static str = "generate-tiles";

    pub fn new(folder: impl Into<PathBuf>, options: TileOptions) -> Self {
        Self {
            folder: folder.into(),
            options,
        }
    }
}

impl<B: RasterBackend> Stage<B> for GenerateTilesTask {
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
                RasterData::Single(handle) => tiler::generate_tiles(
                    backend,
                    SourceRef::Handle(handle),
                    &self.folder,
                    &self.options,
                )
                .await
                .map_err(StageError::from),
                RasterData::None => match data.artifact.primary_path() {
                    Some(source) => tiler::generate_tiles(
                        backend,
                        SourceRef::Path(source),
                        &self.folder,
                        &self.options,
                    )
                    .await
                    .map_err(StageError::from),
                    None => Err(StageError::MissingData(
                        "no handle and no path artifact".to_string(),
                    )),
                },
                RasterData::Tiles(_) => Err(StageError::InvalidArtifact(
                    "generate-tiles expects a single raster".to_string(),
                )),
            };
            // the incoming handle is released whether or not the run
            // succeeded
            if let RasterData::Single(handle) = incoming {
                backend.close(handle).await?;
            }
            let run = result?;

            if !run.is_complete() {
                warn!(
                    missing = run.missing.len(),
                    produced = run.tiles.len(),
                    "tile run incomplete"
                );
            }
            let missing: Vec<String> = run.missing.keys().map(ToString::to_string).collect();
            data.artifact = Artifact::Tiles(run.tiles);
            data.data = RasterData::None;
            data.push_record(
                Self::ID,
                json!({
                    "options": super::options_value(&self.options),
                    "missing_tiles": missing,
                }),
            );
            Ok(data)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{TileId, ZoomRange, WGS84_EXTENT};
    use crate::pixels::PixelBuffer;
    use crate::raster::{
        DataType, GeoTransform, MemoryBackend, RasterFormat, Window, PROJ4_WGS84,
    };
    use crate::tasks::ReadDataTask;

    #[tokio::test]
    async fn produces_a_tile_map_artifact_and_closes_the_source() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.tiff");
        let handle = backend
            .create(&source, RasterFormat::GTiff, 8, 8, 1, DataType::Float32)
            .await
            .unwrap();
        backend.set_crs(&handle, PROJ4_WGS84).await.unwrap();
        backend
            .set_transform(&handle, GeoTransform::from_extent(&WGS84_EXTENT, 8, 8))
            .await
            .unwrap();
        backend
            .write_pixels(&handle, 1, Window::full(8, 8), &PixelBuffer::new(8, 8))
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

        let options = TileOptions {
            tile_size: 4,
            zooms: ZoomRange::Single(0),
            ..TileOptions::default()
        };
        let task = GenerateTilesTask::new(dir.path(), options);
        let out = Stage::<MemoryBackend>::execute(&task, &backend, data)
            .await
            .unwrap();

        match &out.artifact {
            Artifact::Tiles(tiles) => {
                assert_eq!(tiles.len(), 1);
                assert!(tiles.contains_key(&TileId::new(0, 0, 0)));
            }
            other => panic!("unexpected artifact: {other:?}"),
        }
        assert!(out.data.is_none());
        let record = &out.provenance[1];
        assert_eq!(record.stage, "generate-tiles");
        assert_eq!(record.options["missing_tiles"], json!([]));
    }

    #[tokio::test]
    async fn a_failing_run_still_closes_the_incoming_handle() {
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
        backend.close(handle).await.unwrap();

        let read = ReadDataTask::new();
        let data = Stage::<MemoryBackend>::execute(
            &read,
            &backend,
            TaskData::new(Artifact::Path(source)),
        )
        .await
        .unwrap();
        let opened = match &data.data {
            crate::pipeline::RasterData::Single(h) => *h,
            other => panic!("unexpected data: {other:?}"),
        };

        // an out-of-range zoom fails the run before any tile is cut
        let options = TileOptions {
            zooms: ZoomRange::Single(crate::coord::MAX_ZOOM + 1),
            ..TileOptions::default()
        };
        let task = GenerateTilesTask::new(dir.path(), options);
        let err = Stage::<MemoryBackend>::execute(&task, &backend, data).await;
        assert!(err.is_err());
        assert!(
            backend.raster_size(&opened).await.is_err(),
            "source handle survived a failed run"
        );
    }
}
