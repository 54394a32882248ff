//! End-to-end pipeline runs against the in-memory backend.

use std::path::Path;
use std::sync::Arc;

use rasterpipe::coord::{TileId, ZoomRange, WGS84_EXTENT};
use rasterpipe::ops::EncodeOptions;
use rasterpipe::pipeline::{Artifact, Pipeline};
use rasterpipe::pixels::PixelBuffer;
use rasterpipe::raster::{
    DataType, GeoTransform, MemoryBackend, RasterBackend, RasterFormat, Window, PROJ4_WGS84,
};
use rasterpipe::tasks::{EncodeImageTask, GenerateTilesTask, ReadDataTask};
use rasterpipe::tiler::TileOptions;

async fn world_raster(backend: &MemoryBackend, path: &Path) {
    let handle = backend
        .create(path, RasterFormat::GTiff, 8, 8, 1, DataType::Float32)
        .await
        .unwrap();
    backend.set_crs(&handle, PROJ4_WGS84).await.unwrap();
    backend
        .set_transform(&handle, GeoTransform::from_extent(&WGS84_EXTENT, 8, 8))
        .await
        .unwrap();
    let mut pixels = PixelBuffer::new(8, 8);
    for (i, v) in pixels.as_mut_slice().iter_mut().enumerate() {
        *v = i as f32;
    }
    backend
        .write_pixels(&handle, 1, Window::full(8, 8), &pixels)
        .await
        .unwrap();
    backend.close(handle).await.unwrap();
}

fn tile_options(clear: bool) -> TileOptions {
    TileOptions {
        clear,
        tile_size: 4,
        zooms: ZoomRange::Range {
            start: 0,
            end: 2,
            step: 1,
        },
        ..TileOptions::default()
    }
}

#[tokio::test]
async fn read_then_tile_then_encode() {
    let backend = Arc::new(MemoryBackend::new());
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("world.tiff");
    world_raster(&backend, &source).await;

    let mut pipeline = Pipeline::new(backend.clone());
    pipeline.register(ReadDataTask::new());
    pipeline.register(GenerateTilesTask::new(dir.path(), tile_options(true)));
    pipeline.register(EncodeImageTask::new(dir.path(), EncodeOptions::default()));

    let result = pipeline.run(Artifact::Path(source)).await.unwrap();

    // zoom 0 is one tile, zoom 1 is four
    let images = match &result.artifact {
        Artifact::Tiles(images) => images,
        other => panic!("unexpected artifact: {other:?}"),
    };
    assert_eq!(images.len(), 5);
    for (id, path) in images {
        assert!(path.exists(), "missing image for {id}: {}", path.display());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
    }
    assert!(images.contains_key(&TileId::new(1, 1, 0)));

    // one provenance record per stage, in order
    let stages: Vec<_> = result.provenance.iter().map(|r| r.stage.as_str()).collect();
    assert_eq!(stages, ["read-data", "generate-tiles", "encode-image"]);
    assert!(result.data.is_none());
}

#[tokio::test]
async fn rerun_without_clear_reuses_finished_tiles() {
    let backend = Arc::new(MemoryBackend::new());
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("world.tiff");
    world_raster(&backend, &source).await;

    let run = |clear| {
        let backend = backend.clone();
        let dir = dir.path().to_path_buf();
        let source = source.clone();
        async move {
            let mut pipeline = Pipeline::new(backend);
            pipeline.register(ReadDataTask::new());
            pipeline.register(GenerateTilesTask::new(&dir, tile_options(clear)));
            pipeline.run(Artifact::Path(source)).await.unwrap()
        }
    };

    run(false).await;
    // tamper with a finished tile and its zoom cache; the second run
    // must keep both as-is
    let tile = dir.path().join("tiles/0/0/0.tiff");
    let cache = dir.path().join("cache/mercator-1.tiff");
    tokio::fs::write(&tile, b"tile-sentinel").await.unwrap();
    let cache_bytes = tokio::fs::read(&cache).await.unwrap();
    let cache_mtime = tokio::fs::metadata(&cache).await.unwrap().modified().unwrap();

    // a rerun over finished work must not rewrite the reused cache,
    // not even with identical bytes
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    run(false).await;
    assert_eq!(tokio::fs::read(&tile).await.unwrap(), b"tile-sentinel");
    assert_eq!(tokio::fs::read(&cache).await.unwrap(), cache_bytes);
    assert_eq!(
        tokio::fs::metadata(&cache).await.unwrap().modified().unwrap(),
        cache_mtime,
        "zoom cache was rewritten by a rerun over finished work"
    );

    // a clearing run regenerates the tampered tile
    run(true).await;
    assert_ne!(tokio::fs::read(&tile).await.unwrap(), b"tile-sentinel");
}
