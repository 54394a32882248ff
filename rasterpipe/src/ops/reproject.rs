//! Reprojection of a raster into a new CRS and target grid.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coord::{Extent, MERCATOR_EXTENT};
use crate::raster::{
    transform_extent, BackendError, DataType, GeoTransform, RasterBackend, RasterFormat,
    Resampling, PROJ4_WEB_MERCATOR, PROJ4_WGS84,
};

use super::{ensure_parent, reusable};

/// Parameters for [`reproject`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprojectOptions {
    /// Delete an existing destination instead of reopening it.
    pub clear: bool,
    /// Destination width in pixels.
    pub width: usize,
    /// Destination height in pixels.
    pub height: usize,
    /// Band count of the destination when the source has none.
    pub band_count: usize,
    pub data_type: DataType,
    pub format: RasterFormat,
    pub resampling: Resampling,
    /// Fallback source CRS when the source dataset carries none.
    pub source_crs: String,
    /// Destination CRS.
    pub dest_crs: String,
    /// Destination extent in destination CRS units. When `None`, the
    /// source's own extent is transformed into the destination CRS.
    pub dest_extent: Option<Extent>,
}

impl Default for ReprojectOptions {
    fn default() -> Self {
        Self {
            clear: true,
            width: 256,
            height: 256,
            band_count: 1,
            data_type: DataType::default(),
            format: RasterFormat::default(),
            resampling: Resampling::default(),
            source_crs: PROJ4_WGS84.to_string(),
            dest_crs: PROJ4_WEB_MERCATOR.to_string(),
            dest_extent: Some(MERCATOR_EXTENT),
        }
    }
}

/// Warps `src` into a new dataset at `dst_path` and returns an open
/// handle to it.
///
/// If the destination file already exists and `clear` is off, the file
/// is reopened instead of regenerated.
pub async fn reproject<B: RasterBackend>(
    backend: &B,
    src: &B::Handle,
    dst_path: &Path,
    options: &ReprojectOptions,
) -> Result<B::Handle, BackendError> {
    if reusable(dst_path, options.clear).await? {
        debug!(path = %dst_path.display(), "reusing reprojected raster");
        return backend.open(dst_path).await;
    }
    ensure_parent(dst_path).await?;

    let bands = match backend.band_count(src).await? {
        0 => options.band_count,
        n => n,
    };
    let dst = backend
        .create(
            dst_path,
            options.format,
            options.width,
            options.height,
            bands,
            options.data_type,
        )
        .await?;

    let source_crs = backend.crs(src).await?;
    let source_crs = source_crs.as_deref().unwrap_or(&options.source_crs);

    let extent = match &options.dest_extent {
        Some(extent) => *extent,
        None => {
            let transform = backend
                .transform(src)
                .await?
                .ok_or(BackendError::MissingTransform)?;
            let (width, height) = backend.raster_size(src).await?;
            let source_extent = transform.extent(width, height);
            transform_extent(backend, &source_extent, source_crs, &options.dest_crs).await?
        }
    };

    backend.set_crs(&dst, &options.dest_crs).await?;
    backend
        .set_transform(&dst, GeoTransform::from_extent(&extent, options.width, options.height))
        .await?;
    backend
        .reproject(src, &dst, Some(source_crs), &options.dest_crs, options.resampling)
        .await?;

    debug!(
        path = %dst_path.display(),
        width = options.width,
        height = options.height,
        crs = %options.dest_crs,
        "reprojected raster"
    );
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::WGS84_EXTENT;
    use crate::pixels::PixelBuffer;
    use crate::raster::{MemoryBackend, Window};

    async fn wgs84_source(backend: &MemoryBackend, path: &Path) -> crate::raster::MemoryHandle {
        let handle = backend
            .create(path, RasterFormat::GTiff, 4, 4, 1, DataType::Float32)
            .await
            .unwrap();
        backend.set_crs(&handle, PROJ4_WGS84).await.unwrap();
        backend
            .set_transform(&handle, GeoTransform::from_extent(&WGS84_EXTENT, 4, 4))
            .await
            .unwrap();
        let mut pixels = PixelBuffer::new(4, 4);
        for i in 0..16 {
            pixels.as_mut_slice()[i] = i as f32;
        }
        backend
            .write_pixels(&handle, 1, Window::full(4, 4), &pixels)
            .await
            .unwrap();
        handle
    }

    #[tokio::test]
    async fn reproject_creates_mercator_grid() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let src = wgs84_source(&backend, &dir.path().join("src.tiff")).await;

        let dst_path = dir.path().join("merc.tiff");
        let options = ReprojectOptions {
            width: 8,
            height: 8,
            ..ReprojectOptions::default()
        };
        let dst = reproject(&backend, &src, &dst_path, &options).await.unwrap();

        assert_eq!(backend.raster_size(&dst).await.unwrap(), (8, 8));
        assert_eq!(
            backend.crs(&dst).await.unwrap().as_deref(),
            Some(PROJ4_WEB_MERCATOR)
        );
        let transform = backend.transform(&dst).await.unwrap().unwrap();
        let extent = transform.extent(8, 8);
        assert!((extent.west - MERCATOR_EXTENT.west).abs() < 1e-6);
        assert!((extent.north - MERCATOR_EXTENT.north).abs() < 1e-6);

        backend.close(dst).await.unwrap();
        backend.close(src).await.unwrap();
    }

    #[tokio::test]
    async fn reproject_reuses_existing_destination() {
        let backend = MemoryBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let src = wgs84_source(&backend, &dir.path().join("src.tiff")).await;

        let dst_path = dir.path().join("merc.tiff");
        let options = ReprojectOptions {
            clear: false,
            width: 4,
            height: 4,
            ..ReprojectOptions::default()
        };
        let first = reproject(&backend, &src, &dst_path, &options).await.unwrap();
        backend.close(first).await.unwrap();
        assert!(dst_path.exists());
        let written = tokio::fs::read(&dst_path).await.unwrap();

        // second run must not rewrite the file
        let second = reproject(&backend, &src, &dst_path, &options).await.unwrap();
        backend.close(second).await.unwrap();
        assert_eq!(tokio::fs::read(&dst_path).await.unwrap(), written);

        backend.close(src).await.unwrap();
    }
}
