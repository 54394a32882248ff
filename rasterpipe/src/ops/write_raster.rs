//! Copies a raster into a new file, optionally normalizing bands to
//! 8-bit gray and recording per-band min/max metadata.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coord::Extent;
use crate::raster::{
    BackendError, DataType, GeoTransform, RasterBackend, RasterFormat, Window,
};

use super::{ensure_parent, reusable};

/// Parameters for [`write_raster`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Delete an existing destination instead of reopening it.
    pub clear: bool,
    /// Destination width; defaults to the source width.
    pub width: Option<usize>,
    /// Destination height; defaults to the source height.
    pub height: Option<usize>,
    /// Band count when the source reports none.
    pub band_count: usize,
    pub data_type: DataType,
    pub format: RasterFormat,
    /// Rescale each band to the 0..=255 gray range.
    pub gray: bool,
    /// Overrides the CRS copied from the source.
    pub custom_crs: Option<String>,
    /// Overrides the geotransform copied from the source.
    pub custom_extent: Option<Extent>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            clear: true,
            width: None,
            height: None,
            band_count: 1,
            data_type: DataType::default(),
            format: RasterFormat::default(),
            gray: false,
            custom_crs: None,
            custom_extent: None,
        }
    }
}

/// Writes `src` to a new dataset at `dst_path` band by band and returns
/// an open handle to the destination.
pub async fn write_raster<B: RasterBackend>(
    backend: &B,
    src: &B::Handle,
    dst_path: &Path,
    options: &WriteOptions,
) -> Result<B::Handle, BackendError> {
    if reusable(dst_path, options.clear).await? {
        debug!(path = %dst_path.display(), "reusing written raster");
        return backend.open(dst_path).await;
    }
    ensure_parent(dst_path).await?;

    let (src_width, src_height) = backend.raster_size(src).await?;
    let width = options.width.unwrap_or(src_width);
    let height = options.height.unwrap_or(src_height);
    let bands = match backend.band_count(src).await? {
        0 => options.band_count,
        n => n,
    };

    let dst = backend
        .create(dst_path, options.format, width, height, bands, options.data_type)
        .await?;

    let crs = match &options.custom_crs {
        Some(crs) => Some(crs.clone()),
        None => backend.crs(src).await?,
    };
    if let Some(crs) = &crs {
        backend.set_crs(&dst, crs).await?;
    }
    let transform = match &options.custom_extent {
        Some(extent) => Some(GeoTransform::from_extent(extent, width, height)),
        None => backend.transform(src).await?,
    };
    if let Some(transform) = transform {
        backend.set_transform(&dst, transform).await?;
    }

    for band in 1..=bands {
        let mut pixels = backend
            .read_pixels(src, band, Window::full(src_width, src_height))
            .await?;
        let (min, max) = pixels.min_max();
        if options.gray && min.is_finite() {
            pixels.normalize_gray(min, max);
        }
        let mut metadata = backend.band_metadata(src, band).await?;
        metadata.insert("min".to_string(), min.to_string());
        metadata.insert("max".to_string(), max.to_string());
        backend.set_band_metadata(&dst, band, &metadata).await?;
        backend
            .write_pixels(&dst, band, Window::full(width, height), &pixels)
            .await?;
    }

    backend.flush(&dst).await?;
    debug!(path = %dst_path.display(), bands, "wrote raster");
    Ok(dst)
}
