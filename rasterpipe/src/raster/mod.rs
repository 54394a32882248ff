//! Raster backend abstraction
//!
//! The pipeline never decodes or encodes pixels itself; everything that
//! touches a concrete raster format goes through the [`RasterBackend`]
//! capability trait. A GDAL-style library slots in behind it; the crate
//! ships [`MemoryBackend`] as an in-process reference implementation used
//! by the test suite and the CLI demo.
//!
//! The trait returns `Pin<Box<dyn Future>>` from every method so it stays
//! dyn-compatible and its futures are unconditionally `Send`.

mod memory;
mod types;

pub use memory::{MemoryBackend, MemoryHandle};
pub use types::{
    BackendError, DataType, EncodeParams, GeoTransform, RasterFormat, Resampling, Window,
    PROJ4_WEB_MERCATOR, PROJ4_WGS84,
};

use std::collections::BTreeMap;
use std::path::Path;

use futures::future::BoxFuture;

use crate::coord::Extent;
use crate::pixels::PixelBuffer;

/// Capability set consumed from an external raster library.
///
/// Handles are exclusively owned: the stage currently processing a
/// dataset holds its handle, and the artifact behind it is only durable
/// after [`flush`](RasterBackend::flush). [`close`](RasterBackend::close)
/// takes the handle by value, making a missed release visible at the type
/// level.
pub trait RasterBackend: Send + Sync + 'static {
    /// Opaque, exclusively-owned handle to a decoded dataset.
    type Handle: Send + Sync + 'static;

    /// Opens an existing dataset.
    fn open<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Self::Handle, BackendError>>;

    /// Creates a new dataset of the given shape.
    fn create<'a>(
        &'a self,
        path: &'a Path,
        format: RasterFormat,
        width: usize,
        height: usize,
        bands: usize,
        data_type: DataType,
    ) -> BoxFuture<'a, Result<Self::Handle, BackendError>>;

    /// Reads a pixel window from a 1-based band.
    fn read_pixels<'a>(
        &'a self,
        handle: &'a Self::Handle,
        band: usize,
        window: Window,
    ) -> BoxFuture<'a, Result<PixelBuffer, BackendError>>;

    /// Writes a pixel window to a 1-based band.
    fn write_pixels<'a>(
        &'a self,
        handle: &'a Self::Handle,
        band: usize,
        window: Window,
        pixels: &'a PixelBuffer,
    ) -> BoxFuture<'a, Result<(), BackendError>>;

    /// Warps `src` into `dst` between two coordinate systems. The
    /// destination's size, CRS and geotransform must already be set.
    fn reproject<'a>(
        &'a self,
        src: &'a Self::Handle,
        dst: &'a Self::Handle,
        src_crs: Option<&'a str>,
        dst_crs: &'a str,
        resampling: Resampling,
    ) -> BoxFuture<'a, Result<(), BackendError>>;

    /// Assigns the pixel-to-geographic transform.
    fn set_transform<'a>(
        &'a self,
        handle: &'a Self::Handle,
        transform: GeoTransform,
    ) -> BoxFuture<'a, Result<(), BackendError>>;

    /// Assigns the spatial reference system (proj4 string).
    fn set_crs<'a>(
        &'a self,
        handle: &'a Self::Handle,
        crs: &'a str,
    ) -> BoxFuture<'a, Result<(), BackendError>>;

    /// Merges key/value metadata into a band.
    fn set_band_metadata<'a>(
        &'a self,
        handle: &'a Self::Handle,
        band: usize,
        metadata: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<(), BackendError>>;

    /// Reads a band's metadata.
    fn band_metadata<'a>(
        &'a self,
        handle: &'a Self::Handle,
        band: usize,
    ) -> BoxFuture<'a, Result<BTreeMap<String, String>, BackendError>>;

    /// Encodes a dataset into a target image format at `path`, returning
    /// a handle to the encoded copy.
    fn encode<'a>(
        &'a self,
        handle: &'a Self::Handle,
        path: &'a Path,
        format: RasterFormat,
        params: EncodeParams,
    ) -> BoxFuture<'a, Result<Self::Handle, BackendError>>;

    /// Raster size as `(width, height)`.
    fn raster_size<'a>(
        &'a self,
        handle: &'a Self::Handle,
    ) -> BoxFuture<'a, Result<(usize, usize), BackendError>>;

    /// Number of bands.
    fn band_count<'a>(
        &'a self,
        handle: &'a Self::Handle,
    ) -> BoxFuture<'a, Result<usize, BackendError>>;

    /// The dataset's geotransform, if assigned.
    fn transform<'a>(
        &'a self,
        handle: &'a Self::Handle,
    ) -> BoxFuture<'a, Result<Option<GeoTransform>, BackendError>>;

    /// The dataset's CRS, if assigned.
    fn crs<'a>(
        &'a self,
        handle: &'a Self::Handle,
    ) -> BoxFuture<'a, Result<Option<String>, BackendError>>;

    /// Transforms a single point between two coordinate systems.
    fn transform_point<'a>(
        &'a self,
        point: (f64, f64),
        src_crs: &'a str,
        dst_crs: &'a str,
    ) -> BoxFuture<'a, Result<(f64, f64), BackendError>>;

    /// Flushes pending writes to durable storage.
    fn flush<'a>(&'a self, handle: &'a Self::Handle) -> BoxFuture<'a, Result<(), BackendError>>;

    /// Flushes and releases a handle.
    fn close<'a>(&'a self, handle: Self::Handle) -> BoxFuture<'a, Result<(), BackendError>>;
}

/// Transforms an axis-aligned extent between two coordinate systems via
/// its bottom-left and top-right corners.
///
/// Extents crossing an antimeridian-style discontinuity are the caller's
/// responsibility; the two-corner transform does not detect them.
pub async fn transform_extent<B: RasterBackend>(
    backend: &B,
    extent: &Extent,
    src_crs: &str,
    dst_crs: &str,
) -> Result<Extent, BackendError> {
    let (west, south) = backend
        .transform_point((extent.west, extent.south), src_crs, dst_crs)
        .await?;
    let (east, north) = backend
        .transform_point((extent.east, extent.north), src_crs, dst_crs)
        .await?;
    Ok(Extent::new(west, south, east, north))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{MERCATOR_LNG_LAT_EXTENT, ORIGIN_SHIFT};

    #[tokio::test]
    async fn test_transform_extent_lnglat_to_mercator() {
        let backend = MemoryBackend::new();
        let out = transform_extent(
            &backend,
            &MERCATOR_LNG_LAT_EXTENT,
            PROJ4_WGS84,
            PROJ4_WEB_MERCATOR,
        )
        .await
        .unwrap();
        assert!((out.west + ORIGIN_SHIFT).abs() < 1e-3);
        assert!((out.east - ORIGIN_SHIFT).abs() < 1e-3);
        assert!((out.north - ORIGIN_SHIFT).abs() < 1e-3);
        assert!((out.south + ORIGIN_SHIFT).abs() < 1e-3);
    }

    #[test]
    fn test_backend_trait_is_object_safe() {
        fn assert_dyn<B: RasterBackend>() {
            let _ = std::mem::size_of::<Box<dyn RasterBackend<Handle = B::Handle>>>();
        }
        assert_dyn::<MemoryBackend>();
    }
}
