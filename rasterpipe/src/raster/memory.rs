//! In-process reference backend.
//!
//! `MemoryBackend` keeps datasets in a process-wide table and persists
//! them as JSON documents on flush, which is enough to exercise every
//! pipeline path (existence checks, cache reuse, tile writes) without a
//! native raster library. PNG/JPEG encoding goes through the `image`
//! crate; `reproject` performs an extent-to-extent resample between
//! longitude/latitude and Web Mercator.
//!
//! It is not a GeoTIFF implementation and does not pretend to be one;
//! production deployments plug a GDAL-backed implementation into
//! [`RasterBackend`] instead.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};

use super::types::{
    BackendError, DataType, EncodeParams, GeoTransform, RasterFormat, Resampling, Window,
};
use super::RasterBackend;
use crate::coord::{lng_lat_to_mercator, mercator_to_lng_lat};
use crate::pixels::PixelBuffer;

/// Handle to a dataset registered with a [`MemoryBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemoryHandle {
    id: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct MemBand {
    data: Vec<f32>,
    metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct MemDataset {
    path: PathBuf,
    format: RasterFormat,
    width: usize,
    height: usize,
    data_type: DataType,
    crs: Option<String>,
    transform: Option<GeoTransform>,
    bands: Vec<MemBand>,
    /// Set on every mutation, cleared by `flush`; an unmodified dataset
    /// never touches its file again.
    #[serde(skip)]
    modified: bool,
}

/// Coordinate systems the memory backend can convert between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CrsKind {
    LngLat,
    Mercator,
    Other,
}

fn crs_kind(proj4: &str) -> CrsKind {
    if proj4.contains("+proj=longlat") {
        CrsKind::LngLat
    } else if proj4.contains("+proj=merc") {
        CrsKind::Mercator
    } else {
        CrsKind::Other
    }
}

fn convert_point(from: CrsKind, to: CrsKind, x: f64, y: f64) -> (f64, f64) {
    match (from, to) {
        (CrsKind::LngLat, CrsKind::Mercator) => lng_lat_to_mercator(x, y),
        (CrsKind::Mercator, CrsKind::LngLat) => mercator_to_lng_lat(x, y),
        _ => (x, y),
    }
}

/// In-memory raster backend; see the module docs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    datasets: Mutex<HashMap<u64, MemDataset>>,
    next_id: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, dataset: MemDataset) -> MemoryHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.datasets
            .lock()
            .expect("dataset table poisoned")
            .insert(id, dataset);
        MemoryHandle { id }
    }

    fn with<R>(
        &self,
        handle: &MemoryHandle,
        f: impl FnOnce(&MemDataset) -> Result<R, BackendError>,
    ) -> Result<R, BackendError> {
        let table = self.datasets.lock().expect("dataset table poisoned");
        let ds = table.get(&handle.id).ok_or(BackendError::InvalidHandle)?;
        f(ds)
    }

    fn with_mut<R>(
        &self,
        handle: &MemoryHandle,
        f: impl FnOnce(&mut MemDataset) -> Result<R, BackendError>,
    ) -> Result<R, BackendError> {
        let mut table = self.datasets.lock().expect("dataset table poisoned");
        let ds = table
            .get_mut(&handle.id)
            .ok_or(BackendError::InvalidHandle)?;
        ds.modified = true;
        f(ds)
    }

    fn serialize_dataset(&self, handle: &MemoryHandle) -> Result<(PathBuf, Vec<u8>), BackendError> {
        self.with(handle, |ds| {
            let bytes = serde_json::to_vec(ds).map_err(|e| BackendError::Encode {
                path: ds.path.clone(),
                message: e.to_string(),
            })?;
            Ok((ds.path.clone(), bytes))
        })
    }

    fn decode_image(path: &Path, bytes: &[u8], format: RasterFormat) -> Result<MemDataset, BackendError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| BackendError::Open {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
            .into_luma8();
        let (width, height) = (img.width() as usize, img.height() as usize);
        let data = img.into_raw().into_iter().map(f32::from).collect();
        Ok(MemDataset {
            path: path.to_path_buf(),
            format,
            width,
            height,
            data_type: DataType::Byte,
            crs: None,
            transform: None,
            bands: vec![MemBand {
                data,
                metadata: BTreeMap::new(),
            }],
            modified: false,
        })
    }

    fn check_window(ds: &MemDataset, band: usize, window: &Window) -> Result<(), BackendError> {
        if band == 0 || band > ds.bands.len() {
            return Err(BackendError::InvalidBand(band));
        }
        if window.x + window.width > ds.width || window.y + window.height > ds.height {
            return Err(BackendError::WindowOutOfBounds {
                x: window.x,
                y: window.y,
                width: window.width,
                height: window.height,
            });
        }
        Ok(())
    }
}

impl RasterBackend for MemoryBackend {
    type Handle = MemoryHandle;

    fn open<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Self::Handle, BackendError>> {
        Box::pin(async move {
            let bytes = tokio::fs::read(path).await.map_err(|e| BackendError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_ascii_lowercase();
            let dataset = match ext.as_str() {
                "png" => Self::decode_image(path, &bytes, RasterFormat::Png)?,
                "jpg" | "jpeg" => Self::decode_image(path, &bytes, RasterFormat::Jpeg)?,
                _ => {
                    let mut ds: MemDataset =
                        serde_json::from_slice(&bytes).map_err(|e| BackendError::Open {
                            path: path.to_path_buf(),
                            message: e.to_string(),
                        })?;
                    ds.path = path.to_path_buf();
                    ds
                }
            };
            Ok(self.register(dataset))
        })
    }

    fn create<'a>(
        &'a self,
        path: &'a Path,
        format: RasterFormat,
        width: usize,
        height: usize,
        bands: usize,
        data_type: DataType,
    ) -> BoxFuture<'a, Result<Self::Handle, BackendError>> {
        Box::pin(async move {
            let dataset = MemDataset {
                path: path.to_path_buf(),
                format,
                width,
                height,
                data_type,
                crs: None,
                transform: None,
                bands: (0..bands)
                    .map(|_| MemBand {
                        data: vec![0.0; width * height],
                        metadata: BTreeMap::new(),
                    })
                    .collect(),
                modified: true,
            };
            Ok(self.register(dataset))
        })
    }

    fn read_pixels<'a>(
        &'a self,
        handle: &'a Self::Handle,
        band: usize,
        window: Window,
    ) -> BoxFuture<'a, Result<PixelBuffer, BackendError>> {
        Box::pin(async move {
            self.with(handle, |ds| {
                Self::check_window(ds, band, &window)?;
                let src = &ds.bands[band - 1].data;
                let mut out = PixelBuffer::new(window.width, window.height);
                for row in 0..window.height {
                    let start = (window.y + row) * ds.width + window.x;
                    let dst_start = row * window.width;
                    out.as_mut_slice()[dst_start..dst_start + window.width]
                        .copy_from_slice(&src[start..start + window.width]);
                }
                Ok(out)
            })
        })
    }

    fn write_pixels<'a>(
        &'a self,
        handle: &'a Self::Handle,
        band: usize,
        window: Window,
        pixels: &'a PixelBuffer,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            self.with_mut(handle, |ds| {
                Self::check_window(ds, band, &window)?;
                let dst = &mut ds.bands[band - 1].data;
                for row in 0..window.height.min(pixels.height()) {
                    let start = (window.y + row) * ds.width + window.x;
                    let width = window.width.min(pixels.width());
                    let src_start = row * pixels.width();
                    dst[start..start + width]
                        .copy_from_slice(&pixels.as_slice()[src_start..src_start + width]);
                }
                Ok(())
            })
        })
    }

    fn reproject<'a>(
        &'a self,
        src: &'a Self::Handle,
        dst: &'a Self::Handle,
        src_crs: Option<&'a str>,
        dst_crs: &'a str,
        resampling: Resampling,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            let source = self.with(src, |ds| Ok(ds.clone()))?;
            let src_transform = source.transform.ok_or(BackendError::MissingTransform)?;
            let src_inverse = src_transform
                .invert()
                .ok_or(BackendError::MissingTransform)?;
            let from = crs_kind(dst_crs);
            let to = crs_kind(
                src_crs
                    .map(str::to_string)
                    .or_else(|| source.crs.clone())
                    .as_deref()
                    .unwrap_or(""),
            );

            self.with_mut(dst, |ds| {
                let dst_transform = ds.transform.ok_or(BackendError::MissingTransform)?;
                let band_count = ds.bands.len().min(source.bands.len());
                let (sw, sh) = (source.width, source.height);

                let sample = |data: &[f32], col: f64, row: f64| -> f32 {
                    match resampling {
                        Resampling::NearestNeighbor => {
                            let c = (col.floor().max(0.0) as usize).min(sw - 1);
                            let r = (row.floor().max(0.0) as usize).min(sh - 1);
                            data[r * sw + c]
                        }
                        Resampling::Bilinear => {
                            let fc = (col - 0.5).max(0.0).min((sw - 1) as f64);
                            let fr = (row - 0.5).max(0.0).min((sh - 1) as f64);
                            let c0 = fc.floor() as usize;
                            let r0 = fr.floor() as usize;
                            let c1 = (c0 + 1).min(sw - 1);
                            let r1 = (r0 + 1).min(sh - 1);
                            let tx = (fc - c0 as f64) as f32;
                            let ty = (fr - r0 as f64) as f32;
                            let top = data[r0 * sw + c0] * (1.0 - tx) + data[r0 * sw + c1] * tx;
                            let bottom = data[r1 * sw + c0] * (1.0 - tx) + data[r1 * sw + c1] * tx;
                            top * (1.0 - ty) + bottom * ty
                        }
                    }
                };

                for b in 0..band_count {
                    let src_data = &source.bands[b].data;
                    let mut out = vec![0.0f32; ds.width * ds.height];
                    for y in 0..ds.height {
                        for x in 0..ds.width {
                            let (gx, gy) = dst_transform.apply(x as f64 + 0.5, y as f64 + 0.5);
                            let (sx, sy) = convert_point(from, to, gx, gy);
                            let (col, row) = src_inverse.apply(sx, sy);
                            out[y * ds.width + x] = sample(src_data, col, row);
                        }
                    }
                    ds.bands[b].data = out;
                }
                Ok(())
            })
        })
    }

    fn set_transform<'a>(
        &'a self,
        handle: &'a Self::Handle,
        transform: GeoTransform,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            self.with_mut(handle, |ds| {
                ds.transform = Some(transform);
                Ok(())
            })
        })
    }

    fn set_crs<'a>(
        &'a self,
        handle: &'a Self::Handle,
        crs: &'a str,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            self.with_mut(handle, |ds| {
                ds.crs = Some(crs.to_string());
                Ok(())
            })
        })
    }

    fn set_band_metadata<'a>(
        &'a self,
        handle: &'a Self::Handle,
        band: usize,
        metadata: &'a BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            self.with_mut(handle, |ds| {
                if band == 0 || band > ds.bands.len() {
                    return Err(BackendError::InvalidBand(band));
                }
                ds.bands[band - 1]
                    .metadata
                    .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(())
            })
        })
    }

    fn band_metadata<'a>(
        &'a self,
        handle: &'a Self::Handle,
        band: usize,
    ) -> BoxFuture<'a, Result<BTreeMap<String, String>, BackendError>> {
        Box::pin(async move {
            self.with(handle, |ds| {
                if band == 0 || band > ds.bands.len() {
                    return Err(BackendError::InvalidBand(band));
                }
                Ok(ds.bands[band - 1].metadata.clone())
            })
        })
    }

    fn encode<'a>(
        &'a self,
        handle: &'a Self::Handle,
        path: &'a Path,
        format: RasterFormat,
        params: EncodeParams,
    ) -> BoxFuture<'a, Result<Self::Handle, BackendError>> {
        Box::pin(async move {
            let source = self.with(handle, |ds| Ok(ds.clone()))?;
            if source.bands.is_empty() {
                return Err(BackendError::InvalidBand(1));
            }

            let mut gray = PixelBuffer::from_vec(
                source.width,
                source.height,
                source.bands[0].data.clone(),
            );
            let (min, max) = gray.min_max();
            if min.is_finite() {
                gray.normalize_gray(min, max);
            }
            let bytes: Vec<u8> = gray
                .as_slice()
                .iter()
                .map(|&v| v.clamp(0.0, 255.0) as u8)
                .collect();

            let mut encoded = Cursor::new(Vec::new());
            let (w, h) = (source.width as u32, source.height as u32);
            let encode_err = |e: image::ImageError| BackendError::Encode {
                path: path.to_path_buf(),
                message: e.to_string(),
            };
            match format {
                RasterFormat::Png => PngEncoder::new(&mut encoded)
                    .write_image(&bytes, w, h, ExtendedColorType::L8)
                    .map_err(encode_err)?,
                RasterFormat::Jpeg => {
                    JpegEncoder::new_with_quality(&mut encoded, params.quality)
                        .write_image(&bytes, w, h, ExtendedColorType::L8)
                        .map_err(encode_err)?
                }
                RasterFormat::GTiff => {
                    return Err(BackendError::UnsupportedFormat(
                        "encode targets an image format, not GTiff".to_string(),
                    ))
                }
            }
            tokio::fs::write(path, encoded.into_inner())
                .await
                .map_err(|e| BackendError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })?;

            Ok(self.register(MemDataset {
                path: path.to_path_buf(),
                format,
                width: source.width,
                height: source.height,
                data_type: DataType::Byte,
                crs: source.crs.clone(),
                transform: source.transform,
                bands: vec![MemBand {
                    data: bytes.into_iter().map(f32::from).collect(),
                    metadata: BTreeMap::new(),
                }],
                modified: false,
            }))
        })
    }

    fn raster_size<'a>(
        &'a self,
        handle: &'a Self::Handle,
    ) -> BoxFuture<'a, Result<(usize, usize), BackendError>> {
        Box::pin(async move { self.with(handle, |ds| Ok((ds.width, ds.height))) })
    }

    fn band_count<'a>(
        &'a self,
        handle: &'a Self::Handle,
    ) -> BoxFuture<'a, Result<usize, BackendError>> {
        Box::pin(async move { self.with(handle, |ds| Ok(ds.bands.len())) })
    }

    fn transform<'a>(
        &'a self,
        handle: &'a Self::Handle,
    ) -> BoxFuture<'a, Result<Option<GeoTransform>, BackendError>> {
        Box::pin(async move { self.with(handle, |ds| Ok(ds.transform)) })
    }

    fn crs<'a>(
        &'a self,
        handle: &'a Self::Handle,
    ) -> BoxFuture<'a, Result<Option<String>, BackendError>> {
        Box::pin(async move { self.with(handle, |ds| Ok(ds.crs.clone())) })
    }

    fn transform_point<'a>(
        &'a self,
        point: (f64, f64),
        src_crs: &'a str,
        dst_crs: &'a str,
    ) -> BoxFuture<'a, Result<(f64, f64), BackendError>> {
        Box::pin(async move {
            Ok(convert_point(
                crs_kind(src_crs),
                crs_kind(dst_crs),
                point.0,
                point.1,
            ))
        })
    }

    fn flush<'a>(&'a self, handle: &'a Self::Handle) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            let (format, modified) = self.with(handle, |ds| Ok((ds.format, ds.modified)))?;
            // Image-format datasets are written by `encode`; only the
            // JSON representation needs an explicit flush. Unmodified
            // datasets are skipped so a no-op rerun leaves files alone.
            if format != RasterFormat::GTiff || !modified {
                return Ok(());
            }
            let (path, bytes) = self.serialize_dataset(handle)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| BackendError::Io {
                        path: parent.to_path_buf(),
                        source: e,
                    })?;
            }
            tokio::fs::write(&path, bytes)
                .await
                .map_err(|e| BackendError::Io { path, source: e })?;
            let mut table = self.datasets.lock().expect("dataset table poisoned");
            if let Some(ds) = table.get_mut(&handle.id) {
                ds.modified = false;
            }
            Ok(())
        })
    }

    fn close<'a>(&'a self, handle: Self::Handle) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            self.flush(&handle).await?;
            self.datasets
                .lock()
                .expect("dataset table poisoned")
                .remove(&handle.id)
                .ok_or(BackendError::InvalidHandle)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Extent;
    use crate::raster::{PROJ4_WEB_MERCATOR, PROJ4_WGS84};
    use tempfile::tempdir;

    async fn gradient_dataset(
        backend: &MemoryBackend,
        path: &Path,
        width: usize,
        height: usize,
    ) -> MemoryHandle {
        let handle = backend
            .create(path, RasterFormat::GTiff, width, height, 1, DataType::Float32)
            .await
            .unwrap();
        let mut buf = PixelBuffer::new(width, height);
        for y in 0..height {
            for x in 0..width {
                buf.set(x, y, (y * width + x) as f32);
            }
        }
        backend
            .write_pixels(&handle, 1, Window::full(width, height), &buf)
            .await
            .unwrap();
        handle
    }

    #[tokio::test]
    async fn test_create_read_write_roundtrip() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::new();
        let handle = gradient_dataset(&backend, &dir.path().join("a.tiff"), 4, 4).await;

        let window = backend
            .read_pixels(&handle, 1, Window::new(1, 2, 2, 2))
            .await
            .unwrap();
        assert_eq!(window.get(0, 0), (2 * 4 + 1) as f32);
        assert_eq!(window.get(1, 1), (3 * 4 + 2) as f32);
    }

    #[tokio::test]
    async fn test_flush_then_open_preserves_dataset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("persist.tiff");
        let backend = MemoryBackend::new();
        let handle = gradient_dataset(&backend, &path, 3, 3).await;
        backend
            .set_crs(&handle, PROJ4_WGS84)
            .await
            .unwrap();
        backend.close(handle).await.unwrap();

        let reopened = backend.open(&path).await.unwrap();
        assert_eq!(backend.raster_size(&reopened).await.unwrap(), (3, 3));
        assert_eq!(
            backend.crs(&reopened).await.unwrap().as_deref(),
            Some(PROJ4_WGS84)
        );
        let pixels = backend
            .read_pixels(&reopened, 1, Window::full(3, 3))
            .await
            .unwrap();
        assert_eq!(pixels.get(2, 2), 8.0);
    }

    #[tokio::test]
    async fn test_flush_of_unmodified_dataset_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clean.tiff");
        let backend = MemoryBackend::new();
        let handle = gradient_dataset(&backend, &path, 3, 3).await;
        backend.close(handle).await.unwrap();

        // Removing the file makes any rewrite observable: a clean
        // dataset flushed (or closed) again must not recreate it.
        let reopened = backend.open(&path).await.unwrap();
        std::fs::remove_file(&path).unwrap();
        backend.flush(&reopened).await.unwrap();
        assert!(!path.exists());
        backend.close(reopened).await.unwrap();
        assert!(!path.exists());

        // A mutation re-arms the flush.
        let handle = gradient_dataset(&backend, &path, 3, 3).await;
        backend.close(handle).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_close_invalidates_handle() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::new();
        let handle = gradient_dataset(&backend, &dir.path().join("x.tiff"), 2, 2).await;
        let copy = handle;
        backend.close(handle).await.unwrap();
        assert!(matches!(
            backend.raster_size(&copy).await,
            Err(BackendError::InvalidHandle)
        ));
    }

    #[tokio::test]
    async fn test_reproject_identity_extent_copies_pixels() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::new();
        let extent = Extent::new(0.0, 0.0, 4.0, 4.0);

        let src = gradient_dataset(&backend, &dir.path().join("s.tiff"), 4, 4).await;
        backend
            .set_transform(&src, GeoTransform::from_extent(&extent, 4, 4))
            .await
            .unwrap();
        backend.set_crs(&src, PROJ4_WEB_MERCATOR).await.unwrap();

        let dst = backend
            .create(
                &dir.path().join("d.tiff"),
                RasterFormat::GTiff,
                4,
                4,
                1,
                DataType::Float32,
            )
            .await
            .unwrap();
        backend
            .set_transform(&dst, GeoTransform::from_extent(&extent, 4, 4))
            .await
            .unwrap();
        backend
            .reproject(
                &src,
                &dst,
                None,
                PROJ4_WEB_MERCATOR,
                Resampling::NearestNeighbor,
            )
            .await
            .unwrap();

        let out = backend
            .read_pixels(&dst, 1, Window::full(4, 4))
            .await
            .unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(out.get(x, y), (y * 4 + x) as f32);
            }
        }
    }

    #[tokio::test]
    async fn test_reproject_requires_transform() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::new();
        let src = gradient_dataset(&backend, &dir.path().join("s.tiff"), 2, 2).await;
        let dst = backend
            .create(
                &dir.path().join("d.tiff"),
                RasterFormat::GTiff,
                2,
                2,
                1,
                DataType::Float32,
            )
            .await
            .unwrap();
        let err = backend
            .reproject(&src, &dst, None, PROJ4_WEB_MERCATOR, Resampling::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::MissingTransform));
    }

    #[tokio::test]
    async fn test_encode_png_writes_decodable_file() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::new();
        let handle = gradient_dataset(&backend, &dir.path().join("g.tiff"), 8, 8).await;

        let png_path = dir.path().join("g.png");
        let encoded = backend
            .encode(&handle, &png_path, RasterFormat::Png, EncodeParams::default())
            .await
            .unwrap();
        assert!(png_path.exists());
        backend.close(encoded).await.unwrap();

        let reopened = backend.open(&png_path).await.unwrap();
        assert_eq!(backend.raster_size(&reopened).await.unwrap(), (8, 8));
    }

    #[tokio::test]
    async fn test_window_out_of_bounds_rejected() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::new();
        let handle = gradient_dataset(&backend, &dir.path().join("w.tiff"), 4, 4).await;
        let err = backend
            .read_pixels(&handle, 1, Window::new(2, 2, 4, 4))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::WindowOutOfBounds { .. }));
    }

    #[tokio::test]
    async fn test_band_metadata_merges() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::new();
        let handle = gradient_dataset(&backend, &dir.path().join("m.tiff"), 2, 2).await;

        let mut meta = BTreeMap::new();
        meta.insert("min".to_string(), "0".to_string());
        backend.set_band_metadata(&handle, 1, &meta).await.unwrap();
        let mut more = BTreeMap::new();
        more.insert("max".to_string(), "3".to_string());
        backend.set_band_metadata(&handle, 1, &more).await.unwrap();

        let got = backend.band_metadata(&handle, 1).await.unwrap();
        assert_eq!(got.get("min").map(String::as_str), Some("0"));
        assert_eq!(got.get("max").map(String::as_str), Some("3"));
    }
}
