//! Web-mercator tile pyramid generation.
//!
//! For every requested zoom level the source raster is reprojected once
//! onto the full mercator grid at `tile_size * 2^z` pixels, cached on
//! disk, read back in full, wrapped at its borders, and sliced into
//! overlapping `tile_size + 1` pixel tiles. Tiles that already exist on
//! disk are kept, and a single failing tile never aborts the zoom level;
//! the run report says which tiles are still missing at the end.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::coord::{
    self, CoordError, Extent, TileCoord, TileId, ZoomRange, MERCATOR_LNG_LAT_EXTENT,
};
use crate::ops::{self, ReprojectOptions, SourceRef};
use crate::pixels::{self, EnlargeOptions, PixelBuffer};
use crate::raster::{
    BackendError, DataType, GeoTransform, RasterBackend, RasterFormat, Resampling, Window,
    PROJ4_WEB_MERCATOR, PROJ4_WGS84,
};

/// Errors that abort a tile run as a whole.
///
/// Failures scoped to a single tile are not errors; they surface as
/// entries in [`TileRun::missing`].
#[derive(Debug, Error)]
pub enum TileError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Coord(#[from] CoordError),
}

/// Parameters for [`generate_tiles`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileOptions {
    /// Delete existing tiles and zoom caches instead of reusing them.
    pub clear: bool,
    /// Edge length of a tile before the one-pixel overlap.
    pub tile_size: usize,
    /// Zoom levels to generate.
    pub zooms: ZoomRange,
    /// Band count of the tile datasets.
    pub band_count: usize,
    pub data_type: DataType,
    pub format: RasterFormat,
    /// Skip tiles whose footprint does not overlap `tile_extent`.
    pub clip_extent: bool,
    /// Rescale each tile to the 0..=255 gray range.
    pub gray: bool,
    /// Subfolder for the finished tiles.
    pub tile_folder: String,
    /// Subfolder for the per-zoom reprojected caches.
    pub cache_folder: String,
    /// Filename prefix of the per-zoom caches.
    pub cache_prefix: String,
    /// Border wrap applied to the zoom raster before slicing.
    pub enlarge: EnlargeOptions,
    /// Geographic extent the tile grid is enumerated over.
    pub tile_extent: Extent,
    /// CRS of the tile grid.
    pub tile_crs: String,
    /// Fallback CRS for sources that carry none.
    pub source_crs: String,
    pub resampling: Resampling,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            clear: true,
            tile_size: 256,
            zooms: ZoomRange::Range {
                start: 0,
                end: 5,
                step: 1,
            },
            band_count: 1,
            data_type: DataType::default(),
            format: RasterFormat::default(),
            clip_extent: false,
            gray: false,
            tile_folder: "tiles".to_string(),
            cache_folder: "cache".to_string(),
            cache_prefix: "mercator".to_string(),
            enlarge: EnlargeOptions::default(),
            tile_extent: MERCATOR_LNG_LAT_EXTENT,
            tile_crs: PROJ4_WEB_MERCATOR.to_string(),
            source_crs: PROJ4_WGS84.to_string(),
            resampling: Resampling::default(),
        }
    }
}

impl TileOptions {
    fn reproject_options(&self, size: usize) -> ReprojectOptions {
        ReprojectOptions {
            clear: false, // the cache skip/clear decision is made before
            width: size,
            height: size,
            band_count: self.band_count,
            data_type: self.data_type,
            format: self.format,
            resampling: self.resampling,
            source_crs: self.source_crs.clone(),
            dest_crs: self.tile_crs.clone(),
            ..ReprojectOptions::default()
        }
    }

    fn cache_path(&self, folder: &Path, zoom: u8) -> PathBuf {
        folder.join(&self.cache_folder).join(format!(
            "{}-{}.{}",
            self.cache_prefix,
            zoom,
            self.format.extension()
        ))
    }

    fn tile_path(&self, folder: &Path, tile: TileCoord) -> PathBuf {
        folder
            .join(&self.tile_folder)
            .join(tile.z.to_string())
            .join(tile.x.to_string())
            .join(format!("{}.{}", tile.y, self.format.extension()))
    }
}

/// Outcome of a tile run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TileRun {
    /// Every tile present on disk after the run, keyed by tile id.
    pub tiles: BTreeMap<TileId, PathBuf>,
    /// Tiles the grid needed but the run could not produce.
    pub missing: BTreeMap<TileId, PathBuf>,
}

impl TileRun {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// The produced tile paths in id order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.tiles.values().cloned().collect()
    }
}

/// Generates the tile pyramid for `source` under `folder`.
///
/// The returned [`TileRun`] holds the needed-versus-produced diff; the
/// caller decides whether an incomplete run is acceptable.
pub async fn generate_tiles<B: RasterBackend>(
    backend: &B,
    source: SourceRef<'_, B::Handle>,
    folder: &Path,
    options: &TileOptions,
) -> Result<TileRun, TileError> {
    let zooms = options.zooms.levels()?;
    let src = ops::resolve(backend, source).await?;

    let mut run = TileRun::default();
    for &zoom in &zooms {
        let result = generate_zoom(backend, src.handle(), folder, options, zoom, &mut run).await;
        if let Err(err) = result {
            src.release(backend).await?;
            return Err(err);
        }
    }
    src.release(backend).await?;

    info!(
        zooms = zooms.len(),
        tiles = run.tiles.len(),
        missing = run.missing.len(),
        "tile run finished"
    );
    Ok(run)
}

async fn generate_zoom<B: RasterBackend>(
    backend: &B,
    src: &B::Handle,
    folder: &Path,
    options: &TileOptions,
    zoom: u8,
    run: &mut TileRun,
) -> Result<(), TileError> {
    let size = options
        .tile_size
        .checked_shl(u32::from(zoom))
        .ok_or(CoordError::InvalidZoom(zoom))?;

    // one reprojected raster per zoom, cached across runs
    let cache_path = options.cache_path(folder, zoom);
    let zoom_handle = if ops::reusable(&cache_path, options.clear).await? {
        debug!(zoom, path = %cache_path.display(), "reusing zoom cache");
        backend.open(&cache_path).await?
    } else {
        let handle =
            ops::reproject(backend, src, &cache_path, &options.reproject_options(size)).await?;
        // the fresh raster must be durable before any tile is cut from it
        backend.flush(&handle).await?;
        handle
    };

    let (width, height) = backend.raster_size(&zoom_handle).await?;
    let pixels = backend
        .read_pixels(&zoom_handle, options.enlarge.band, Window::full(width, height))
        .await?;
    backend.close(zoom_handle).await?;
    let enlarged = pixels::enlarge(&pixels, &options.enlarge);

    let grid = coord::tiles(&options.tile_extent, &[zoom], options.clip_extent)?;
    debug!(zoom, tiles = grid.len(), size, "slicing zoom level");

    for tile in grid {
        let id = TileId::new(tile.z, tile.x, tile.y);
        let path = options.tile_path(folder, tile);
        if ops::reusable(&path, options.clear).await? {
            run.tiles.insert(id, path);
            continue;
        }
        match write_tile(backend, &enlarged, tile, &path, options).await {
            Ok(()) => {
                run.tiles.insert(id, path);
            }
            Err(err) => {
                warn!(tile = %id, error = %err, "tile failed, continuing");
                run.missing.insert(id, path);
            }
        }
    }
    Ok(())
}

/// Cuts one overlapping tile window out of the enlarged zoom raster and
/// writes it as a georeferenced dataset.
async fn write_tile<B: RasterBackend>(
    backend: &B,
    enlarged: &PixelBuffer,
    tile: TileCoord,
    path: &Path,
    options: &TileOptions,
) -> Result<(), TileError> {
    let ts = options.tile_size;
    let x0 = tile.x as usize * ts;
    let y0 = tile.y as usize * ts;
    let mut pixels = enlarged.window(x0, x0 + ts + 1, y0, y0 + ts + 1);

    ops::ensure_parent(path).await?;
    let dst = backend
        .create(
            path,
            options.format,
            pixels.width(),
            pixels.height(),
            options.band_count,
            options.data_type,
        )
        .await?;

    // the tile's georeference is derived from the grid, never copied
    // from the source raster
    let bounds = coord::tile_bounds(tile);
    let transform = GeoTransform::translation(bounds.west, bounds.north).multiply(
        &GeoTransform::scale(
            bounds.width() / pixels.width() as f64,
            -bounds.height() / pixels.height() as f64,
        ),
    );
    backend.set_transform(&dst, transform).await?;
    backend.set_crs(&dst, &options.tile_crs).await?;

    let (min, max) = pixels.min_max();
    if options.gray && min.is_finite() {
        pixels.normalize_gray(min, max);
    }
    let mut metadata = backend.band_metadata(&dst, 1).await?;
    metadata.insert("min".to_string(), min.to_string());
    metadata.insert("max".to_string(), max.to_string());
    backend.set_band_metadata(&dst, 1, &metadata).await?;
    backend
        .write_pixels(&dst, 1, Window::full(pixels.width(), pixels.height()), &pixels)
        .await?;

    backend.flush(&dst).await?;
    backend.close(dst).await?;
    Ok(())
}
