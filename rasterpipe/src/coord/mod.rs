//! Coordinate and tile-grid utilities
//!
//! Conversions between longitude/latitude, Web Mercator meters, and XYZ
//! tile coordinates, plus the tile grid enumeration that drives the
//! pyramid generator.

mod types;

pub use types::{
    CoordError, Extent, TileCoord, TileId, ZoomRange, EARTH_RADIUS, MAX_MERCATOR_LAT, MAX_ZOOM,
    MERCATOR_EXTENT, MERCATOR_LNG_LAT_EXTENT, ORIGIN_SHIFT, WGS84_EXTENT,
};

use std::f64::consts::PI;

/// Constrains `n` to `[min, max]`.
#[inline]
pub fn clamp(n: f64, min: f64, max: f64) -> f64 {
    n.max(min).min(max)
}

/// Projects a longitude/latitude point onto the Web Mercator plane.
///
/// Latitude is clamped to the Mercator bound before projecting, so poles
/// map to the edge of the plane instead of infinity.
#[inline]
pub fn lng_lat_to_mercator(lng: f64, lat: f64) -> (f64, f64) {
    let lat = clamp(lat, -MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let x = lng * ORIGIN_SHIFT / 180.0;
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() * EARTH_RADIUS;
    (x, y)
}

/// Inverse of [`lng_lat_to_mercator`].
#[inline]
pub fn mercator_to_lng_lat(x: f64, y: f64) -> (f64, f64) {
    let lng = x / ORIGIN_SHIFT * 180.0;
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0) * 180.0 / PI;
    (lng, lat)
}

/// Converts a longitude/latitude point to the tile containing it.
///
/// # Errors
///
/// Returns `CoordError` when the point lies outside the Web Mercator
/// bounds or the zoom exceeds [`MAX_ZOOM`].
pub fn lng_lat_to_tile(lng: f64, lat: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(-MAX_MERCATOR_LAT..=MAX_MERCATOR_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(CoordError::InvalidLongitude(lng));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = 2.0_f64.powi(zoom as i32);
    let max_index = (1u32 << zoom) - 1;

    let x = ((lng + 180.0) / 360.0 * n) as u32;
    let lat_rad = lat * PI / 180.0;
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as u32;

    Ok(TileCoord::new(zoom, x.min(max_index), y.min(max_index)))
}

/// Bounding box of a tile on the Web Mercator plane, in meters.
///
/// This is the box the tile's geotransform is derived from; it depends
/// only on the power-of-two grid, never on any source raster.
pub fn tile_bounds(tile: TileCoord) -> Extent {
    let n = 2.0_f64.powi(tile.z as i32);
    let size = 2.0 * ORIGIN_SHIFT / n;
    let west = -ORIGIN_SHIFT + tile.x as f64 * size;
    let north = ORIGIN_SHIFT - tile.y as f64 * size;
    Extent::new(west, north - size, west + size, north)
}

/// Bounding box of a tile in longitude/latitude degrees.
pub fn tile_lng_lat_bounds(tile: TileCoord) -> Extent {
    let n = 2.0_f64.powi(tile.z as i32);
    let west = tile.x as f64 / n * 360.0 - 180.0;
    let east = (tile.x + 1) as f64 / n * 360.0 - 180.0;
    let lat_of = |y: f64| (PI * (1.0 - 2.0 * y / n)).sinh().atan() * 180.0 / PI;
    let north = lat_of(tile.y as f64);
    let south = lat_of((tile.y + 1) as f64);
    Extent::new(west, south, east, north)
}

/// Enumerates the tiles whose bounding boxes intersect `extent`.
///
/// `extent` is in longitude/latitude degrees and is clamped to the
/// Mercator bound first. With `clip` set, tiles whose intersection with
/// the extent has zero area (edge touches) are excluded.
pub fn tiles(extent: &Extent, zooms: &[u8], clip: bool) -> Result<Vec<TileCoord>, CoordError> {
    let west = clamp(extent.west, -180.0, 180.0);
    let east = clamp(extent.east, -180.0, 180.0);
    let south = clamp(extent.south, -MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let north = clamp(extent.north, -MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let clamped = Extent::new(west, south, east, north);

    let mut out = Vec::new();
    for &z in zooms {
        let nw = lng_lat_to_tile(west, north, z)?;
        let se = lng_lat_to_tile(east, south, z)?;
        for x in nw.x..=se.x {
            for y in nw.y..=se.y {
                let tile = TileCoord::new(z, x, y);
                if clip && tile_lng_lat_bounds(tile).intersection_area(&clamped) <= 0.0 {
                    continue;
                }
                out.push(tile);
            }
        }
    }
    Ok(out)
}
