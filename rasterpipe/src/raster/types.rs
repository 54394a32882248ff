//! Supporting types for the raster backend capability set.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::Extent;

/// Proj4 string for WGS84 longitude/latitude (EPSG:4326).
pub const PROJ4_WGS84: &str = "+proj=longlat +datum=WGS84 +no_defs +type=crs";

/// Proj4 string for spherical Web Mercator (EPSG:3857).
pub const PROJ4_WEB_MERCATOR: &str = "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 \
     +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +wktext +no_defs +type=crs";

/// Sample data type of a raster band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    Float32,
    Byte,
}

/// Resampling method used during reprojection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resampling {
    #[default]
    NearestNeighbor,
    Bilinear,
}

/// Output format of a raster dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterFormat {
    #[default]
    GTiff,
    Png,
    Jpeg,
}

impl RasterFormat {
    /// File extension for this format, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            RasterFormat::GTiff => "tiff",
            RasterFormat::Png => "png",
            RasterFormat::Jpeg => "jpeg",
        }
    }
}

/// Encoding options passed to [`RasterBackend::encode`].
///
/// [`RasterBackend::encode`]: super::RasterBackend::encode
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EncodeParams {
    /// JPEG quality, 1-100. Ignored by lossless formats.
    pub quality: u8,
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self { quality: 90 }
    }
}

/// A pixel window into a raster band: offset plus size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The full window of a raster of the given size.
    pub const fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }
}

/// Affine mapping from pixel coordinates to geographic coordinates.
///
/// Stored as the six coefficients of
/// `x' = a*col + b*row + c`, `y' = d*col + e*row + f`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// The identity transform.
    pub const IDENTITY: GeoTransform = GeoTransform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 0.0,
        e: 1.0,
        f: 0.0,
    };

    /// Pure translation by `(tx, ty)`.
    pub const fn translation(tx: f64, ty: f64) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: tx,
            d: 0.0,
            e: 1.0,
            f: ty,
        }
    }

    /// Pure scaling by `(sx, sy)`.
    pub const fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: 0.0,
            e: sy,
            f: 0.0,
        }
    }

    /// Composition `self * rhs`: `rhs` is applied first.
    pub fn multiply(&self, rhs: &GeoTransform) -> GeoTransform {
        GeoTransform {
            a: self.a * rhs.a + self.b * rhs.d,
            b: self.a * rhs.b + self.b * rhs.e,
            c: self.a * rhs.c + self.b * rhs.f + self.c,
            d: self.d * rhs.a + self.e * rhs.d,
            e: self.d * rhs.b + self.e * rhs.e,
            f: self.d * rhs.c + self.e * rhs.f + self.f,
        }
    }

    /// The transform mapping pixel space of a `width x height` raster
    /// onto `extent`: `translate(west, north) * scale(pw, -ph)`.
    pub fn from_extent(extent: &Extent, width: usize, height: usize) -> GeoTransform {
        GeoTransform::translation(extent.west, extent.north).multiply(&GeoTransform::scale(
            extent.width() / width as f64,
            -extent.height() / height as f64,
        ))
    }

    /// Applies the transform to a pixel coordinate.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Inverse transform, or `None` when the transform is singular.
    pub fn invert(&self) -> Option<GeoTransform> {
        let det = self.a * self.e - self.b * self.d;
        if det == 0.0 {
            return None;
        }
        let (a, b, d, e) = (self.e / det, -self.b / det, -self.d / det, self.a / det);
        Some(GeoTransform {
            a,
            b,
            c: -(a * self.c + b * self.f),
            d,
            e,
            f: -(d * self.c + e * self.f),
        })
    }

    /// The geographic extent covered by a `width x height` raster under
    /// this transform.
    pub fn extent(&self, width: usize, height: usize) -> Extent {
        let (minx, maxy) = self.apply(0.0, 0.0);
        let (maxx, miny) = self.apply(width as f64, height as f64);
        Extent::new(minx, miny, maxx, maxy)
    }

    /// Coefficients in GDAL geotransform order.
    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }
}

/// Errors reported by raster backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Filesystem I/O failure.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A dataset could not be opened or decoded.
    #[error("failed to open {path}: {message}")]
    Open { path: PathBuf, message: String },

    /// An unsupported file or driver format.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A handle that is no longer (or never was) registered.
    #[error("invalid raster handle")]
    InvalidHandle,

    /// A 1-based band index outside the dataset.
    #[error("band {0} out of range")]
    InvalidBand(usize),

    /// A pixel window outside the raster bounds.
    #[error("window {x},{y} {width}x{height} exceeds raster bounds")]
    WindowOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    /// An operation that needs a geotransform found none.
    #[error("dataset has no geotransform")]
    MissingTransform,

    /// Image encoding failure.
    #[error("failed to encode {path}: {message}")]
    Encode { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_times_scale() {
        let t = GeoTransform::translation(-20.0, 50.0).multiply(&GeoTransform::scale(0.5, -0.25));
        assert_eq!(t.apply(0.0, 0.0), (-20.0, 50.0));
        assert_eq!(t.apply(4.0, 8.0), (-18.0, 48.0));
    }

    #[test]
    fn test_gdal_order() {
        let t = GeoTransform::translation(10.0, 20.0).multiply(&GeoTransform::scale(2.0, -3.0));
        assert_eq!(t.to_gdal(), [10.0, 2.0, 0.0, 20.0, 0.0, -3.0]);
    }

    #[test]
    fn test_from_extent_corners() {
        let extent = Extent::new(-180.0, -90.0, 180.0, 90.0);
        let t = GeoTransform::from_extent(&extent, 360, 180);
        assert_eq!(t.apply(0.0, 0.0), (-180.0, 90.0));
        assert_eq!(t.apply(360.0, 180.0), (180.0, -90.0));
    }

    #[test]
    fn test_invert_roundtrip() {
        let t = GeoTransform::from_extent(&Extent::new(0.0, 0.0, 100.0, 50.0), 10, 5);
        let inv = t.invert().unwrap();
        let (gx, gy) = t.apply(3.0, 2.0);
        let (px, py) = inv.apply(gx, gy);
        assert!((px - 3.0).abs() < 1e-9);
        assert!((py - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_extent_from_transform() {
        let src = Extent::new(-10.0, -5.0, 10.0, 5.0);
        let t = GeoTransform::from_extent(&src, 20, 10);
        assert_eq!(t.extent(20, 10), src);
    }

    #[test]
    fn test_singular_transform_has_no_inverse() {
        assert!(GeoTransform::scale(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn test_format_extensions() {
        assert_eq!(RasterFormat::GTiff.extension(), "tiff");
        assert_eq!(RasterFormat::Png.extension(), "png");
        assert_eq!(RasterFormat::Jpeg.extension(), "jpeg");
    }
}
