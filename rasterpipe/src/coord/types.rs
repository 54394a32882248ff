//! Core coordinate types for the tile pyramid.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Maximum latitude representable in the Web Mercator projection, in degrees.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Half the extent of the Web Mercator plane, in meters (`PI * 6378137`).
pub const ORIGIN_SHIFT: f64 = 20_037_508.342_789_244;

/// Spherical earth radius used by Web Mercator, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Maximum supported zoom level.
pub const MAX_ZOOM: u8 = 30;

/// Errors produced by coordinate conversions and zoom range handling.
#[derive(Debug, Error, PartialEq)]
pub enum CoordError {
    /// Latitude outside the Web Mercator range.
    #[error("latitude {0} outside [-{max}, {max}]", max = MAX_MERCATOR_LAT)]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180].
    #[error("longitude {0} outside [-180, 180]")]
    InvalidLongitude(f64),

    /// Zoom level beyond [`MAX_ZOOM`].
    #[error("zoom {0} exceeds maximum {MAX_ZOOM}")]
    InvalidZoom(u8),

    /// Zoom range with a zero step or end before start.
    #[error("invalid zoom range {start}..{end} step {step}")]
    InvalidRange { start: u8, end: u8, step: u8 },

    /// A tile identifier string that does not parse.
    #[error("malformed tile id: {0}")]
    MalformedTileId(String),
}

/// An axis-aligned geographic bounding box.
///
/// Coordinates are in whatever CRS the context dictates: degrees for
/// longitude/latitude extents, meters for Web Mercator extents.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Extent {
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Width of the extent in CRS units.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height of the extent in CRS units.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Returns true if the two extents overlap or touch.
    pub fn intersects(&self, other: &Extent) -> bool {
        self.west <= other.east
            && other.west <= self.east
            && self.south <= other.north
            && other.south <= self.north
    }

    /// Area of the overlap between two extents; zero when they only touch.
    pub fn intersection_area(&self, other: &Extent) -> f64 {
        let w = self.east.min(other.east) - self.west.max(other.west);
        let h = self.north.min(other.north) - self.south.max(other.south);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.west, self.south, self.east, self.north
        )
    }
}

/// The longitude/latitude extent covered by Web Mercator.
pub const MERCATOR_LNG_LAT_EXTENT: Extent =
    Extent::new(-180.0, -MAX_MERCATOR_LAT, 180.0, MAX_MERCATOR_LAT);

/// The full WGS84 longitude/latitude extent.
pub const WGS84_EXTENT: Extent = Extent::new(-180.0, -90.0, 180.0, 90.0);

/// The Web Mercator plane extent in meters.
pub const MERCATOR_EXTENT: Extent =
    Extent::new(-ORIGIN_SHIFT, -ORIGIN_SHIFT, ORIGIN_SHIFT, ORIGIN_SHIFT);

/// A tile address in the XYZ/Web Mercator quadtree.
///
/// `y` increases southward, matching the slippy-map convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub const fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles along one axis at this tile's zoom.
    pub fn grid_size(&self) -> u32 {
        1u32 << self.z
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.z, self.x, self.y)
    }
}

/// Composite key identifying one produced tile within a generation run.
///
/// The band name is empty for single-band rasters; the string form is
/// `z-x-y` in that case and `band-z-x-y` otherwise.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId {
    pub band: String,
    pub coord: TileCoord,
}

impl TileId {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self {
            band: String::new(),
            coord: TileCoord::new(z, x, y),
        }
    }

    pub fn with_band(band: impl Into<String>, z: u8, x: u32, y: u32) -> Self {
        Self {
            band: band.into(),
            coord: TileCoord::new(z, x, y),
        }
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.band.is_empty() {
            write!(f, "{}", self.coord)
        } else {
            write!(f, "{}-{}", self.band, self.coord)
        }
    }
}

impl FromStr for TileId {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        let (band, zxy) = match parts.len() {
            3 => ("", &parts[..]),
            4 => (parts[0], &parts[1..]),
            _ => return Err(CoordError::MalformedTileId(s.to_string())),
        };
        let z = zxy[0]
            .parse::<u8>()
            .map_err(|_| CoordError::MalformedTileId(s.to_string()))?;
        let x = zxy[1]
            .parse::<u32>()
            .map_err(|_| CoordError::MalformedTileId(s.to_string()))?;
        let y = zxy[2]
            .parse::<u32>()
            .map_err(|_| CoordError::MalformedTileId(s.to_string()))?;
        Ok(TileId::with_band(band, z, x, y))
    }
}

// Tile ids serialize as their string form so they can key JSON maps.
impl Serialize for TileId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TileId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One or more zoom levels to process.
///
/// `Range` is half-open: `end` is exclusive. Use `Single` for one zoom.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ZoomRange {
    /// A single zoom level.
    Single(u8),
    /// `start, start+step, ...` while strictly below `end`.
    Range { start: u8, end: u8, step: u8 },
}

impl ZoomRange {
    /// Expands the range into concrete zoom levels.
    pub fn levels(&self) -> Result<Vec<u8>, CoordError> {
        match *self {
            ZoomRange::Single(z) => {
                if z > MAX_ZOOM {
                    return Err(CoordError::InvalidZoom(z));
                }
                Ok(vec![z])
            }
            ZoomRange::Range { start, end, step } => {
                if step == 0 || end < start {
                    return Err(CoordError::InvalidRange { start, end, step });
                }
                if end > MAX_ZOOM + 1 {
                    return Err(CoordError::InvalidZoom(end));
                }
                Ok((start..end).step_by(step as usize).collect())
            }
        }
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        ZoomRange::Range {
            start: 0,
            end: 5,
            step: 1,
        }
    }
}
