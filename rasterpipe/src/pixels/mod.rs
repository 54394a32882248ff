//! Pixel buffers and per-buffer numeric operations
//!
//! A [`PixelBuffer`] is an owned, row-major 2-D `f32` raster band. The
//! module also carries the border enlargement used by the tile slicer to
//! share edge pixels between adjacent tiles, and the min/max grayscale
//! normalization applied before writing display tiles.

mod buffer;
mod enlarge;

pub use buffer::PixelBuffer;
pub use enlarge::{enlarge, EnlargeOptions};

/// Single-pass min/max scan over a numeric buffer.
///
/// An empty buffer yields the `(+inf, +inf)` sentinel; callers must guard
/// before feeding the result into normalization.
pub fn min_max(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (f32::INFINITY, f32::INFINITY);
    }
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in values {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    (min, max)
}
