//! Owned 2-D pixel buffer.

use serde::{Deserialize, Serialize};

use super::min_max;

/// A row-major 2-D buffer of `f32` samples.
///
/// Index `(x, y)` addresses column `x` of row `y`; row 0 is the top of
/// the raster, matching the tile grid's southward-increasing `y`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl PixelBuffer {
    /// Creates a zero-filled buffer.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Wraps an existing sample vector.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != width * height`; buffer construction from
    /// backend reads is an internal invariant, not a recoverable error.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "pixel vector length {} does not match {}x{}",
            data.len(),
            width,
            height
        );
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    /// Extracts the half-open window `[x0, x1) x [y0, y1)` into a new buffer.
    ///
    /// # Panics
    ///
    /// Panics if the window exceeds the buffer bounds; the tiler sizes its
    /// windows against the enlarged buffer so an overrun is a logic bug.
    pub fn window(&self, x0: usize, x1: usize, y0: usize, y1: usize) -> PixelBuffer {
        assert!(x0 <= x1 && x1 <= self.width, "window x out of bounds");
        assert!(y0 <= y1 && y1 <= self.height, "window y out of bounds");
        let mut out = PixelBuffer::new(x1 - x0, y1 - y0);
        for y in y0..y1 {
            let src = &self.data[y * self.width + x0..y * self.width + x1];
            let dst_start = (y - y0) * out.width;
            out.data[dst_start..dst_start + out.width].copy_from_slice(src);
        }
        out
    }

    /// Min and max over all samples; `(+inf, +inf)` for an empty buffer.
    pub fn min_max(&self) -> (f32, f32) {
        min_max(&self.data)
    }

    /// Linearly maps samples from `[min, max]` into `[0, 255]`.
    ///
    /// A uniform buffer (`min == max`) is written as constant mid-gray
    /// 127.5 instead of dividing by zero.
    pub fn normalize_gray(&mut self, min: f32, max: f32) {
        let range = max - min;
        if range == 0.0 {
            self.data.fill(127.5);
            return;
        }
        for v in &mut self.data {
            *v = (*v - min) / range * 255.0;
        }
    }

    pub fn add_scalar(&mut self, s: f32) {
        for v in &mut self.data {
            *v += s;
        }
    }

    pub fn sub_scalar(&mut self, s: f32) {
        for v in &mut self.data {
            *v -= s;
        }
    }

    pub fn mul_scalar(&mut self, s: f32) {
        for v in &mut self.data {
            *v *= s;
        }
    }

    pub fn div_scalar(&mut self, s: f32) {
        for v in &mut self.data {
            *v /= s;
        }
    }

    /// Element-wise addition with a buffer of identical shape.
    ///
    /// # Panics
    ///
    /// Panics when shapes differ.
    pub fn add(&mut self, other: &PixelBuffer) {
        self.zip_apply(other, |a, b| a + b);
    }

    pub fn sub(&mut self, other: &PixelBuffer) {
        self.zip_apply(other, |a, b| a - b);
    }

    pub fn mul(&mut self, other: &PixelBuffer) {
        self.zip_apply(other, |a, b| a * b);
    }

    pub fn div(&mut self, other: &PixelBuffer) {
        self.zip_apply(other, |a, b| a / b);
    }

    fn zip_apply(&mut self, other: &PixelBuffer, f: impl Fn(f32, f32) -> f32) {
        assert_eq!(
            (self.width, self.height),
            (other.width, other.height),
            "shape mismatch in element-wise op"
        );
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a = f(*a, *b);
        }
    }
}
