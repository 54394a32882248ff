//! Wrap-around border enlargement.
//!
//! The tile slicer reads one pixel past each tile's nominal bounds so
//! adjacent tiles share an edge pixel. Enlarging the zoom raster with a
//! wrapped border keeps that overread in bounds and spatially continuous
//! instead of zero-padded, which is what causes visible seams.

use super::PixelBuffer;
use serde::{Deserialize, Serialize};

/// Options for [`enlarge`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EnlargeOptions {
    /// Border width in pixels. Must be at least 1 and no larger than
    /// either buffer dimension.
    pub offset: usize,

    /// 1-based band index to enlarge when reading from a dataset.
    pub band: usize,
}

impl Default for EnlargeOptions {
    fn default() -> Self {
        Self { offset: 1, band: 1 }
    }
}

/// Pads a buffer of size `(w, h)` to `(w + o, h + o)` by wrapping pixels
/// from the opposite edge.
///
/// The order is significant and must not be swapped: first the last `o`
/// rows of the source are appended below it (row wrap), then the first
/// `o` columns of that row-extended buffer are prepended as new columns
/// (column wrap). Reversing the steps changes which corner pixels end up
/// duplicated.
///
/// # Panics
///
/// Panics if `offset` is zero or exceeds either dimension.
pub fn enlarge(src: &PixelBuffer, options: &EnlargeOptions) -> PixelBuffer {
    let o = options.offset;
    let (w, h) = (src.width(), src.height());
    assert!(o >= 1, "enlarge offset must be at least 1");
    assert!(o <= w && o <= h, "enlarge offset exceeds buffer size");

    // Row wrap: copy the last o rows below the original rows.
    let mut rows = PixelBuffer::new(w, h + o);
    for y in 0..h {
        for x in 0..w {
            rows.set(x, y, src.get(x, y));
        }
    }
    for i in 0..o {
        for x in 0..w {
            rows.set(x, h + i, src.get(x, h - o + i));
        }
    }

    // Column wrap: prepend the first o columns of the row-extended buffer.
    let mut out = PixelBuffer::new(w + o, h + o);
    for y in 0..h + o {
        for i in 0..o {
            out.set(i, y, rows.get(i, y));
        }
        for x in 0..w {
            out.set(o + x, y, rows.get(x, y));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, height);
        for y in 0..height {
            for x in 0..width {
                buf.set(x, y, (y * 100 + x) as f32);
            }
        }
        buf
    }

    #[test]
    fn test_enlarged_size() {
        let src = gradient(4, 3);
        let out = enlarge(&src, &EnlargeOptions { offset: 2, band: 1 });
        assert_eq!(out.width(), 6);
        assert_eq!(out.height(), 5);
    }

    #[test]
    fn test_appended_rows_copy_last_rows() {
        let src = gradient(4, 3);
        let o = 2;
        let out = enlarge(&src, &EnlargeOptions { offset: o, band: 1 });
        // Appended rows sit below the original ones; account for the
        // column shift introduced by the prepended columns.
        for i in 0..o {
            for x in 0..4 {
                assert_eq!(out.get(o + x, 3 + i), src.get(x, 3 - o + i));
            }
        }
    }

    #[test]
    fn test_prepended_columns_copy_row_extended_first_columns() {
        let src = gradient(4, 3);
        let o = 2;
        let out = enlarge(&src, &EnlargeOptions { offset: o, band: 1 });
        for y in 0..out.height() {
            for i in 0..o {
                // Column i of the result equals column i of the
                // row-extended buffer, which is column i of the result
                // shifted right by o.
                assert_eq!(out.get(i, y), out.get(o + i, y));
            }
        }
    }

    #[test]
    fn test_no_zero_fill_anywhere() {
        let mut src = PixelBuffer::new(3, 3);
        for v in src.as_mut_slice() {
            *v = 9.0;
        }
        let out = enlarge(&src, &EnlargeOptions::default());
        assert!(out.as_slice().iter().all(|&v| v == 9.0));
    }

    #[test]
    #[should_panic(expected = "offset must be at least 1")]
    fn test_zero_offset_rejected() {
        enlarge(&gradient(2, 2), &EnlargeOptions { offset: 0, band: 1 });
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_enlarge_dimensions(
                w in 1usize..24,
                h in 1usize..24,
                o in 1usize..4
            ) {
                prop_assume!(o <= w && o <= h);
                let src = gradient(w, h);
                let out = enlarge(&src, &EnlargeOptions { offset: o, band: 1 });
                prop_assert_eq!(out.width(), w + o);
                prop_assert_eq!(out.height(), h + o);
            }

            #[test]
            fn test_interior_preserved(
                w in 2usize..16,
                h in 2usize..16
            ) {
                let src = gradient(w, h);
                let out = enlarge(&src, &EnlargeOptions::default());
                for y in 0..h {
                    for x in 0..w {
                        prop_assert_eq!(out.get(1 + x, y), src.get(x, y));
                    }
                }
            }
        }
    }
}
