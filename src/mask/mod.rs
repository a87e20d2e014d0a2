//! Mask rasterization and compositing.
//!
//! Segmentations are turned into run-length encoded masks ([`Rle`]) and
//! merged into per-pixel label rasters ([`LabelMaps`]).
//!
//! # Raster order
//!
//! Run lengths follow the COCO convention and scan the canvas in
//! **column-major** order: pixel `(row, col)` sits at linear index
//! `row + height * col`, so a run may wrap from the bottom of one column to
//! the top of the next. [`Mask`] stores its pixels in the same order. The
//! label rasters produced by the compositor are row-major, matching how
//! images are written.
//!
//! Every function here is pure: no I/O, no shared state, and a failure
//! leaves nothing partially built.

mod composite;
mod polygon;
mod rle;

pub use composite::{composite, resolve_segmentation, LabelMaps, LabelRaster};
pub use polygon::{rasterize, rasterize_ring};
pub use rle::{compress, decode, decompress, encode, from_uncompressed, merge, Rle};

use crate::error::MaskError;

/// Canvas size, height first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Canvas {
    pub height: u32,
    pub width: u32,
}

impl Canvas {
    #[inline]
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    /// Reads a COCO `[height, width]` size pair.
    #[inline]
    pub fn from_size(size: [u32; 2]) -> Self {
        Self::new(size[0], size[1])
    }

    #[inline]
    pub fn pixel_count(&self) -> u64 {
        self.height as u64 * self.width as u64
    }

    pub(crate) fn ensure_same(&self, other: Canvas) -> Result<(), MaskError> {
        if *self == other {
            Ok(())
        } else {
            Err(MaskError::ShapeMismatch {
                expected_height: self.height,
                expected_width: self.width,
                actual_height: other.height,
                actual_width: other.width,
            })
        }
    }
}

/// A binary raster of fixed size, stored column-major.
///
/// Masks are built in one go and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    canvas: Canvas,
    data: Vec<bool>,
}

impl Mask {
    /// Builds a mask by evaluating `f(row, col)` for every pixel.
    pub fn from_fn(canvas: Canvas, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut data = Vec::with_capacity(canvas.pixel_count() as usize);
        for col in 0..canvas.width {
            for row in 0..canvas.height {
                data.push(f(row, col));
            }
        }
        Self { canvas, data }
    }

    /// Builds a mask from row-major pixels (non-zero is foreground).
    pub fn from_row_major(canvas: Canvas, pixels: &[u8]) -> Result<Self, MaskError> {
        if pixels.len() as u64 != canvas.pixel_count() {
            return Err(MaskError::MalformedRle(format!(
                "expected {} pixels for a {}x{} mask, got {}",
                canvas.pixel_count(),
                canvas.height,
                canvas.width,
                pixels.len()
            )));
        }
        let width = canvas.width as usize;
        Ok(Self::from_fn(canvas, |row, col| {
            pixels[row as usize * width + col as usize] != 0
        }))
    }

    pub(crate) fn from_column_major(canvas: Canvas, data: Vec<bool>) -> Self {
        debug_assert_eq!(data.len() as u64, canvas.pixel_count());
        Self { canvas, data }
    }

    #[inline]
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Returns the pixel at `(row, col)`. Panics when out of bounds.
    #[inline]
    pub fn get(&self, row: u32, col: u32) -> bool {
        assert!(row < self.canvas.height && col < self.canvas.width);
        self.data[row as usize + self.canvas.height as usize * col as usize]
    }

    /// Pixels in column-major order.
    #[inline]
    pub fn column_major(&self) -> &[bool] {
        &self.data
    }

    /// Number of foreground pixels.
    pub fn area(&self) -> u64 {
        self.data.iter().filter(|&&px| px).count() as u64
    }
}
