//! The Pascal VOC color map.

use image::{Rgb, RgbImage};

use crate::mask::LabelRaster;

/// The 256-entry VOC palette.
///
/// Entry `i` spreads the bits of `i` over the three channels, three bits at
/// a time, filling each channel from its most significant bit down.
pub fn voc_palette() -> [[u8; 3]; 256] {
    let mut palette = [[0u8; 3]; 256];
    for (index, color) in palette.iter_mut().enumerate() {
        let mut c = index;
        let (mut r, mut g, mut b) = (0u8, 0u8, 0u8);
        for shift in (0..8).rev() {
            r |= ((c & 1) as u8) << shift;
            g |= (((c >> 1) & 1) as u8) << shift;
            b |= (((c >> 2) & 1) as u8) << shift;
            c >>= 3;
        }
        *color = [r, g, b];
    }
    palette
}

/// Renders a label raster with the VOC palette; values above 255 use the
/// last entry.
pub fn colorize(raster: &LabelRaster) -> RgbImage {
    let palette = voc_palette();
    let canvas = raster.canvas();
    RgbImage::from_fn(canvas.width, canvas.height, |x, y| {
        let value = raster.get(y, x).min(255) as usize;
        Rgb(palette[value])
    })
}
