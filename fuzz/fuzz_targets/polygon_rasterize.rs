//! Fuzz target for polygon scan conversion.
//!
//! Arbitrary coordinates (including NaN and infinities) must either be
//! rejected or produce runs that exactly cover the canvas.
//!
//! Run with:
//!   cargo +nightly fuzz run polygon_rasterize

#![no_main]

use libfuzzer_sys::fuzz_target;
use seglabel::ir::Polygon;
use seglabel::mask::{rasterize_ring, Canvas};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 || data.len() > 4096 {
        return;
    }

    let canvas = Canvas::new(u32::from(data[0] % 64), u32::from(data[1] % 64));
    let coords: Vec<f64> = data[2..]
        .chunks_exact(8)
        .map(|chunk| f64::from_le_bytes(chunk.try_into().expect("8-byte chunk")))
        .collect();

    if let Ok(rle) = rasterize_ring(&Polygon::new(coords), canvas) {
        assert_eq!(rle.counts.iter().sum::<u64>(), canvas.pixel_count());
    }
});
