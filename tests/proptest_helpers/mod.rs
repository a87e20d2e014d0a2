#![allow(dead_code)]

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use seglabel::ir::{Annotation, BBox, Polygon, Segmentation};
use seglabel::mask::{Canvas, Mask};

pub const EPS_SCALE: f64 = 1e-9;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// A canvas with both sides in `1..=max_side`.
pub fn arb_canvas(max_side: u32) -> impl Strategy<Value = Canvas> {
    (1..=max_side, 1..=max_side).prop_map(|(height, width)| Canvas::new(height, width))
}

/// A random binary mask on `canvas`.
pub fn arb_mask_on(canvas: Canvas) -> impl Strategy<Value = Mask> {
    proptest::collection::vec(any::<bool>(), canvas.pixel_count() as usize).prop_map(
        move |bits| {
            let pixels: Vec<u8> = bits.into_iter().map(u8::from).collect();
            // Row-major bits of the right length always form a mask.
            Mask::from_row_major(canvas, &pixels).expect("pixel count matches canvas")
        },
    )
}

/// A canvas plus two masks on it.
pub fn arb_mask_pair(max_side: u32) -> impl Strategy<Value = (Mask, Mask)> {
    arb_canvas(max_side).prop_flat_map(|canvas| (arb_mask_on(canvas), arb_mask_on(canvas)))
}

/// An axis-aligned rectangle ring with integer corners inside `canvas`.
pub fn arb_rect_ring(canvas: Canvas) -> impl Strategy<Value = (Polygon, u64)> {
    let (w, h) = (canvas.width, canvas.height);
    (0..w, 0..h)
        .prop_flat_map(move |(x0, y0)| (Just(x0), Just(y0), (x0 + 1)..=w, (y0 + 1)..=h))
        .prop_map(|(x0, y0, x1, y1)| {
            let (x0, y0, x1, y1) = (x0 as f64, y0 as f64, x1 as f64, y1 as f64);
            let ring = Polygon::new(vec![x0, y0, x1, y0, x1, y1, x0, y1]);
            let area = ((x1 - x0) * (y1 - y0)) as u64;
            (ring, area)
        })
}

/// An annotation with a polygon segmentation, plus finite keypoints.
pub fn arb_polygon_annotation() -> impl Strategy<Value = Annotation> {
    (
        proptest::collection::vec(0.0f64..1000.0, 6..20),
        0.0f64..1.0e6,
        proptest::collection::vec((0.0f64..1000.0, 0.0f64..1000.0, 0u8..3), 0..5),
    )
        .prop_map(|(mut coords, area, keypoints)| {
            coords.truncate(coords.len() / 2 * 2);
            let flat: Vec<f64> = keypoints
                .into_iter()
                .flat_map(|(x, y, v)| [x, y, v as f64])
                .collect();
            Annotation::new(1u64, 1u64, 1u64, BBox::from_xywh(coords[0], coords[1], 10.0, 20.0))
                .with_area(area)
                .with_segmentation(Segmentation::Polygons(vec![Polygon::new(coords)]))
                .with_keypoints(flat)
        })
}

pub fn approx_eq(left: f64, right: f64, eps: f64) -> bool {
    (left - right).abs() <= eps * left.abs().max(right.abs()).max(1.0)
}
