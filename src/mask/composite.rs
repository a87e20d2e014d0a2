//! Compositing per-object masks into label rasters.
//!
//! Objects are painted in ascending area order and a pixel is written only
//! while it is still background. Small objects therefore keep their pixels
//! where they overlap a larger object, and a small object fully hidden by
//! another small object painted before it is lost.

use crate::error::MaskError;
use crate::ir::{Annotation, Segmentation};

use super::polygon::rasterize;
use super::rle::{decompress, from_uncompressed, Rle};
use super::Canvas;

/// A row-major integer raster; 0 is background.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelRaster {
    canvas: Canvas,
    values: Vec<u64>,
}

impl LabelRaster {
    pub fn zeros(canvas: Canvas) -> Self {
        Self {
            canvas,
            values: vec![0; canvas.pixel_count() as usize],
        }
    }

    #[inline]
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Value at `(row, col)`. Panics when out of bounds.
    #[inline]
    pub fn get(&self, row: u32, col: u32) -> u64 {
        assert!(row < self.canvas.height && col < self.canvas.width);
        self.values[row as usize * self.canvas.width as usize + col as usize]
    }

    /// All values, row-major.
    #[inline]
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    /// One row of values. Panics when `row` is out of bounds.
    pub fn row(&self, row: u32) -> &[u64] {
        assert!(row < self.canvas.height);
        let width = self.canvas.width as usize;
        let start = row as usize * width;
        &self.values[start..start + width]
    }

    /// Writes `value` over every foreground pixel of `rle` still at 0.
    fn paint_if_empty(&mut self, rle: &Rle, value: u64) {
        let height = self.canvas.height as u64;
        let width = self.canvas.width as usize;
        for (start, len) in rle.foreground_runs() {
            for idx in start..start + len {
                let row = (idx % height) as usize;
                let col = (idx / height) as usize;
                let px = &mut self.values[row * width + col];
                if *px == 0 {
                    *px = value;
                }
            }
        }
    }
}

/// The three aligned rasters produced for one image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelMaps {
    /// Category id per pixel.
    pub class: LabelRaster,
    /// 1-based paint order per pixel.
    pub instance: LabelRaster,
    /// Owning annotation id per pixel.
    pub identity: LabelRaster,
}

/// Resolves any segmentation variant to an RLE on `canvas`.
///
/// RLE variants whose declared size differs from `canvas` fail with
/// [`MaskError::ImageSizeMismatch`].
pub fn resolve_segmentation(segmentation: &Segmentation, canvas: Canvas) -> Result<Rle, MaskError> {
    match segmentation {
        Segmentation::Polygons(rings) => rasterize(rings, canvas),
        Segmentation::UncompressedRle(rle) => from_uncompressed(rle, canvas),
        Segmentation::CompressedRle(compressed) => {
            let rle = decompress(compressed)?;
            if rle.canvas != canvas {
                return Err(MaskError::ImageSizeMismatch {
                    mask_height: rle.canvas.height,
                    mask_width: rle.canvas.width,
                    image_height: canvas.height,
                    image_width: canvas.width,
                });
            }
            Ok(rle)
        }
    }
}

/// Composites the annotations of one image into class, instance and
/// identity rasters.
///
/// Every mask is resolved before anything is painted, so a failure returns
/// no rasters at all. Equal areas keep their input order.
pub fn composite(annotations: &[&Annotation], canvas: Canvas) -> Result<LabelMaps, MaskError> {
    if annotations.is_empty() {
        return Err(MaskError::EmptyAnnotationSet);
    }

    let mut resolved = annotations
        .iter()
        .map(|ann| {
            let segmentation = ann
                .segmentation
                .as_ref()
                .ok_or(MaskError::MissingSegmentation(ann.id))?;
            Ok((*ann, resolve_segmentation(segmentation, canvas)?))
        })
        .collect::<Result<Vec<_>, MaskError>>()?;

    resolved.sort_by(|(a, _), (b, _)| a.area.total_cmp(&b.area));

    let mut maps = LabelMaps {
        class: LabelRaster::zeros(canvas),
        instance: LabelRaster::zeros(canvas),
        identity: LabelRaster::zeros(canvas),
    };
    for (order, (ann, rle)) in resolved.iter().enumerate() {
        maps.class.paint_if_empty(rle, ann.category_id.as_u64());
        maps.instance.paint_if_empty(rle, order as u64 + 1);
        maps.identity.paint_if_empty(rle, ann.id.as_u64());
    }
    Ok(maps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BBox, CompressedRle, Polygon, UncompressedRle};
    use crate::mask::compress;

    fn square(id: u64, category: u64, x0: f64, y0: f64, side: f64) -> Annotation {
        let ring = Polygon::new(vec![x0, y0, x0 + side, y0, x0 + side, y0 + side, x0, y0 + side]);
        Annotation::new(id, 1u64, category, BBox::from_xywh(x0, y0, side, side))
            .with_segmentation(Segmentation::Polygons(vec![ring]))
    }

    #[test]
    fn test_small_object_wins_overlap_in_any_order() {
        let canvas = Canvas::new(10, 10);
        let large = square(7, 1, 0.0, 0.0, 10.0);
        let small = square(3, 2, 2.0, 2.0, 3.0);

        for order in [vec![&large, &small], vec![&small, &large]] {
            let maps = composite(&order, canvas).expect("composite");
            assert_eq!(maps.identity.get(3, 3), 3);
            assert_eq!(maps.class.get(3, 3), 2);
            assert_eq!(maps.instance.get(3, 3), 1);
            assert_eq!(maps.identity.get(9, 9), 7);
            assert_eq!(maps.instance.get(9, 9), 2);
        }
    }

    #[test]
    fn test_full_canvas_class_map() {
        let canvas = Canvas::new(4, 6);
        let ann = square(1, 5, 0.0, 0.0, 10.0);
        let maps = composite(&[&ann], canvas).expect("composite");
        assert!(maps.class.values().iter().all(|&v| v == 5));
        assert_eq!(maps.class.row(3), &[5; 6]);
    }

    #[test]
    #[should_panic]
    fn test_row_out_of_bounds_panics() {
        LabelRaster::zeros(Canvas::new(4, 6)).row(4);
    }

    #[test]
    #[should_panic]
    fn test_row_out_of_bounds_panics_on_zero_width() {
        // The slice itself would be empty here.
        LabelRaster::zeros(Canvas::new(2, 0)).row(5);
    }

    #[test]
    fn test_equal_areas_keep_input_order() {
        let canvas = Canvas::new(4, 4);
        let first = square(1, 1, 0.0, 0.0, 4.0);
        let second = square(2, 2, 0.0, 0.0, 4.0);
        let maps = composite(&[&first, &second], canvas).expect("composite");
        assert!(maps.identity.values().iter().all(|&v| v == 1));
    }

    #[test]
    fn test_rle_segmentations_are_painted_row_major() {
        let canvas = Canvas::new(2, 3);
        // Column-major [0, 0, 0, 0, 1, 1]: the whole last column.
        let uncompressed = Annotation::new(1u64, 1u64, 4u64, BBox::default()).with_segmentation(
            Segmentation::UncompressedRle(UncompressedRle {
                size: [2, 3],
                counts: vec![4, 2],
            }),
        );
        let maps = composite(&[&uncompressed], canvas).expect("composite");
        assert_eq!(maps.class.values(), &[0, 0, 4, 0, 0, 4]);

        let rle = Rle {
            canvas,
            counts: vec![0, 2, 4],
        };
        let compressed = Annotation::new(2u64, 1u64, 9u64, BBox::default()).with_segmentation(
            Segmentation::CompressedRle(CompressedRle {
                size: [2, 3],
                counts: compress(&rle),
            }),
        );
        let maps = composite(&[&compressed], canvas).expect("composite");
        assert_eq!(maps.class.values(), &[9, 0, 0, 9, 0, 0]);
    }

    #[test]
    fn test_empty_input_rejected() {
        assert_eq!(
            composite(&[], Canvas::new(2, 2)),
            Err(MaskError::EmptyAnnotationSet)
        );
    }

    #[test]
    fn test_missing_segmentation_rejected() {
        let ann = Annotation::new(11u64, 1u64, 1u64, BBox::default());
        assert_eq!(
            composite(&[&ann], Canvas::new(2, 2)),
            Err(MaskError::MissingSegmentation(11u64.into()))
        );
    }

    #[test]
    fn test_mismatched_compressed_rle_rejected() {
        let rle = Rle::empty(Canvas::new(3, 3));
        let ann = Annotation::new(1u64, 1u64, 1u64, BBox::default()).with_segmentation(
            Segmentation::CompressedRle(CompressedRle {
                size: [3, 3],
                counts: compress(&rle),
            }),
        );
        assert!(matches!(
            composite(&[&ann], Canvas::new(2, 2)),
            Err(MaskError::ImageSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_one_bad_mask_fails_whole_image() {
        let good = square(1, 1, 0.0, 0.0, 2.0);
        let bad = Annotation::new(2u64, 1u64, 1u64, BBox::default())
            .with_segmentation(Segmentation::Polygons(vec![Polygon::new(vec![0.0, 0.0])]));
        assert!(matches!(
            composite(&[&good, &bad], Canvas::new(4, 4)),
            Err(MaskError::InvalidPolygon(_))
        ));
    }
}
