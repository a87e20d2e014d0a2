//! Bounding boxes in pixel space.

use super::coord::Coord;

/// An axis-aligned bounding box: top-left corner plus width and height.
///
/// This is COCO's `[x, y, width, height]` layout, kept as read so that a
/// box written back out (or scaled by 1.0) is bit-identical to its input.
/// XYXY values are derived on demand.
///
/// Construction does not enforce non-negative sizes; a malformed box read
/// from a file is carried through unchanged rather than silently repaired.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BBox {
    pub min: Coord,
    pub width: f64,
    pub height: f64,
}

impl BBox {
    /// Builds a box from COCO's XYWH format, (x, y) being the top-left corner.
    #[inline]
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            min: Coord::new(x, y),
            width,
            height,
        }
    }

    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self::from_xywh(xmin, ymin, xmax - xmin, ymax - ymin)
    }

    /// Converts to COCO's XYWH format.
    #[inline]
    pub fn to_xywh(&self) -> [f64; 4] {
        [self.min.x, self.min.y, self.width, self.height]
    }

    #[inline]
    pub fn xmin(&self) -> f64 {
        self.min.x
    }

    #[inline]
    pub fn ymin(&self) -> f64 {
        self.min.y
    }

    #[inline]
    pub fn xmax(&self) -> f64 {
        self.min.x + self.width
    }

    #[inline]
    pub fn ymax(&self) -> f64 {
        self.min.y + self.height
    }

    /// May be negative if the box is malformed.
    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    /// May be negative if the box is malformed.
    #[inline]
    pub fn height(&self) -> f64 {
        self.height
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Scales the corner and size per axis: x and width by `scale_x`,
    /// y and height by `scale_y`.
    #[inline]
    pub fn scaled(&self, scale_x: f64, scale_y: f64) -> Self {
        Self {
            min: self.min.scaled(scale_x, scale_y),
            width: self.width * scale_x,
            height: self.height * scale_y,
        }
    }
}
