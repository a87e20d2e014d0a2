//! Segmentation descriptions attached to annotations.
//!
//! COCO stores a segmentation in one of three JSON shapes: a list of
//! polygons, an object with a list of run lengths, or an object with a
//! compact string of run lengths. They are told apart here, once, by serde;
//! downstream code matches on [`Segmentation`] and never re-inspects JSON.

use serde::{Deserialize, Serialize};

use super::coord::Coord;

/// One polygon ring as a flat `[x0, y0, x1, y1, ...]` list.
///
/// The ring is implicitly closed: the last vertex connects back to the first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon(pub Vec<f64>);

impl Polygon {
    pub fn new(coords: Vec<f64>) -> Self {
        Self(coords)
    }

    pub fn coords(&self) -> &[f64] {
        &self.0
    }

    /// Number of complete (x, y) vertices.
    pub fn vertex_count(&self) -> usize {
        self.0.len() / 2
    }

    /// Iterates complete vertices; a dangling odd coordinate is ignored.
    pub fn vertices(&self) -> impl Iterator<Item = Coord> + '_ {
        self.0.chunks_exact(2).map(|pair| Coord::new(pair[0], pair[1]))
    }

    /// Multiplies every x (even index) by `scale_x` and every y (odd index)
    /// by `scale_y`.
    pub fn scaled(&self, scale_x: f64, scale_y: f64) -> Self {
        Self(
            self.0
                .iter()
                .enumerate()
                .map(|(idx, value)| {
                    if idx % 2 == 0 {
                        value * scale_x
                    } else {
                        value * scale_y
                    }
                })
                .collect(),
        )
    }
}

/// Run lengths supplied directly in an annotation.
///
/// `size` is `[height, width]`. Counts are signed so that a negative run in
/// the source file is reported by the codec instead of being lost in parsing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncompressedRle {
    pub size: [u32; 2],
    pub counts: Vec<i64>,
}

/// Run lengths in COCO's compact string encoding.
///
/// `size` is `[height, width]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedRle {
    pub size: [u32; 2],
    pub counts: String,
}

/// The segmentation of one annotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segmentation {
    /// One or more rings; a single object may be split into disjoint parts.
    Polygons(Vec<Polygon>),
    /// Compact string RLE, as found in crowd annotations and result files.
    CompressedRle(CompressedRle),
    /// Explicit run-length list.
    UncompressedRle(UncompressedRle),
}

impl Segmentation {
    /// Returns true for the polygon variant.
    pub fn is_polygons(&self) -> bool {
        matches!(self, Segmentation::Polygons(_))
    }
}
