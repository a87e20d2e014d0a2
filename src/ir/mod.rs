//! Dataset model for seglabel.
//!
//! This module holds the in-memory form of a COCO-style annotation set:
//! images, categories, and annotations carrying a bounding box and a
//! segmentation. Format readers and writers (`io_coco_json`, `io_voc_xml`)
//! convert to and from this model; the mask and resize modules operate on it.
//!
//! # Conventions
//!
//! 1. **Pixel space, origin top-left**: all coordinates are absolute pixel
//!    positions. Bounding boxes are stored as XYXY and converted to COCO's
//!    XYWH only at the format boundary.
//!
//! 2. **Tagged segmentations**: the three COCO segmentation shapes are
//!    resolved once, at deserialization, into [`Segmentation`].
//!
//! 3. **Permissive construction**: model types accept geometrically odd
//!    values (negative runs, degenerate rings). The codec reports them when a
//!    mask is materialized instead of the parser rejecting them.
//!
//! # Example
//!
//! ```
//! use seglabel::ir::{Annotation, BBox, Category, Dataset, Image, Polygon, Segmentation};
//!
//! let dataset = Dataset {
//!     images: vec![Image::new(1u64, "image.jpg", 640, 480)],
//!     categories: vec![Category::new(1u64, "person")],
//!     annotations: vec![
//!         Annotation::new(1u64, 1u64, 1u64, BBox::from_xywh(10.0, 20.0, 90.0, 60.0))
//!             .with_segmentation(Segmentation::Polygons(vec![Polygon::new(vec![
//!                 10.0, 20.0, 100.0, 20.0, 100.0, 80.0, 10.0, 80.0,
//!             ])])),
//!     ],
//!     ..Default::default()
//! };
//! assert_eq!(dataset.annotations_for(1u64.into()).len(), 1);
//! ```

mod bbox;
mod coord;
mod ids;
pub mod io_coco_json;
pub mod io_voc_xml;
mod model;
mod segmentation;

pub use bbox::BBox;
pub use coord::Coord;
pub use ids::{AnnotationId, CategoryId, ImageId, LicenseId};
pub use model::{Annotation, Category, Dataset, DatasetInfo, Image, License};
pub use segmentation::{CompressedRle, Polygon, Segmentation, UncompressedRle};
