//! Core dataset model.
//!
//! Format readers produce a [`Dataset`]; the compositor and the resizer
//! consume it. Annotations are read-only inputs: transforms return new
//! values instead of mutating in place.

use std::collections::BTreeMap;
use std::path::Path;

use super::bbox::BBox;
use super::ids::{AnnotationId, CategoryId, ImageId, LicenseId};
use super::segmentation::Segmentation;

/// A complete annotation set: images plus the objects labeled on them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    pub info: DatasetInfo,
    pub licenses: Vec<License>,
    pub images: Vec<Image>,
    pub categories: Vec<Category>,
    pub annotations: Vec<Annotation>,
}

impl Dataset {
    /// Returns the annotations owned by `image_id`, in dataset order.
    pub fn annotations_for(&self, image_id: ImageId) -> Vec<&Annotation> {
        self.annotations
            .iter()
            .filter(|ann| ann.image_id == image_id)
            .collect()
    }

    /// Groups annotations by owning image, keeping dataset order per image.
    pub fn annotations_by_image(&self) -> BTreeMap<ImageId, Vec<&Annotation>> {
        let mut grouped: BTreeMap<ImageId, Vec<&Annotation>> = BTreeMap::new();
        for ann in &self.annotations {
            grouped.entry(ann.image_id).or_default().push(ann);
        }
        grouped
    }

    pub fn image(&self, image_id: ImageId) -> Option<&Image> {
        self.images.iter().find(|img| img.id == image_id)
    }

    pub fn category(&self, category_id: CategoryId) -> Option<&Category> {
        self.categories.iter().find(|cat| cat.id == category_id)
    }
}

/// Free-form dataset metadata, carried through untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DatasetInfo {
    pub year: Option<u32>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub contributor: Option<String>,
    pub url: Option<String>,
    pub date_created: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct License {
    pub id: LicenseId,
    pub name: String,
    pub url: Option<String>,
}

/// An image; provides the canvas size for rasterization.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub id: ImageId,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub license_id: Option<LicenseId>,
    pub coco_url: Option<String>,
    pub date_captured: Option<String>,
}

impl Image {
    pub fn new(
        id: impl Into<ImageId>,
        file_name: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            width,
            height,
            license_id: None,
            coco_url: None,
            date_captured: None,
        }
    }

    pub fn with_coco_url(mut self, url: impl Into<String>) -> Self {
        self.coco_url = Some(url.into());
        self
    }

    /// The file name without directories or extension, or the image id
    /// when the file name has no stem.
    pub fn file_stem(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// A category (class label).
///
/// `keypoints` names the keypoints of keypoint-style categories in order.
#[derive(Clone, Debug, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub supercategory: Option<String>,
    pub keypoints: Option<Vec<String>>,
}

impl Category {
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            supercategory: None,
            keypoints: None,
        }
    }

    pub fn with_keypoints<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.keypoints = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

/// One labeled object instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub image_id: ImageId,
    pub category_id: CategoryId,
    pub bbox: BBox,

    /// Pixel count of the object; decides painting order in the compositor.
    pub area: f64,

    /// Marks a group of indistinguishable objects.
    pub iscrowd: bool,

    pub segmentation: Option<Segmentation>,

    /// Flat `[x, y, v, x, y, v, ...]` triples.
    pub keypoints: Option<Vec<f64>>,
    pub num_keypoints: Option<u32>,

    /// Detection score, present only in result files.
    pub score: Option<f64>,
}

impl Annotation {
    /// Creates an annotation whose area defaults to the bbox area.
    pub fn new(
        id: impl Into<AnnotationId>,
        image_id: impl Into<ImageId>,
        category_id: impl Into<CategoryId>,
        bbox: BBox,
    ) -> Self {
        Self {
            id: id.into(),
            image_id: image_id.into(),
            category_id: category_id.into(),
            area: bbox.area(),
            bbox,
            iscrowd: false,
            segmentation: None,
            keypoints: None,
            num_keypoints: None,
            score: None,
        }
    }

    pub fn with_area(mut self, area: f64) -> Self {
        self.area = area;
        self
    }

    pub fn with_segmentation(mut self, segmentation: Segmentation) -> Self {
        self.segmentation = Some(segmentation);
        self
    }

    pub fn with_crowd(mut self, iscrowd: bool) -> Self {
        self.iscrowd = iscrowd;
        self
    }

    pub fn with_keypoints(mut self, keypoints: Vec<f64>) -> Self {
        self.num_keypoints = Some(
            keypoints
                .chunks_exact(3)
                .filter(|triple| triple[2] > 0.0)
                .count() as u32,
        );
        self.keypoints = Some(keypoints);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_file_stem() {
        assert_eq!(Image::new(1u64, "train/000123.jpg", 4, 4).file_stem(), "000123");
        assert_eq!(Image::new(1u64, "a.b.png", 4, 4).file_stem(), "a.b");
        assert_eq!(Image::new(7u64, "", 4, 4).file_stem(), "7");
    }

    #[test]
    fn test_annotation_builder_pattern() {
        let ann = Annotation::new(1u64, 1u64, 1u64, BBox::from_xyxy(0.0, 0.0, 50.0, 50.0))
            .with_area(123.0)
            .with_crowd(true)
            .with_keypoints(vec![1.0, 2.0, 2.0, 0.0, 0.0, 0.0]);

        assert_eq!(ann.area, 123.0);
        assert!(ann.iscrowd);
        assert_eq!(ann.num_keypoints, Some(1));
    }

    #[test]
    fn test_annotations_by_image_keeps_order() {
        let bbox = BBox::from_xyxy(0.0, 0.0, 1.0, 1.0);
        let dataset = Dataset {
            images: vec![Image::new(1u64, "a.jpg", 4, 4), Image::new(2u64, "b.jpg", 4, 4)],
            annotations: vec![
                Annotation::new(5u64, 2u64, 1u64, bbox),
                Annotation::new(3u64, 1u64, 1u64, bbox),
                Annotation::new(4u64, 2u64, 1u64, bbox),
            ],
            ..Default::default()
        };

        let grouped = dataset.annotations_by_image();
        let ids: Vec<u64> = grouped[&ImageId(2)].iter().map(|a| a.id.as_u64()).collect();
        assert_eq!(ids, vec![5, 4]);
        assert_eq!(dataset.annotations_for(ImageId(1)).len(), 1);
        assert!(dataset.image(ImageId(3)).is_none());
    }
}
