//! COCO JSON format reader and writer.
//!
//! COCO bounding boxes use `[x, y, width, height]` with `(x, y)` the
//! top-left corner in absolute pixels. The model keeps those four values
//! as read, so writing a dataset back out reproduces them exactly.
//! Segmentations keep their COCO shape (see [`Segmentation`]).
//!
//! # Deterministic Output
//!
//! The writer sorts every list by ID, so writing the same dataset twice
//! yields identical files.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use super::model::{Annotation, Category, Dataset, DatasetInfo, Image, License};
use super::{AnnotationId, BBox, CategoryId, ImageId, LicenseId, Segmentation};
use crate::error::SeglabelError;

// ============================================================================
// COCO Schema Types (internal to this module)
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct CocoDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<CocoInfo>,

    #[serde(default)]
    licenses: Vec<CocoLicense>,

    images: Vec<CocoImage>,

    #[serde(default)]
    annotations: Vec<CocoAnnotation>,

    #[serde(default)]
    categories: Vec<CocoCategory>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CocoInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    year: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    contributor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_created: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CocoLicense {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CocoImage {
    id: u64,
    width: u32,
    height: u32,
    #[serde(default)]
    file_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    license: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    coco_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_captured: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CocoCategory {
    id: u64,
    name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    supercategory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    keypoints: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CocoAnnotation {
    id: u64,
    image_id: u64,
    category_id: u64,

    /// COCO bbox format: [x, y, width, height] with (x,y) as top-left corner
    #[serde(default)]
    bbox: [f64; 4],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    area: Option<f64>,

    #[serde(default, deserialize_with = "deserialize_iscrowd")]
    iscrowd: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    segmentation: Option<Segmentation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    keypoints: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    num_keypoints: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
}

/// Accepts `iscrowd` as either 0/1 or a JSON boolean.
fn deserialize_iscrowd<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IsCrowd {
        Bool(bool),
        Int(u8),
    }
    match IsCrowd::deserialize(deserializer)? {
        IsCrowd::Bool(flag) => Ok(u8::from(flag)),
        IsCrowd::Int(value) => Ok(u8::from(value != 0)),
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Reads a dataset from a COCO JSON file.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use seglabel::ir::io_coco_json::read_coco_json;
///
/// let dataset = read_coco_json(Path::new("instances_val.json"))?;
/// # Ok::<(), seglabel::SeglabelError>(())
/// ```
pub fn read_coco_json(path: &Path) -> Result<Dataset, SeglabelError> {
    let file = File::open(path).map_err(SeglabelError::Io)?;
    let reader = BufReader::new(file);

    let coco: CocoDataset =
        serde_json::from_reader(reader).map_err(|source| SeglabelError::CocoJsonParse {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(coco_to_ir(coco))
}

/// Writes a dataset to a COCO JSON file, creating parent directories.
pub fn write_coco_json(path: &Path, dataset: &Dataset) -> Result<(), SeglabelError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(SeglabelError::Io)?;
    }
    let file = File::create(path).map_err(SeglabelError::Io)?;
    let writer = BufWriter::new(file);

    let coco = ir_to_coco(dataset);

    serde_json::to_writer(writer, &coco).map_err(|source| SeglabelError::CocoJsonWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a dataset from a COCO JSON string.
pub fn from_coco_str(json: &str) -> Result<Dataset, serde_json::Error> {
    let coco: CocoDataset = serde_json::from_str(json)?;
    Ok(coco_to_ir(coco))
}

/// Reads a dataset from a COCO JSON byte slice.
///
/// Useful for fuzzing and processing raw bytes without UTF-8 validation overhead.
pub fn from_coco_slice(bytes: &[u8]) -> Result<Dataset, serde_json::Error> {
    let coco: CocoDataset = serde_json::from_slice(bytes)?;
    Ok(coco_to_ir(coco))
}

/// Writes a dataset to a pretty-printed COCO JSON string.
pub fn to_coco_string(dataset: &Dataset) -> Result<String, serde_json::Error> {
    let coco = ir_to_coco(dataset);
    serde_json::to_string_pretty(&coco)
}

// ============================================================================
// Conversion: COCO -> model
// ============================================================================

fn coco_to_ir(coco: CocoDataset) -> Dataset {
    let info = coco
        .info
        .map(|info| DatasetInfo {
            year: info.year,
            version: info.version,
            description: info.description,
            contributor: info.contributor,
            url: info.url,
            date_created: info.date_created,
        })
        .unwrap_or_default();

    let licenses = coco
        .licenses
        .into_iter()
        .map(|l| License {
            id: LicenseId::new(l.id),
            name: l.name,
            url: l.url,
        })
        .collect();

    let images = coco
        .images
        .into_iter()
        .map(|img| Image {
            id: ImageId::new(img.id),
            file_name: img.file_name,
            width: img.width,
            height: img.height,
            license_id: img.license.map(LicenseId::new),
            coco_url: img.coco_url,
            date_captured: img.date_captured,
        })
        .collect();

    let categories = coco
        .categories
        .into_iter()
        .map(|cat| Category {
            id: CategoryId::new(cat.id),
            name: cat.name,
            supercategory: cat.supercategory,
            keypoints: cat.keypoints,
        })
        .collect();

    let annotations = coco
        .annotations
        .into_iter()
        .map(|ann| {
            let [x, y, w, h] = ann.bbox;
            let bbox = BBox::from_xywh(x, y, w, h);

            Annotation {
                id: AnnotationId::new(ann.id),
                image_id: ImageId::new(ann.image_id),
                category_id: CategoryId::new(ann.category_id),
                // Result files may omit area; fall back to the box.
                area: ann.area.unwrap_or_else(|| bbox.area()),
                bbox,
                iscrowd: ann.iscrowd != 0,
                segmentation: ann.segmentation,
                keypoints: ann.keypoints,
                num_keypoints: ann.num_keypoints,
                score: ann.score,
            }
        })
        .collect();

    Dataset {
        info,
        licenses,
        images,
        categories,
        annotations,
    }
}

// ============================================================================
// Conversion: model -> COCO
// ============================================================================

fn ir_to_coco(dataset: &Dataset) -> CocoDataset {
    let info = Some(CocoInfo {
        year: dataset.info.year,
        version: dataset.info.version.clone(),
        description: dataset.info.description.clone(),
        contributor: dataset.info.contributor.clone(),
        url: dataset.info.url.clone(),
        date_created: dataset.info.date_created.clone(),
    });

    let mut licenses: Vec<CocoLicense> = dataset
        .licenses
        .iter()
        .map(|l| CocoLicense {
            id: l.id.as_u64(),
            name: l.name.clone(),
            url: l.url.clone(),
        })
        .collect();
    licenses.sort_by_key(|l| l.id);

    let mut images: Vec<CocoImage> = dataset
        .images
        .iter()
        .map(|img| CocoImage {
            id: img.id.as_u64(),
            width: img.width,
            height: img.height,
            file_name: img.file_name.clone(),
            license: img.license_id.map(|l| l.as_u64()),
            coco_url: img.coco_url.clone(),
            date_captured: img.date_captured.clone(),
        })
        .collect();
    images.sort_by_key(|i| i.id);

    let mut categories: Vec<CocoCategory> = dataset
        .categories
        .iter()
        .map(|cat| CocoCategory {
            id: cat.id.as_u64(),
            name: cat.name.clone(),
            supercategory: cat.supercategory.clone(),
            keypoints: cat.keypoints.clone(),
        })
        .collect();
    categories.sort_by_key(|c| c.id);

    let mut annotations: Vec<CocoAnnotation> = dataset
        .annotations
        .iter()
        .map(|ann| CocoAnnotation {
            id: ann.id.as_u64(),
            image_id: ann.image_id.as_u64(),
            category_id: ann.category_id.as_u64(),
            bbox: ann.bbox.to_xywh(),
            area: Some(ann.area),
            iscrowd: u8::from(ann.iscrowd),
            segmentation: ann.segmentation.clone(),
            keypoints: ann.keypoints.clone(),
            num_keypoints: ann.num_keypoints,
            score: ann.score,
        })
        .collect();
    annotations.sort_by_key(|a| a.id);

    CocoDataset {
        info,
        licenses,
        images,
        annotations,
        categories,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Polygon, UncompressedRle};

    fn sample_coco_json() -> &'static str {
        r#"{
            "info": {"year": 2014, "description": "Test dataset"},
            "licenses": [{"id": 1, "name": "CC BY 4.0"}],
            "images": [
                {"id": 1, "width": 640, "height": 480, "file_name": "image001.jpg", "license": 1,
                 "coco_url": "http://images.example/image001.jpg"}
            ],
            "categories": [
                {"id": 1, "name": "person", "supercategory": "human",
                 "keypoints": ["nose", "left_eye"]}
            ],
            "annotations": [
                {
                    "id": 1,
                    "image_id": 1,
                    "category_id": 1,
                    "bbox": [10.0, 20.0, 90.0, 60.0],
                    "area": 5400.0,
                    "iscrowd": 0,
                    "segmentation": [[10, 20, 100, 20, 100, 80, 10, 80]],
                    "keypoints": [50, 30, 2, 0, 0, 0],
                    "num_keypoints": 1
                },
                {
                    "id": 2,
                    "image_id": 1,
                    "category_id": 1,
                    "bbox": [0, 0, 2, 2],
                    "area": 4,
                    "iscrowd": true,
                    "segmentation": {"size": [480, 640], "counts": [0, 2, 478, 2, 306718]}
                }
            ]
        }"#
    }

    #[test]
    fn test_coco_to_ir_basic() {
        let dataset = from_coco_str(sample_coco_json()).expect("parse failed");

        assert_eq!(dataset.images.len(), 1);
        assert_eq!(dataset.annotations.len(), 2);
        assert_eq!(dataset.info.year, Some(2014));
        assert_eq!(
            dataset.images[0].coco_url.as_deref(),
            Some("http://images.example/image001.jpg")
        );
        assert_eq!(
            dataset.categories[0].keypoints,
            Some(vec!["nose".to_string(), "left_eye".to_string()])
        );

        let ann = &dataset.annotations[0];
        assert_eq!(ann.bbox.xmax(), 100.0);
        assert_eq!(ann.bbox.ymax(), 80.0);
        assert_eq!(ann.area, 5400.0);
        assert!(!ann.iscrowd);
        assert_eq!(
            ann.segmentation,
            Some(Segmentation::Polygons(vec![Polygon::new(vec![
                10.0, 20.0, 100.0, 20.0, 100.0, 80.0, 10.0, 80.0
            ])]))
        );

        let crowd = &dataset.annotations[1];
        assert!(crowd.iscrowd);
        assert_eq!(
            crowd.segmentation,
            Some(Segmentation::UncompressedRle(UncompressedRle {
                size: [480, 640],
                counts: vec![0, 2, 478, 2, 306718],
            }))
        );
    }

    #[test]
    fn test_missing_area_falls_back_to_bbox() {
        let json = r#"{
            "images": [{"id": 1, "width": 10, "height": 10, "file_name": "a.jpg"}],
            "annotations": [{"id": 1, "image_id": 1, "category_id": 1, "bbox": [0, 0, 3, 4]}]
        }"#;
        let dataset = from_coco_str(json).expect("parse failed");
        assert_eq!(dataset.annotations[0].area, 12.0);
        assert!(dataset.annotations[0].segmentation.is_none());
    }

    #[test]
    fn test_roundtrip_preserves_segmentations() {
        let original = from_coco_str(sample_coco_json()).expect("parse failed");
        let json = to_coco_string(&original).expect("serialize failed");
        let restored = from_coco_str(&json).expect("parse failed");
        assert_eq!(original.annotations, restored.annotations);
        assert_eq!(original.images, restored.images);
    }

    #[test]
    fn test_bbox_values_survive_roundtrip_exactly() {
        let json = r#"{
            "images": [{"id": 1, "width": 640, "height": 480, "file_name": "a.jpg"}],
            "annotations": [{"id": 1, "image_id": 1, "category_id": 1,
                             "bbox": [473.07, 395.93, 38.65, 28.67], "area": 702.1}]
        }"#;
        let dataset = from_coco_str(json).expect("parse failed");
        let written = to_coco_string(&dataset).expect("serialize failed");
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();

        let bbox: Vec<f64> = parsed["annotations"][0]["bbox"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(bbox, vec![473.07, 395.93, 38.65, 28.67]);
        assert!(written.contains("38.65,"));
    }

    #[test]
    fn test_deterministic_output() {
        let bbox = BBox::from_xyxy(0.0, 0.0, 10.0, 10.0);
        let dataset = Dataset {
            images: vec![
                Image::new(3u64, "c.jpg", 100, 100),
                Image::new(1u64, "a.jpg", 100, 100),
            ],
            categories: vec![Category::new(2u64, "cat"), Category::new(1u64, "dog")],
            annotations: vec![
                Annotation::new(2u64, 1u64, 1u64, bbox),
                Annotation::new(1u64, 1u64, 1u64, bbox),
            ],
            ..Default::default()
        };

        let json = to_coco_string(&dataset).expect("serialize failed");
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["images"][0]["id"], 1);
        assert_eq!(parsed["images"][1]["id"], 3);
        assert_eq!(parsed["categories"][0]["id"], 1);
        assert_eq!(parsed["annotations"][0]["id"], 1);
        assert_eq!(parsed["annotations"][0]["bbox"][2], 10.0);
        assert_eq!(parsed["annotations"][0]["iscrowd"], 0);
    }
}
