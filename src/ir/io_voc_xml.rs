//! Pascal VOC XML writers for instance and keypoint annotations.
//!
//! Instance XML can be laid out as a single `Annotations/` directory or
//! replicated into one directory per category present on the image. Keypoint
//! XML is written flat, one file per image. Images without annotations get
//! no XML.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use super::model::{Annotation, Category, Dataset, Image};
use super::{BBox, CategoryId, ImageId};
use crate::error::SeglabelError;
use crate::mask::{resolve_segmentation, Canvas};

const VOC_XML_EXTENSION: &str = "xml";
const SOURCE_DATABASE: &str = "MS COCO 2014";
const SOURCE_IMAGE: &str = "Flickr";
const INSTANCE_FOLDER: &str = "VOC2014_instance";
const KEYPOINT_FOLDER: &str = "VOC2014_keypoints";

/// Where instance XML files go.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VocInstanceLayout {
    /// One file per image in `Annotations/`.
    #[default]
    Annotations,
    /// One directory per category name (spaces become `_`); an image's file
    /// is copied into every category directory it has objects of.
    PerCategory,
}

/// Writes instance annotations as VOC XML under `out_dir`.
///
/// Returns the number of XML files written.
pub fn write_voc_instances(
    dataset: &Dataset,
    out_dir: &Path,
    layout: VocInstanceLayout,
) -> Result<usize, SeglabelError> {
    let index = DatasetIndex::build(dataset, out_dir)?;
    let annotations_dir = out_dir.join("Annotations");
    if layout == VocInstanceLayout::Annotations {
        fs::create_dir_all(&annotations_dir)?;
    }

    let mut written = 0;
    for (image, annotations) in index.images_with_annotations() {
        let file_name = xml_file_name(image);
        let first_category = index.category(annotations[0], out_dir)?;

        let mut xml = String::new();
        write_header(
            &mut xml,
            image,
            &format!("{}/{}", INSTANCE_FOLDER, first_category.name),
        );
        for annotation in &annotations {
            let category = index.category(annotation, out_dir)?;
            write_object_open(&mut xml, image, category, annotation, annotation.iscrowd);
            writeln!(xml, "  </object>").expect("write to string");
        }
        writeln!(xml, "</annotation>").expect("write to string");

        let targets: Vec<PathBuf> = match layout {
            VocInstanceLayout::Annotations => vec![annotations_dir.join(&file_name)],
            VocInstanceLayout::PerCategory => {
                let dirs: BTreeSet<String> = annotations
                    .iter()
                    .map(|ann| index.category(ann, out_dir).map(|c| category_dir_name(&c.name)))
                    .collect::<Result<_, _>>()?;
                dirs.into_iter()
                    .map(|dir| out_dir.join(dir).join(&file_name))
                    .collect()
            }
        };

        for target in targets {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &xml)?;
            written += 1;
        }
    }

    tracing::info!(files = written, dir = %out_dir.display(), "Wrote VOC instance XML");
    Ok(written)
}

/// Writes keypoint annotations as VOC XML, one file per image in `out_dir`.
///
/// Each object carries a `keypoints` element with one child per keypoint,
/// named after the category's keypoint names (`keypoint_<n>` when a name is
/// missing). Returns the number of XML files written.
pub fn write_voc_keypoints(dataset: &Dataset, out_dir: &Path) -> Result<usize, SeglabelError> {
    let index = DatasetIndex::build(dataset, out_dir)?;
    fs::create_dir_all(out_dir)?;

    let mut written = 0;
    for (image, annotations) in index.images_with_annotations() {
        let mut xml = String::new();
        write_header(&mut xml, image, KEYPOINT_FOLDER);

        for annotation in &annotations {
            let category = index.category(annotation, out_dir)?;
            write_object_open(&mut xml, image, category, annotation, false);

            if let Some(values) = &annotation.keypoints {
                let names = category.keypoints.as_deref().unwrap_or_default();
                writeln!(xml, "    <keypoints>").expect("write to string");
                for (idx, triple) in values.chunks_exact(3).enumerate() {
                    let tag = names
                        .get(idx)
                        .map(|name| xml_tag_name(name))
                        .unwrap_or_else(|| format!("keypoint_{}", idx + 1));
                    writeln!(xml, "      <{tag}>").expect("write to string");
                    writeln!(xml, "        <x>{}</x>", triple[0]).expect("write to string");
                    writeln!(xml, "        <y>{}</y>", triple[1]).expect("write to string");
                    writeln!(xml, "        <v>{}</v>", triple[2]).expect("write to string");
                    writeln!(xml, "      </{tag}>").expect("write to string");
                }
                writeln!(xml, "    </keypoints>").expect("write to string");
            }
            writeln!(xml, "  </object>").expect("write to string");
        }
        writeln!(xml, "</annotation>").expect("write to string");

        fs::write(out_dir.join(xml_file_name(image)), xml)?;
        written += 1;
    }

    tracing::info!(files = written, dir = %out_dir.display(), "Wrote VOC keypoint XML");
    Ok(written)
}

/// Lookup tables shared by both writers.
struct DatasetIndex<'a> {
    images: Vec<&'a Image>,
    categories: BTreeMap<CategoryId, &'a Category>,
    annotations: BTreeMap<ImageId, Vec<&'a Annotation>>,
}

impl<'a> DatasetIndex<'a> {
    fn build(dataset: &'a Dataset, out_dir: &Path) -> Result<Self, SeglabelError> {
        let known: BTreeSet<ImageId> = dataset.images.iter().map(|img| img.id).collect();
        if let Some(dangling) = dataset
            .annotations
            .iter()
            .find(|ann| !known.contains(&ann.image_id))
        {
            return Err(SeglabelError::VocWriteError {
                path: out_dir.to_path_buf(),
                message: format!(
                    "annotation {} references missing image {}",
                    dangling.id, dangling.image_id
                ),
            });
        }

        let mut images: Vec<&Image> = dataset.images.iter().collect();
        images.sort_by(|left, right| left.file_name.cmp(&right.file_name));

        let mut annotations = dataset.annotations_by_image();
        for list in annotations.values_mut() {
            list.sort_by_key(|ann| ann.id);
        }

        Ok(Self {
            images,
            categories: dataset.categories.iter().map(|cat| (cat.id, cat)).collect(),
            annotations,
        })
    }

    fn images_with_annotations(&self) -> impl Iterator<Item = (&'a Image, Vec<&'a Annotation>)> + '_ {
        self.images.iter().filter_map(|image| {
            self.annotations
                .get(&image.id)
                .filter(|anns| !anns.is_empty())
                .map(|anns| (*image, anns.clone()))
        })
    }

    fn category(&self, annotation: &Annotation, out_dir: &Path) -> Result<&'a Category, SeglabelError> {
        self.categories
            .get(&annotation.category_id)
            .copied()
            .ok_or_else(|| SeglabelError::VocWriteError {
                path: out_dir.to_path_buf(),
                message: format!(
                    "annotation {} references missing category {}",
                    annotation.id, annotation.category_id
                ),
            })
    }
}

fn write_header(xml: &mut String, image: &Image, folder: &str) {
    writeln!(xml, "<?xml version=\"1.0\" encoding=\"utf-8\"?>").expect("write to string");
    writeln!(xml, "<annotation>").expect("write to string");
    writeln!(xml, "  <folder>{}</folder>", xml_escape(folder)).expect("write to string");
    writeln!(xml, "  <filename>{}</filename>", xml_escape(&image.file_name))
        .expect("write to string");
    writeln!(xml, "  <source>").expect("write to string");
    writeln!(xml, "    <database>{SOURCE_DATABASE}</database>").expect("write to string");
    writeln!(xml, "    <annotation>{SOURCE_DATABASE}</annotation>").expect("write to string");
    writeln!(xml, "    <image>{SOURCE_IMAGE}</image>").expect("write to string");
    writeln!(
        xml,
        "    <url>{}</url>",
        xml_escape(image.coco_url.as_deref().unwrap_or_default())
    )
    .expect("write to string");
    writeln!(xml, "  </source>").expect("write to string");
    writeln!(xml, "  <size>").expect("write to string");
    writeln!(xml, "    <width>{}</width>", image.width).expect("write to string");
    writeln!(xml, "    <height>{}</height>", image.height).expect("write to string");
    writeln!(xml, "    <depth>3</depth>").expect("write to string");
    writeln!(xml, "  </size>").expect("write to string");
    writeln!(xml, "  <segmented>0</segmented>").expect("write to string");
}

/// Writes `<object>` with name, bbox and difficult flag, leaving it open.
fn write_object_open(
    xml: &mut String,
    image: &Image,
    category: &Category,
    annotation: &Annotation,
    difficult: bool,
) {
    let bbox = object_bbox(image, annotation);
    writeln!(xml, "  <object>").expect("write to string");
    writeln!(xml, "    <name>{}</name>", xml_escape(&category.name)).expect("write to string");
    writeln!(xml, "    <bndbox>").expect("write to string");
    writeln!(xml, "      <xmin>{}</xmin>", bbox.xmin()).expect("write to string");
    writeln!(xml, "      <ymin>{}</ymin>", bbox.ymin()).expect("write to string");
    writeln!(xml, "      <xmax>{}</xmax>", bbox.xmax()).expect("write to string");
    writeln!(xml, "      <ymax>{}</ymax>", bbox.ymax()).expect("write to string");
    writeln!(xml, "    </bndbox>").expect("write to string");
    writeln!(xml, "    <difficult>{}</difficult>", u8::from(difficult)).expect("write to string");
}

/// The annotation's box, or the tight box of its mask when the box is unset.
fn object_bbox(image: &Image, annotation: &Annotation) -> BBox {
    if annotation.bbox != BBox::default() {
        return annotation.bbox;
    }
    let Some(segmentation) = &annotation.segmentation else {
        return annotation.bbox;
    };
    match resolve_segmentation(segmentation, Canvas::new(image.height, image.width)) {
        Ok(rle) => rle.to_bbox(),
        Err(err) => {
            tracing::warn!(annotation_id = %annotation.id, error = %err, "Cannot derive bbox from mask");
            annotation.bbox
        }
    }
}

fn xml_file_name(image: &Image) -> PathBuf {
    let stem = Path::new(&image.file_name)
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_else(|| image.id.to_string().into());
    PathBuf::from(stem).with_extension(VOC_XML_EXTENSION)
}

fn category_dir_name(name: &str) -> String {
    name.replace(' ', "_")
}

/// Turns a keypoint name into a usable element name.
fn xml_tag_name(raw: &str) -> String {
    let mut tag: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !tag.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        tag.insert(0, '_');
    }
    tag
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
