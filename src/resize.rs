//! Keeping annotations consistent with resized images.
//!
//! [`compute_scale`] decides the output size and the per-axis factors;
//! [`rescale_annotation`] and [`rescale_image`] apply them to metadata. The
//! pixel data itself is handled by [`resize_image_file`].
//!
//! RLE segmentations are left as they are: scaling a raster requires
//! re-rasterizing the resized image, which is outside this module.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use rayon::prelude::*;

use crate::error::{ResizeError, SeglabelError};
use crate::ir::{Annotation, Dataset, Image, ImageId, Segmentation};

const JPEG_QUALITY: u8 = 95;

/// Image size in pixels, width first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Per-axis scale factors and the integer size they produce.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleFactors {
    pub scale_x: f64,
    pub scale_y: f64,
    pub output: Size,
}

/// How a dataset should be resized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizeOptions {
    /// Requested size; with `preserve_aspect` it bounds the output.
    pub target: Size,
    pub preserve_aspect: bool,
}

/// Computes the output size and scale factors for one image.
///
/// Without `preserve_aspect` each axis is scaled to its target on its own.
/// With it, the smaller ratio binds: that axis hits its target exactly and
/// the other is `round(original * ratio)` (ties to even, at least 1). When
/// both ratios are equal the height ratio binds. The returned factors are
/// the actual ratios of the rounded output to the original.
pub fn compute_scale(
    original: Size,
    target: Size,
    preserve_aspect: bool,
) -> Result<ScaleFactors, ResizeError> {
    if original.width == 0 || original.height == 0 || target.width == 0 || target.height == 0 {
        return Err(ResizeError::ZeroDimension {
            original_width: original.width,
            original_height: original.height,
            target_width: target.width,
            target_height: target.height,
        });
    }

    let output = if preserve_aspect {
        let ratio_x = target.width as f64 / original.width as f64;
        let ratio_y = target.height as f64 / original.height as f64;
        if ratio_x < ratio_y {
            Size::new(target.width, scaled_side(original.height, ratio_x))
        } else {
            Size::new(scaled_side(original.width, ratio_y), target.height)
        }
    } else {
        target
    };

    Ok(ScaleFactors {
        scale_x: output.width as f64 / original.width as f64,
        scale_y: output.height as f64 / original.height as f64,
        output,
    })
}

fn scaled_side(side: u32, ratio: f64) -> u32 {
    // The binding ratio is the smaller one, so this never exceeds the target.
    ((side as f64 * ratio).round_ties_even() as u32).max(1)
}

/// Returns `annotation` with its geometry scaled by `(scale_x, scale_y)`.
///
/// Scales the bbox, every polygon coordinate, keypoint positions (not their
/// visibility flags), and multiplies the area by `scale_x * scale_y`.
pub fn rescale_annotation(annotation: &Annotation, scale_x: f64, scale_y: f64) -> Annotation {
    let segmentation = annotation.segmentation.as_ref().map(|seg| match seg {
        Segmentation::Polygons(rings) => Segmentation::Polygons(
            rings.iter().map(|ring| ring.scaled(scale_x, scale_y)).collect(),
        ),
        rle => rle.clone(),
    });

    let keypoints = annotation.keypoints.as_ref().map(|values| {
        values
            .iter()
            .enumerate()
            .map(|(idx, value)| match idx % 3 {
                0 => value * scale_x,
                1 => value * scale_y,
                _ => *value,
            })
            .collect()
    });

    Annotation {
        bbox: annotation.bbox.scaled(scale_x, scale_y),
        area: annotation.area * scale_x * scale_y,
        segmentation,
        keypoints,
        ..annotation.clone()
    }
}

/// Returns `image` with the output size of `factors`.
pub fn rescale_image(image: &Image, factors: &ScaleFactors) -> Image {
    Image {
        width: factors.output.width,
        height: factors.output.height,
        ..image.clone()
    }
}

/// A resized dataset plus the factors used for each image.
#[derive(Clone, Debug)]
pub struct ResizedDataset {
    pub dataset: Dataset,
    pub factors: BTreeMap<ImageId, ScaleFactors>,
}

/// Resizes every image of `dataset` and rescales its annotations.
///
/// The input is left untouched, so it can be resized again to other sizes.
pub fn resize_dataset(
    dataset: &Dataset,
    options: &ResizeOptions,
) -> Result<ResizedDataset, SeglabelError> {
    let mut factors = BTreeMap::new();
    let mut images = Vec::with_capacity(dataset.images.len());
    for image in &dataset.images {
        let scale = compute_scale(
            Size::new(image.width, image.height),
            options.target,
            options.preserve_aspect,
        )?;
        images.push(rescale_image(image, &scale));
        factors.insert(image.id, scale);
    }

    let annotations = dataset
        .annotations
        .iter()
        .map(|ann| {
            let scale = factors
                .get(&ann.image_id)
                .ok_or(SeglabelError::DanglingAnnotation {
                    annotation_id: ann.id,
                    image_id: ann.image_id,
                })?;
            Ok(rescale_annotation(ann, scale.scale_x, scale.scale_y))
        })
        .collect::<Result<Vec<_>, SeglabelError>>()?;

    let rle_count = dataset
        .annotations
        .iter()
        .filter(|ann| matches!(&ann.segmentation, Some(seg) if !seg.is_polygons()))
        .count();
    if rle_count > 0 {
        tracing::warn!(
            count = rle_count,
            "RLE segmentations keep their original size; re-encode them from resized masks"
        );
    }
    tracing::debug!(
        images = images.len(),
        annotations = annotations.len(),
        "Rescaled dataset"
    );

    Ok(ResizedDataset {
        dataset: Dataset {
            info: dataset.info.clone(),
            licenses: dataset.licenses.clone(),
            images,
            categories: dataset.categories.clone(),
            annotations,
        },
        factors,
    })
}

/// Output encoding for resized image files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFileFormat {
    Png,
    Jpeg,
}

impl ImageFileFormat {
    /// Parses `png`, `jpeg` or `jpg` (case-insensitive).
    pub fn parse(name: &str) -> Result<Self, SeglabelError> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFileFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFileFormat::Jpeg),
            other => Err(SeglabelError::UnsupportedFormat(format!(
                "'{other}' (supported: png, jpeg)"
            ))),
        }
    }

    /// Picks the format matching a file name's extension; JPEG otherwise.
    pub fn from_file_name(file_name: &str) -> Self {
        let is_png = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("png"))
            .unwrap_or(false);
        if is_png {
            ImageFileFormat::Png
        } else {
            ImageFileFormat::Jpeg
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFileFormat::Png => "png",
            ImageFileFormat::Jpeg => "jpg",
        }
    }
}

/// Resizes an image file to exactly `output` and writes it to `dst`.
///
/// Uses a triangle (bilinear) filter; JPEG output is written at quality 95.
pub fn resize_image_file(
    src: &Path,
    dst: &Path,
    output: Size,
    format: ImageFileFormat,
) -> Result<(), SeglabelError> {
    let image = image::open(src).map_err(|source| SeglabelError::ImageFile {
        path: src.to_path_buf(),
        source,
    })?;
    let resized = image.resize_exact(output.width, output.height, FilterType::Triangle);

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    let written = match format {
        ImageFileFormat::Png => resized.save_with_format(dst, image::ImageFormat::Png),
        ImageFileFormat::Jpeg => {
            let mut writer = BufWriter::new(File::create(dst)?);
            let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
            resized.to_rgb8().write_with_encoder(encoder)
        }
    };
    written.map_err(|source| SeglabelError::ImageFile {
        path: dst.to_path_buf(),
        source,
    })
}

/// Resizes the files of every image in `resized` from `image_dir` into
/// `out_dir`, one image per task.
///
/// Output files keep the source stem with the extension of `format`, and
/// each image's `file_name` is updated to match. Returns the number of
/// files written. Fails with [`SeglabelError::OutputNameCollision`] before
/// writing anything when two images would share an output name.
pub fn resize_image_dir(
    resized: &mut ResizedDataset,
    image_dir: &Path,
    out_dir: &Path,
    format: ImageFileFormat,
) -> Result<usize, SeglabelError> {
    let names = output_names(&resized.dataset.images, format)?;
    fs::create_dir_all(out_dir)?;

    resized
        .dataset
        .images
        .par_iter()
        .zip(names.par_iter())
        .try_for_each(|(image, name)| {
            resize_image_file(
                &image_dir.join(&image.file_name),
                &out_dir.join(name),
                Size::new(image.width, image.height),
                format,
            )?;
            tracing::debug!(image_id = %image.id, file = %name, "Resized image file");
            Ok::<(), SeglabelError>(())
        })?;

    let count = names.len();
    for (image, name) in resized.dataset.images.iter_mut().zip(names) {
        image.file_name = name;
    }
    Ok(count)
}

/// Flat output file names, one per image: the source stem plus the
/// extension of `format`. Two images mapping to the same name is an error.
fn output_names(images: &[Image], format: ImageFileFormat) -> Result<Vec<String>, SeglabelError> {
    let mut claimed: BTreeMap<String, &str> = BTreeMap::new();
    let mut names = Vec::with_capacity(images.len());
    for image in images {
        let name = format!("{}.{}", image.file_stem(), format.extension());
        if let Some(first) = claimed.insert(name.clone(), &image.file_name) {
            return Err(SeglabelError::OutputNameCollision {
                name,
                first: first.to_string(),
                second: image.file_name.clone(),
            });
        }
        names.push(name);
    }
    Ok(names)
}
