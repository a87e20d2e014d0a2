//! Batch export of segmentation label maps.
//!
//! [`export_segmentation`] composites every image of a dataset and writes,
//! per image id:
//!
//! - `class_labels/<id>.png` and `instance_labels/<id>.png` (8-bit gray)
//! - `id_labels/<id>.npz` (or `.npy` when compression is off)
//! - `class_color/<id>.png` with the VOC palette, when colorizing
//!
//! Images are processed in parallel; converted images are then reported to
//! a [`ManifestSink`] in dataset order. Every image with files on disk is
//! reported, including when the run aborts: once one image aborts, images
//! not yet started are skipped, and a failed image's partial files are
//! removed.

mod images;
mod manifest;
mod palette;
mod raster;

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

pub use images::{copy_images, list_image_files, IMAGES_DIR_NAME};
pub use manifest::{FileManifest, ManifestSink, MemoryManifest, MANIFEST_FILE_NAME, NAMES_FILE_NAME};
pub use palette::{colorize, voc_palette};
pub use raster::{npy_bytes, write_label_png, write_npy, write_npz};

use crate::error::SeglabelError;
use crate::ir::{Annotation, Dataset, Image};
use crate::mask::{composite, Canvas, LabelMaps};

pub const CLASS_DIR_NAME: &str = "class_labels";
pub const INSTANCE_DIR_NAME: &str = "instance_labels";
pub const IDENTITY_DIR_NAME: &str = "id_labels";
pub const COLOR_DIR_NAME: &str = "class_color";

/// Options for [`export_segmentation`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegExportOptions {
    /// Only consider the first `limit` images of the dataset.
    pub limit: Option<usize>,
    /// Write identity maps as `.npz` instead of `.npy`.
    pub compress: bool,
    /// Also write palette-colored class maps.
    pub colorize: bool,
    /// Abort on the first image whose masks cannot be built.
    pub fail_fast: bool,
}

impl Default for SegExportOptions {
    fn default() -> Self {
        Self {
            limit: None,
            compress: true,
            colorize: false,
            fail_fast: false,
        }
    }
}

/// Outcome of an export run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegExportReport {
    pub converted: usize,
    pub skipped_empty: usize,
    pub failed: usize,
}

impl fmt::Display for SegExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Segmentation export:")?;
        writeln!(f, "  Converted:       {}", self.converted)?;
        writeln!(f, "  Skipped (empty): {}", self.skipped_empty)?;
        writeln!(f, "  Failed:          {}", self.failed)
    }
}

struct OutputDirs {
    class: PathBuf,
    instance: PathBuf,
    identity: PathBuf,
    color: Option<PathBuf>,
}

impl OutputDirs {
    fn create(out_dir: &Path, colorize: bool) -> Result<Self, SeglabelError> {
        let dirs = Self {
            class: out_dir.join(CLASS_DIR_NAME),
            instance: out_dir.join(INSTANCE_DIR_NAME),
            identity: out_dir.join(IDENTITY_DIR_NAME),
            color: colorize.then(|| out_dir.join(COLOR_DIR_NAME)),
        };
        for dir in [&dirs.class, &dirs.instance, &dirs.identity]
            .into_iter()
            .chain(dirs.color.as_ref())
        {
            fs::create_dir_all(dir)?;
        }
        Ok(dirs)
    }
}

/// Composites and writes label maps for the images of `dataset`.
///
/// Images without annotations are skipped. An image whose masks cannot be
/// built is logged and counted as failed, or aborts the run with
/// `fail_fast`. I/O failures always abort. On abort the images written so
/// far are still recorded in `manifest` before the first error (in dataset
/// order) is returned.
pub fn export_segmentation(
    dataset: &Dataset,
    out_dir: &Path,
    options: &SegExportOptions,
    manifest: &mut dyn ManifestSink,
) -> Result<SegExportReport, SeglabelError> {
    let dirs = OutputDirs::create(out_dir, options.colorize)?;
    let grouped = dataset.annotations_by_image();

    let mut report = SegExportReport::default();
    let mut work: Vec<(&Image, &[&Annotation])> = Vec::new();
    for image in dataset.images.iter().take(options.limit.unwrap_or(usize::MAX)) {
        match grouped.get(&image.id) {
            Some(annotations) if !annotations.is_empty() => {
                work.push((image, annotations.as_slice()))
            }
            _ => {
                tracing::debug!(image_id = %image.id, "Skipping image without annotations");
                report.skipped_empty += 1;
            }
        }
    }

    tracing::info!(images = work.len(), dir = %out_dir.display(), "Exporting segmentation maps");

    let stop = AtomicBool::new(false);
    let outcomes: Vec<ImageOutcome> = work
        .par_iter()
        .map(|(image, annotations)| {
            if stop.load(Ordering::Relaxed) {
                return ImageOutcome::Skipped;
            }
            match export_image(image, annotations, &dirs, options) {
                Ok(()) => ImageOutcome::Written,
                Err(err) => {
                    if aborts(&err, options) {
                        stop.store(true, Ordering::Relaxed);
                    }
                    ImageOutcome::Failed(err)
                }
            }
        })
        .collect();

    let mut abort = None;
    for ((image, _), outcome) in work.iter().zip(outcomes) {
        match outcome {
            ImageOutcome::Written => {
                manifest.record(image.id, &image.file_stem())?;
                report.converted += 1;
            }
            ImageOutcome::Failed(err) if aborts(&err, options) => {
                abort.get_or_insert(err);
            }
            ImageOutcome::Failed(err) => {
                tracing::warn!(error = %err, "Skipping image");
                report.failed += 1;
            }
            ImageOutcome::Skipped => {}
        }
    }
    if let Some(err) = abort {
        tracing::warn!(converted = report.converted, "Segmentation export aborted");
        return Err(err);
    }

    tracing::info!(
        converted = report.converted,
        skipped_empty = report.skipped_empty,
        failed = report.failed,
        "Segmentation export finished"
    );
    Ok(report)
}

enum ImageOutcome {
    Written,
    Failed(SeglabelError),
    /// Not started because another image aborted the run.
    Skipped,
}

/// I/O failures always abort; mask failures only with `fail_fast`.
fn aborts(err: &SeglabelError, options: &SegExportOptions) -> bool {
    options.fail_fast || !matches!(err, SeglabelError::ImageFailed { .. })
}

fn export_image(
    image: &Image,
    annotations: &[&Annotation],
    dirs: &OutputDirs,
    options: &SegExportOptions,
) -> Result<(), SeglabelError> {
    let canvas = Canvas::new(image.height, image.width);
    let maps = composite(annotations, canvas).map_err(|source| SeglabelError::ImageFailed {
        image_id: image.id,
        source,
    })?;

    let visible: BTreeSet<u64> = maps.identity.values().iter().copied().collect();
    let hidden = annotations
        .iter()
        .filter(|ann| !visible.contains(&ann.id.as_u64()))
        .count();
    if hidden > 0 {
        tracing::debug!(image_id = %image.id, hidden, "Objects fully occluded by smaller ones");
    }

    let paths = ImagePaths::new(image, dirs, options);
    if let Err(err) = write_maps(image, &maps, &paths) {
        paths.remove();
        return Err(err);
    }

    tracing::debug!(image_id = %image.id, objects = annotations.len(), "Exported image");
    Ok(())
}

/// Output files of one image.
struct ImagePaths {
    class: PathBuf,
    instance: PathBuf,
    identity: PathBuf,
    color: Option<PathBuf>,
    compress: bool,
}

impl ImagePaths {
    fn new(image: &Image, dirs: &OutputDirs, options: &SegExportOptions) -> Self {
        let png_name = format!("{}.png", image.id);
        let identity_ext = if options.compress { "npz" } else { "npy" };
        Self {
            class: dirs.class.join(&png_name),
            instance: dirs.instance.join(&png_name),
            identity: dirs.identity.join(format!("{}.{identity_ext}", image.id)),
            color: dirs.color.as_ref().map(|dir| dir.join(&png_name)),
            compress: options.compress,
        }
    }

    fn remove(&self) {
        for path in [&self.class, &self.instance, &self.identity]
            .into_iter()
            .chain(self.color.as_ref())
        {
            match fs::remove_file(path) {
                Err(err) if err.kind() != io::ErrorKind::NotFound => {
                    tracing::warn!(path = %path.display(), error = %err, "Could not remove partial output");
                }
                _ => {}
            }
        }
    }
}

fn write_maps(image: &Image, maps: &LabelMaps, paths: &ImagePaths) -> Result<(), SeglabelError> {
    for (path, raster, label) in [
        (&paths.class, &maps.class, "class"),
        (&paths.instance, &maps.instance, "instance"),
    ] {
        if write_label_png(path, raster)? {
            tracing::warn!(image_id = %image.id, map = label, "Label values above 255 saturated in PNG");
        }
    }

    if paths.compress {
        write_npz(&paths.identity, &maps.identity, image.id)?;
    } else {
        write_npy(&paths.identity, &maps.identity, image.id)?;
    }

    if let Some(path) = &paths.color {
        colorize(&maps.class)
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|source| SeglabelError::ImageFile {
                path: path.clone(),
                source,
            })?;
    }
    Ok(())
}
