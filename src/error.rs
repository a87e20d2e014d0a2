use std::path::PathBuf;
use thiserror::Error;

use crate::ir::{AnnotationId, ImageId};

/// Failures of the mask codec, the polygon rasterizer, and the compositor.
///
/// These are local, synchronous failures of pure functions. Nothing is
/// clamped or coerced: bad input is reported with the specific kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaskError {
    #[error("Malformed RLE: {0}")]
    MalformedRle(String),

    #[error("Shape mismatch: expected {expected_height}x{expected_width}, got {actual_height}x{actual_width}")]
    ShapeMismatch {
        expected_height: u32,
        expected_width: u32,
        actual_height: u32,
        actual_width: u32,
    },

    #[error("Invalid polygon: {0}")]
    InvalidPolygon(String),

    #[error("Image size mismatch: mask is {mask_height}x{mask_width}, image is {image_height}x{image_width}")]
    ImageSizeMismatch {
        mask_height: u32,
        mask_width: u32,
        image_height: u32,
        image_width: u32,
    },

    #[error("No annotations supplied to composite")]
    EmptyAnnotationSet,

    #[error("Annotation {0} has no segmentation")]
    MissingSegmentation(AnnotationId),
}

/// Failures of the annotation resizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResizeError {
    #[error("Cannot scale from {original_width}x{original_height} to {target_width}x{target_height}: sizes must be positive")]
    ZeroDimension {
        original_width: u32,
        original_height: u32,
        target_width: u32,
        target_height: u32,
    },
}

/// The main error type for seglabel operations.
#[derive(Debug, Error)]
pub enum SeglabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse COCO JSON from {path}: {source}")]
    CocoJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write COCO JSON to {path}: {source}")]
    CocoJsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Resize(#[from] ResizeError),

    #[error("Image {image_id} failed: {source}")]
    ImageFailed {
        image_id: ImageId,
        #[source]
        source: MaskError,
    },

    #[error("Failed to process image file {path}: {source}")]
    ImageFile {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Annotation {annotation_id} references missing image {image_id}")]
    DanglingAnnotation {
        annotation_id: AnnotationId,
        image_id: ImageId,
    },

    #[error("Failed to write VOC XML to {path}: {message}")]
    VocWriteError { path: PathBuf, message: String },

    #[error("Identity value {value} at image {image_id} does not fit in int64")]
    IdentityOverflow { image_id: ImageId, value: u64 },

    #[error("Images {first} and {second} would both be written as {name}")]
    OutputNameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
