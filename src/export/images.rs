//! Copying source images next to the exported labels.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::SeglabelError;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Directory, relative to the output root, that receives copied images.
pub const IMAGES_DIR_NAME: &str = "JPEGImages";

/// Lists image files directly inside `dir` (no recursion), sorted by path.
pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>, SeglabelError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && has_image_extension(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Copies every image in `image_dir` into `out_dir/JPEGImages/`.
///
/// Returns the number of files copied.
pub fn copy_images(image_dir: &Path, out_dir: &Path) -> Result<usize, SeglabelError> {
    let target_dir = out_dir.join(IMAGES_DIR_NAME);
    fs::create_dir_all(&target_dir)?;

    let files = list_image_files(image_dir)?;
    for source in &files {
        if let Some(name) = source.file_name() {
            fs::copy(source, target_dir.join(name))?;
        }
    }

    tracing::info!(count = files.len(), dir = %target_dir.display(), "Copied images");
    Ok(files.len())
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}
