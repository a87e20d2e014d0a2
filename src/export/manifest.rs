//! Record of converted images.
//!
//! The export pipeline reports each converted image to a [`ManifestSink`]
//! from a single thread, in dataset order.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SeglabelError;
use crate::ir::ImageId;

/// File receiving one converted image id per line.
pub const MANIFEST_FILE_NAME: &str = "images_ids.txt";

/// File receiving one converted image file stem per line, aligned with
/// [`MANIFEST_FILE_NAME`].
pub const NAMES_FILE_NAME: &str = "image_names.txt";

/// Receives every image the pipeline converted.
pub trait ManifestSink {
    fn record(&mut self, image_id: ImageId, file_stem: &str) -> Result<(), SeglabelError>;
}

/// Appends ids and file stems, one per line, to two text files in a
/// directory.
///
/// Both files are opened in append mode, so repeated runs accumulate.
#[derive(Debug)]
pub struct FileManifest {
    ids_path: PathBuf,
    names_path: PathBuf,
    ids: File,
    names: File,
}

impl FileManifest {
    /// Opens `images_ids.txt` and `image_names.txt` inside `dir`.
    pub fn in_dir(dir: &Path) -> Result<Self, SeglabelError> {
        let ids_path = dir.join(MANIFEST_FILE_NAME);
        let names_path = dir.join(NAMES_FILE_NAME);
        Ok(Self {
            ids: append(&ids_path)?,
            names: append(&names_path)?,
            ids_path,
            names_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.ids_path
    }

    pub fn names_path(&self) -> &Path {
        &self.names_path
    }
}

fn append(path: &Path) -> Result<File, SeglabelError> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

impl ManifestSink for FileManifest {
    fn record(&mut self, image_id: ImageId, file_stem: &str) -> Result<(), SeglabelError> {
        writeln!(self.ids, "{image_id}")?;
        writeln!(self.names, "{file_stem}")?;
        Ok(())
    }
}

/// Keeps recorded ids and file stems in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryManifest {
    pub ids: Vec<ImageId>,
    pub names: Vec<String>,
}

impl ManifestSink for MemoryManifest {
    fn record(&mut self, image_id: ImageId, file_stem: &str) -> Result<(), SeglabelError> {
        self.ids.push(image_id);
        self.names.push(file_stem.to_string());
        Ok(())
    }
}
