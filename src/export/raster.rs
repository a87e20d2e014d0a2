//! Writing label rasters to disk.
//!
//! Class and instance maps become 8-bit grayscale PNGs. The identity map can
//! exceed 8 bits and is stored as a NumPy `int64` array, either as a raw
//! `.npy` file or wrapped in a deflate-compressed `.npz` archive.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{GrayImage, Luma};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::SeglabelError;
use crate::ir::ImageId;
use crate::mask::LabelRaster;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const NPY_VERSION: [u8; 2] = [1, 0];
const NPY_ALIGNMENT: usize = 64;
const NPZ_ENTRY_NAME: &str = "arr_0.npy";

/// Writes `raster` as an 8-bit grayscale PNG.
///
/// Values above 255 are saturated; returns `true` when that happened.
pub fn write_label_png(path: &Path, raster: &LabelRaster) -> Result<bool, SeglabelError> {
    let canvas = raster.canvas();
    let mut saturated = false;
    let image = GrayImage::from_fn(canvas.width, canvas.height, |x, y| {
        let value = raster.get(y, x);
        saturated |= value > u8::MAX as u64;
        Luma([value.min(u8::MAX as u64) as u8])
    });
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|source| SeglabelError::ImageFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(saturated)
}

/// Serializes `raster` as NPY v1.0: little-endian `int64`, C order,
/// shape `(height, width)`.
pub fn npy_bytes(raster: &LabelRaster, image_id: ImageId) -> Result<Vec<u8>, SeglabelError> {
    let canvas = raster.canvas();
    let dict = format!(
        "{{'descr': '<i8', 'fortran_order': False, 'shape': ({}, {}), }}",
        canvas.height, canvas.width
    );
    let unpadded = NPY_MAGIC.len() + NPY_VERSION.len() + 2 + dict.len() + 1;
    let padding = (NPY_ALIGNMENT - unpadded % NPY_ALIGNMENT) % NPY_ALIGNMENT;
    let header_len = dict.len() + padding + 1;

    let mut bytes = Vec::with_capacity(unpadded + padding + raster.values().len() * 8);
    bytes.extend_from_slice(NPY_MAGIC);
    bytes.extend_from_slice(&NPY_VERSION);
    // Header length always fits: the dict is well under 64 KiB.
    bytes.extend_from_slice(&(header_len as u16).to_le_bytes());
    bytes.extend_from_slice(dict.as_bytes());
    bytes.resize(bytes.len() + padding, b' ');
    bytes.push(b'\n');

    for &value in raster.values() {
        let signed =
            i64::try_from(value).map_err(|_| SeglabelError::IdentityOverflow { image_id, value })?;
        bytes.extend_from_slice(&signed.to_le_bytes());
    }
    Ok(bytes)
}

/// Writes `raster` as a raw `.npy` file.
pub fn write_npy(path: &Path, raster: &LabelRaster, image_id: ImageId) -> Result<(), SeglabelError> {
    let bytes = npy_bytes(raster, image_id)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Writes `raster` as a `.npz` archive holding a single `arr_0.npy`.
pub fn write_npz(path: &Path, raster: &LabelRaster, image_id: ImageId) -> Result<(), SeglabelError> {
    let bytes = npy_bytes(raster, image_id)?;
    let zip_err = |source| SeglabelError::Zip {
        path: path.to_path_buf(),
        source,
    };

    let mut archive = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    archive.start_file(NPZ_ENTRY_NAME, options).map_err(zip_err)?;
    archive.write_all(&bytes)?;
    archive.finish().map_err(zip_err)?;
    Ok(())
}
