//! Fuzz target for COCO JSON parsing.
//!
//! Feeds arbitrary bytes to the COCO JSON parser and, when parsing
//! succeeds, composites every image so that segmentations reaching the mask
//! code from a file can never panic.
//!
//! Run with:
//!   cargo +nightly fuzz run coco_json_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use seglabel::ir::io_coco_json::from_coco_slice;
use seglabel::mask::{composite, Canvas};

fuzz_target!(|data: &[u8]| {
    // 10MB is generous for JSON annotation files.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(dataset) = from_coco_slice(data) else {
        return;
    };

    for (image_id, annotations) in dataset.annotations_by_image() {
        let Some(image) = dataset.image(image_id) else {
            continue;
        };
        // Keep rasters small enough to not OOM.
        if image.width as u64 * image.height as u64 > 1 << 20 {
            continue;
        }
        let _ = composite(&annotations, Canvas::new(image.height, image.width));
    }
});
