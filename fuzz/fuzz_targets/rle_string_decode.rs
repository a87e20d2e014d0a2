//! Fuzz target for compressed RLE strings.
//!
//! Decoding arbitrary strings must fail cleanly; anything that decodes
//! must survive a compress/decompress round trip unchanged.
//!
//! Run with:
//!   cargo +nightly fuzz run rle_string_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use seglabel::ir::CompressedRle;
use seglabel::mask::{compress, decompress};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 || data.len() > 64 * 1024 {
        return;
    }

    let size = [u32::from(data[0]), u32::from(data[1])];
    let Ok(counts) = std::str::from_utf8(&data[2..]) else {
        return;
    };

    if let Ok(rle) = decompress(&CompressedRle {
        size,
        counts: counts.to_string(),
    }) {
        let again = decompress(&CompressedRle {
            size,
            counts: compress(&rle),
        })
        .expect("re-encoded RLE must decode");
        assert_eq!(again, rle);
    }
});
