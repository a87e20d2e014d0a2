//! Run-length codec for binary masks.
//!
//! An [`Rle`] lists alternating background/foreground run lengths over the
//! column-major pixel sequence, always starting with a background run (which
//! may be empty). The counts of a well-formed RLE sum to the canvas pixel
//! count; [`decode`] and [`merge`] check this instead of trusting it.

use crate::error::MaskError;
use crate::ir::{BBox, CompressedRle, UncompressedRle};

use super::{Canvas, Mask};

/// Run-length encoded mask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rle {
    pub canvas: Canvas,
    /// Alternating runs of background and foreground, background first.
    pub counts: Vec<u64>,
}

impl Rle {
    /// A mask with no foreground pixels.
    pub fn empty(canvas: Canvas) -> Self {
        Self {
            canvas,
            counts: vec![canvas.pixel_count()],
        }
    }

    /// Number of foreground pixels (sum of odd-indexed runs).
    pub fn area(&self) -> u64 {
        self.counts.iter().skip(1).step_by(2).sum()
    }

    /// Foreground runs as `(start, len)` over column-major indices.
    pub fn foreground_runs(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        let mut offset = 0u64;
        self.counts
            .iter()
            .enumerate()
            .filter_map(move |(idx, &len)| {
                let start = offset;
                offset += len;
                (idx % 2 == 1 && len > 0).then_some((start, len))
            })
    }

    /// Tight bounding box of the foreground; all zeros for an empty mask.
    pub fn to_bbox(&self) -> BBox {
        let height = self.canvas.height as u64;
        let mut bounds: Option<(u64, u64, u64, u64)> = None;

        for (start, len) in self.foreground_runs() {
            let end = start + len - 1;
            let (x1, y1) = (start / height, start % height);
            let (x2, y2) = (end / height, end % height);
            // A run wrapping into the next column covers every row in between.
            let (ys, ye) = if x1 == x2 { (y1, y2 + 1) } else { (0, height) };

            bounds = Some(match bounds {
                None => (x1, ys, x2 + 1, ye),
                Some((xs0, ys0, xe0, ye0)) => (xs0.min(x1), ys0.min(ys), xe0.max(x2 + 1), ye0.max(ye)),
            });
        }

        match bounds {
            Some((xs, ys, xe, ye)) => BBox::from_xyxy(xs as f64, ys as f64, xe as f64, ye as f64),
            None => BBox::default(),
        }
    }

    fn check_sum(&self) -> Result<(), MaskError> {
        let sum = self
            .counts
            .iter()
            .try_fold(0u64, |acc, &c| acc.checked_add(c))
            .ok_or_else(|| MaskError::MalformedRle("run lengths overflow".to_string()))?;
        if sum != self.canvas.pixel_count() {
            return Err(MaskError::MalformedRle(format!(
                "run lengths sum to {} but a {}x{} canvas has {} pixels",
                sum,
                self.canvas.height,
                self.canvas.width,
                self.canvas.pixel_count()
            )));
        }
        Ok(())
    }
}

/// Accumulates runs, merging neighbours of equal value.
pub(crate) struct RunBuilder {
    counts: Vec<u64>,
    foreground: bool,
}

impl RunBuilder {
    pub(crate) fn new() -> Self {
        Self {
            counts: vec![0],
            foreground: false,
        }
    }

    pub(crate) fn push(&mut self, foreground: bool, len: u64) {
        if len == 0 {
            return;
        }
        if foreground == self.foreground {
            if let Some(last) = self.counts.last_mut() {
                *last += len;
            }
        } else {
            self.counts.push(len);
            self.foreground = foreground;
        }
    }

    pub(crate) fn finish(self, canvas: Canvas) -> Rle {
        Rle {
            canvas,
            counts: self.counts,
        }
    }
}

/// Walks the runs of one RLE in fixed-size steps.
struct RunCursor<'a> {
    counts: &'a [u64],
    next: usize,
    remaining: u64,
    foreground: bool,
}

impl<'a> RunCursor<'a> {
    fn new(counts: &'a [u64]) -> Self {
        let mut cursor = Self {
            counts,
            next: 0,
            remaining: 0,
            foreground: false,
        };
        cursor.refill();
        cursor
    }

    fn refill(&mut self) {
        while self.remaining == 0 && self.next < self.counts.len() {
            self.remaining = self.counts[self.next];
            self.foreground = self.next % 2 == 1;
            self.next += 1;
        }
    }

    fn advance(&mut self, step: u64) {
        self.remaining -= step;
        self.refill();
    }
}

/// Expands an RLE into a mask.
///
/// Fails with [`MaskError::MalformedRle`] if the runs do not cover the
/// canvas exactly.
pub fn decode(rle: &Rle) -> Result<Mask, MaskError> {
    rle.check_sum()?;
    let mut data = Vec::with_capacity(rle.canvas.pixel_count() as usize);
    for (idx, &len) in rle.counts.iter().enumerate() {
        let foreground = idx % 2 == 1;
        data.extend(std::iter::repeat(foreground).take(len as usize));
    }
    Ok(Mask::from_column_major(rle.canvas, data))
}

/// Encodes a mask, scanning column-major and starting with a background run.
pub fn encode(mask: &Mask) -> Rle {
    let mut builder = RunBuilder::new();
    for &px in mask.column_major() {
        builder.push(px, 1);
    }
    builder.finish(mask.canvas())
}

/// Pixel-wise union of RLEs on a shared canvas.
///
/// An empty input yields an all-background mask of `canvas`. Operands on a
/// different canvas fail with [`MaskError::ShapeMismatch`].
pub fn merge(canvas: Canvas, rles: &[Rle]) -> Result<Rle, MaskError> {
    for rle in rles {
        canvas.ensure_same(rle.canvas)?;
        rle.check_sum()?;
    }

    let Some((first, rest)) = rles.split_first() else {
        return Ok(Rle::empty(canvas));
    };

    Ok(rest
        .iter()
        .fold(first.clone(), |acc, rle| union_two(&acc, rle)))
}

fn union_two(a: &Rle, b: &Rle) -> Rle {
    let total = a.canvas.pixel_count();
    let mut left = RunCursor::new(&a.counts);
    let mut right = RunCursor::new(&b.counts);
    let mut builder = RunBuilder::new();
    let mut done = 0u64;

    while done < total {
        let step = left.remaining.min(right.remaining);
        if step == 0 {
            break;
        }
        builder.push(left.foreground || right.foreground, step);
        left.advance(step);
        right.advance(step);
        done += step;
    }

    builder.finish(a.canvas)
}

/// Re-encodes run lengths supplied in an annotation into a canonical RLE.
///
/// The declared `size` must equal `canvas`; negative runs and runs that do
/// not cover the canvas are rejected.
pub fn from_uncompressed(rle: &UncompressedRle, canvas: Canvas) -> Result<Rle, MaskError> {
    let declared = Canvas::from_size(rle.size);
    if declared != canvas {
        return Err(MaskError::ImageSizeMismatch {
            mask_height: declared.height,
            mask_width: declared.width,
            image_height: canvas.height,
            image_width: canvas.width,
        });
    }
    canonical_from_signed(canvas, &rle.counts)
}

fn canonical_from_signed(canvas: Canvas, counts: &[i64]) -> Result<Rle, MaskError> {
    let mut builder = RunBuilder::new();
    for (idx, &count) in counts.iter().enumerate() {
        let len = u64::try_from(count).map_err(|_| {
            MaskError::MalformedRle(format!("run {idx} has negative length {count}"))
        })?;
        builder.push(idx % 2 == 1, len);
    }
    let rle = builder.finish(canvas);
    rle.check_sum()?;
    Ok(rle)
}

const COMPRESSED_OFFSET: u8 = 48;
const MAX_GROUPS: u32 = 12;

/// Encodes an RLE into COCO's compact string form.
///
/// Each count from the fourth on is stored as the difference to the count
/// two positions earlier, then emitted in 5-bit groups (0x20 = more groups
/// follow, 0x10 = sign of the final group) offset into printable ASCII.
pub fn compress(rle: &Rle) -> String {
    let mut out = String::new();
    for (idx, &count) in rle.counts.iter().enumerate() {
        let mut x = count as i64;
        if idx > 2 {
            x -= rle.counts[idx - 2] as i64;
        }
        loop {
            let mut group = (x & 0x1f) as u8;
            x >>= 5;
            let more = if group & 0x10 != 0 { x != -1 } else { x != 0 };
            if more {
                group |= 0x20;
            }
            out.push(char::from(group + COMPRESSED_OFFSET));
            if !more {
                break;
            }
        }
    }
    out
}

/// Decodes COCO's compact string form.
pub fn decompress(rle: &CompressedRle) -> Result<Rle, MaskError> {
    let canvas = Canvas::from_size(rle.size);
    let bytes = rle.counts.as_bytes();
    let mut counts: Vec<i64> = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let mut x: i64 = 0;
        let mut groups: u32 = 0;
        loop {
            let byte = *bytes.get(pos).ok_or_else(|| {
                MaskError::MalformedRle("compressed counts end mid-value".to_string())
            })?;
            let group = byte
                .checked_sub(COMPRESSED_OFFSET)
                .filter(|g| *g < 64)
                .ok_or_else(|| {
                    MaskError::MalformedRle(format!(
                        "invalid character {:?} at offset {pos}",
                        char::from(byte)
                    ))
                })? as i64;
            x |= (group & 0x1f) << (5 * groups);
            pos += 1;
            groups += 1;

            if group & 0x20 == 0 {
                if group & 0x10 != 0 {
                    x |= -1i64 << (5 * groups);
                }
                break;
            }
            if groups >= MAX_GROUPS {
                return Err(MaskError::MalformedRle(
                    "compressed count does not fit in 64 bits".to_string(),
                ));
            }
        }

        if counts.len() > 2 {
            x = x.checked_add(counts[counts.len() - 2]).ok_or_else(|| {
                MaskError::MalformedRle("compressed count overflows".to_string())
            })?;
        }
        counts.push(x);
    }

    canonical_from_signed(canvas, &counts)
}
