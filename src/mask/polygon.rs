//! Polygon scan conversion.
//!
//! Rings are filled with the even-odd rule, sampling each pixel at its
//! center. The scan walks columns left to right so runs come out in the
//! codec's column-major order without building a dense raster.

use crate::error::MaskError;
use crate::ir::{Coord, Polygon};

use super::rle::{merge, Rle, RunBuilder};
use super::Canvas;

/// Rasterizes the rings of one object and unions them.
///
/// Each ring is filled on its own, so overlapping parts of a split object
/// stay foreground. An empty ring list gives an all-background mask.
pub fn rasterize(rings: &[Polygon], canvas: Canvas) -> Result<Rle, MaskError> {
    let parts = rings
        .iter()
        .map(|ring| rasterize_ring(ring, canvas))
        .collect::<Result<Vec<_>, _>>()?;
    merge(canvas, &parts)
}

/// Fills a single implicitly closed ring.
pub fn rasterize_ring(ring: &Polygon, canvas: Canvas) -> Result<Rle, MaskError> {
    let vertices = checked_vertices(ring)?;
    let edges: Vec<(Coord, Coord)> = vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .map(|(a, b)| (*a, *b))
        .collect();

    let height = canvas.height as u64;
    let mut builder = RunBuilder::new();
    let mut crossings: Vec<f64> = Vec::new();

    for col in 0..canvas.width {
        let x = col as f64 + 0.5;
        crossings.clear();
        for (a, b) in &edges {
            if (a.x > x) != (b.x > x) {
                crossings.push(a.y + (x - a.x) * (b.y - a.y) / (b.x - a.x));
            }
        }
        crossings.sort_by(f64::total_cmp);

        let mut row = 0u64;
        for span in crossings.chunks_exact(2) {
            let start = first_row_at_or_below(span[0], height).max(row);
            let end = first_row_at_or_below(span[1], height).max(start);
            builder.push(false, start - row);
            builder.push(true, end - start);
            row = end;
        }
        builder.push(false, height - row);
    }

    Ok(builder.finish(canvas))
}

/// First row whose center lies at or below `y`, clamped to `[0, height]`.
fn first_row_at_or_below(y: f64, height: u64) -> u64 {
    let row = (y - 0.5).ceil();
    if row <= 0.0 {
        0
    } else {
        (row as u64).min(height)
    }
}

fn checked_vertices(ring: &Polygon) -> Result<Vec<Coord>, MaskError> {
    let coords = ring.coords();
    if coords.len() % 2 != 0 {
        return Err(MaskError::InvalidPolygon(format!(
            "ring has an odd number of coordinates ({})",
            coords.len()
        )));
    }
    if ring.vertex_count() < 3 {
        return Err(MaskError::InvalidPolygon(format!(
            "ring has {} vertices, at least 3 are required",
            ring.vertex_count()
        )));
    }
    if let Some(bad) = coords.iter().find(|v| !v.is_finite()) {
        return Err(MaskError::InvalidPolygon(format!(
            "ring contains non-finite coordinate {bad}"
        )));
    }
    Ok(ring.vertices().collect())
}
