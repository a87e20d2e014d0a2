//! Pixel-space points.

/// A 2D point in image pixel space, origin at the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns true if both coordinates are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Scales x and y independently.
    #[inline]
    pub fn scaled(&self, scale_x: f64, scale_y: f64) -> Self {
        Self::new(self.x * scale_x, self.y * scale_y)
    }
}
