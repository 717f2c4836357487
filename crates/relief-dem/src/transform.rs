//! Affine pixel-to-world transforms and bounding boxes.

/// Axis-aligned bounding box in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum x (west edge).
    pub min_x: f64,
    /// Minimum y (south edge).
    pub min_y: f64,
    /// Maximum x (east edge).
    pub max_x: f64,
    /// Maximum y (north edge).
    pub max_y: f64,
}

impl Bounds {
    /// Create bounds from its edges.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounds that contain nothing; extending them with a point yields that point.
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// Grow the bounds to include a point.
    pub fn extend(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Width in world units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height in world units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if a point is within the bounds (edges inclusive).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check if two bounds share any area.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// Centre point of the bounds.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

impl From<geo::Rect<f64>> for Bounds {
    fn from(rect: geo::Rect<f64>) -> Self {
        Bounds::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// North-up affine transform from pixel (column, row) to world (x, y).
///
/// `pixel_height` is negative for the usual north-up raster where row 0 is
/// the northern edge. Rotation terms are not supported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// World x of the top-left corner of pixel (0, 0).
    pub origin_x: f64,
    /// Pixel size along x (world units per column).
    pub pixel_width: f64,
    /// World y of the top-left corner of pixel (0, 0).
    pub origin_y: f64,
    /// Pixel size along y (world units per row, negative for north-up).
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Create a transform from origin and pixel size.
    pub fn new(origin_x: f64, pixel_width: f64, origin_y: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            origin_y,
            pixel_height,
        }
    }

    /// North-up transform whose `width` x `height` pixels exactly cover `bounds`.
    pub fn from_bounds(bounds: &Bounds, width: usize, height: usize) -> Self {
        Self {
            origin_x: bounds.min_x,
            pixel_width: bounds.width() / width as f64,
            origin_y: bounds.max_y,
            pixel_height: -bounds.height() / height as f64,
        }
    }

    /// World coordinate of a (fractional) pixel position.
    ///
    /// Pixel centres are at `col + 0.5`, `row + 0.5`.
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }

    /// Fractional pixel position of a world coordinate.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Absolute pixel size (x resolution, y resolution).
    pub fn resolution(&self) -> (f64, f64) {
        (self.pixel_width.abs(), self.pixel_height.abs())
    }

    /// Transform of a sub-window whose top-left pixel is (`col_off`, `row_off`).
    pub fn window(&self, col_off: usize, row_off: usize) -> Self {
        let (origin_x, origin_y) = self.pixel_to_world(col_off as f64, row_off as f64);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }

    /// World bounds of a `width` x `height` pixel grid.
    pub fn bounds(&self, width: usize, height: usize) -> Bounds {
        let (x0, y0) = self.pixel_to_world(0.0, 0.0);
        let (x1, y1) = self.pixel_to_world(width as f64, height as f64);
        Bounds::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_world_roundtrip() {
        let t = GeoTransform::new(500_000.0, 10.0, 5_300_000.0, -10.0);
        let (x, y) = t.pixel_to_world(2.5, 3.5);
        assert_eq!((x, y), (500_025.0, 5_299_965.0));
        assert_eq!(t.world_to_pixel(x, y), (2.5, 3.5));
    }

    #[test]
    fn test_window_and_bounds() {
        let t = GeoTransform::new(0.0, 1.0, 10.0, -1.0);
        let w = t.window(2, 3);
        assert_eq!(w.origin_x, 2.0);
        assert_eq!(w.origin_y, 7.0);
        assert_eq!(t.bounds(10, 10), Bounds::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(
            GeoTransform::from_bounds(&Bounds::new(0.0, 0.0, 10.0, 10.0), 10, 10),
            t
        );
    }

    #[test]
    fn test_bounds_intersects() {
        let a = Bounds::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Bounds::new(5.0, 5.0, 15.0, 15.0)));
        assert!(!a.intersects(&Bounds::new(10.0, 0.0, 20.0, 10.0))); // Shared edge only
        assert!(!a.intersects(&Bounds::new(-5.0, 20.0, -1.0, 30.0)));
    }
}
