//! Masking a raster by polygon geometry.
//!
//! A cell is covered when its centre lies inside or on the boundary of the
//! geometry; with `all_touched`, when any part of the cell touches it. Both
//! tests are `geo` intersection predicates, so holes are respected.

use crate::crs::Crs;
use crate::raster::resolution_meters;
use crate::transform::{Bounds, GeoTransform};
use crate::{DemError, Raster, Result};
use geo::{coord, BoundingRect, Intersects, MultiPolygon, Point, Rect};
use std::ops::Range;

/// Options controlling [`mask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskOptions {
    /// Cover every cell the geometry touches, not only cells whose centre is inside.
    pub all_touched: bool,
    /// Crop the output to the geometry's bounding box (otherwise the full raster extent).
    pub crop: bool,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            all_touched: false,
            crop: true,
        }
    }
}

/// Elevation values of one feature: the raster cropped to the feature's
/// extent with cells outside the geometry and nodata cells set to `None`.
#[derive(Debug, Clone)]
pub struct ElevationWindow {
    /// Row-major cells, north to south.
    pub data: Vec<Option<f32>>,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Pixel to world transform of the window.
    pub transform: GeoTransform,
    /// CRS of the transform.
    pub crs: Crs,
}

impl ElevationWindow {
    /// Cell value at (col, row), `None` when invalid or out of range.
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.data[row * self.width + col]
    }

    /// Minimum elevation over the valid cells.
    pub fn valid_min(&self) -> Option<f32> {
        self.data.iter().flatten().copied().reduce(f32::min)
    }

    /// Number of valid cells.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_some()).count()
    }

    /// Every cell with invalid cells replaced by `fill`.
    pub fn filled(&self, fill: f32) -> Vec<f32> {
        self.data.iter().map(|v| v.unwrap_or(fill)).collect()
    }

    /// World bounds of the window.
    pub fn bounds(&self) -> Bounds {
        self.transform.bounds(self.width, self.height)
    }

    /// Pixel size in meters (geographic windows converted at the centre latitude).
    pub fn resolution_meters(&self) -> (f64, f64) {
        resolution_meters(&self.crs, &self.transform, &self.bounds())
    }

    /// Invalidate every cell not covered by `geometry` (same CRS as the window).
    pub fn clip_to(mut self, geometry: &MultiPolygon<f64>, all_touched: bool) -> Self {
        let covered = coverage(
            geometry,
            &self.transform,
            self.width,
            self.height,
            all_touched,
        );
        for (cell, inside) in self.data.iter_mut().zip(covered) {
            if !inside {
                *cell = None;
            }
        }
        self
    }
}

/// Mask `raster` by `geometry`, which must already be in the raster's CRS.
///
/// Returns [`DemError::NoOverlap`] when the geometry's bounds miss the raster
/// entirely and [`DemError::EmptyGeometry`] for geometry without coordinates.
pub fn mask(raster: &Raster, geometry: &MultiPolygon<f64>, options: MaskOptions) -> Result<ElevationWindow> {
    let rect = geometry.bounding_rect().ok_or(DemError::EmptyGeometry)?;
    let geom_bounds = Bounds::from(rect);
    let (raster_width, raster_height) = raster.dimensions();
    let transform = raster.transform();

    let no_overlap = || DemError::NoOverlap {
        min_x: geom_bounds.min_x,
        min_y: geom_bounds.min_y,
        max_x: geom_bounds.max_x,
        max_y: geom_bounds.max_y,
    };

    // Degenerate (zero-area) bounds still touch pixels, so test inclusively
    let raster_bounds = raster.bounds();
    if geom_bounds.max_x < raster_bounds.min_x
        || geom_bounds.min_x > raster_bounds.max_x
        || geom_bounds.max_y < raster_bounds.min_y
        || geom_bounds.min_y > raster_bounds.max_y
    {
        return Err(no_overlap());
    }

    let (col_range, row_range) = if options.crop {
        let (c0, r0) = transform.world_to_pixel(geom_bounds.min_x, geom_bounds.max_y);
        let (c1, r1) = transform.world_to_pixel(geom_bounds.max_x, geom_bounds.min_y);
        let clamp = |lo: f64, hi: f64, limit: usize| {
            let start = lo.min(hi).floor().max(0.0) as usize;
            let end = (hi.max(lo).ceil().max(0.0) as usize).min(limit);
            // Zero-width spans still cover the pixel they sit on
            let end = if end == start { (start + 1).min(limit) } else { end };
            (start.min(limit), end)
        };
        (
            clamp(c0, c1, raster_width),
            clamp(r0, r1, raster_height),
        )
    } else {
        ((0, raster_width), (0, raster_height))
    };

    let (col_start, col_end) = col_range;
    let (row_start, row_end) = row_range;
    if col_start >= col_end || row_start >= row_end {
        return Err(no_overlap());
    }

    let width = col_end - col_start;
    let height = row_end - row_start;
    let window_transform = transform.window(col_start, row_start);
    let covered = coverage(geometry, &window_transform, width, height, options.all_touched);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let inside = covered[row * width + col];
            data.push(if inside {
                raster.get(col_start + col, row_start + row)
            } else {
                None
            });
        }
    }

    Ok(ElevationWindow {
        data,
        width,
        height,
        transform: window_transform,
        crs: raster.crs(),
    })
}

/// Per-cell coverage of `geometry` over a `width` x `height` grid.
///
/// Only cells inside each polygon's bounding box are tested.
fn coverage(
    geometry: &MultiPolygon<f64>,
    transform: &GeoTransform,
    width: usize,
    height: usize,
    all_touched: bool,
) -> Vec<bool> {
    let mut covered = vec![false; width * height];

    for polygon in geometry {
        let Some(rect) = polygon.bounding_rect() else {
            continue;
        };
        let (cols, rows) = pixel_span(transform, &rect, width, height);

        for row in rows {
            for col in cols.clone() {
                let cell = &mut covered[row * width + col];
                if *cell {
                    continue;
                }
                *cell = if all_touched {
                    polygon.intersects(&cell_rect(transform, col, row))
                } else {
                    let (x, y) = transform.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5);
                    polygon.intersects(&Point::new(x, y))
                };
            }
        }
    }

    covered
}

/// Columns and rows of a grid that a world rectangle can touch.
fn pixel_span(
    transform: &GeoTransform,
    rect: &Rect<f64>,
    width: usize,
    height: usize,
) -> (Range<usize>, Range<usize>) {
    let (c0, r0) = transform.world_to_pixel(rect.min().x, rect.max().y);
    let (c1, r1) = transform.world_to_pixel(rect.max().x, rect.min().y);
    let span = |a: f64, b: f64, limit: usize| {
        let lo = a.min(b).floor().max(0.0) as usize;
        // Edges lying on a pixel boundary still touch the next pixel
        let hi = (a.max(b).floor().max(-1.0) + 1.0) as usize;
        lo.min(limit)..hi.min(limit)
    };
    (span(c0, c1, width), span(r0, r1, height))
}

/// World rectangle of one grid cell.
fn cell_rect(transform: &GeoTransform, col: usize, row: usize) -> Rect<f64> {
    let (x0, y0) = transform.pixel_to_world(col as f64, row as f64);
    let (x1, y1) = transform.pixel_to_world(col as f64 + 1.0, row as f64 + 1.0);
    Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 })
}
