//! Height grids and their print-scaled form.

use crate::{MeshError, Result};

/// Millimetres per metre.
const MM_PER_M: f64 = 1000.0;

/// A regular lattice of heights in world units (metres).
///
/// There is one vertex per elevation sample, so a `width` x `height` window
/// yields `width x height` vertices spaced `res_x` by `res_y` apart. The
/// planar extent is `(width - 1) * res_x` by `(height - 1) * res_y`.
/// Row 0 is the northern edge; north is +Y.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightGrid {
    /// Vertices per row.
    cols: usize,
    /// Vertices per column.
    rows: usize,
    /// Lattice spacing along X in metres.
    res_x: f64,
    /// Lattice spacing along Y in metres.
    res_y: f64,
    /// Exaggerated heights in metres, row-major.
    z: Vec<f64>,
}

impl HeightGrid {
    /// Build a grid from `width` x `height` elevations (row-major, north
    /// row first).
    ///
    /// Each vertex height is its elevation multiplied by `exaggeration`.
    /// Every elevation must be finite and the grid needs at least two
    /// samples along each axis.
    pub fn from_elevations(
        values: &[f32],
        width: usize,
        height: usize,
        res_x: f64,
        res_y: f64,
        exaggeration: f64,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(MeshError::EmptyGrid);
        }
        if values.len() != width * height {
            return Err(MeshError::DimensionMismatch {
                expected: width * height,
                actual: values.len(),
            });
        }
        if width < 2 || height < 2 {
            return Err(MeshError::DegenerateGrid { width, height });
        }
        if !(res_x.is_finite() && res_y.is_finite() && res_x > 0.0 && res_y > 0.0) {
            return Err(MeshError::InvalidResolution { x: res_x, y: res_y });
        }
        if !exaggeration.is_finite() {
            return Err(MeshError::InvalidExaggeration(exaggeration));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(MeshError::NonFiniteHeight {
                col: i % width,
                row: i / width,
            });
        }

        let z = values.iter().map(|&v| v as f64 * exaggeration).collect();

        Ok(Self {
            cols: width,
            rows: height,
            res_x,
            res_y,
            z,
        })
    }

    /// Lattice size in vertices (columns, rows).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Planar extent in metres (X, Y).
    pub fn extent(&self) -> (f64, f64) {
        (
            (self.cols - 1) as f64 * self.res_x,
            (self.rows - 1) as f64 * self.res_y,
        )
    }

    /// Height of a lattice vertex in metres.
    pub fn height_at(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        Some(self.z[row * self.cols + col])
    }

    /// World position of a lattice vertex in metres.
    pub fn position(&self, col: usize, row: usize) -> Option<[f64; 3]> {
        let z = self.height_at(col, row)?;
        Some([
            col as f64 * self.res_x,
            (self.rows - 1 - row) as f64 * self.res_y,
            z,
        ])
    }

    /// Uniformly scale the grid so its longest planar side is
    /// `target_size_mm`, converting metres to millimetres.
    ///
    /// The same factor is applied to X, Y and Z, so relief keeps its
    /// proportion to the footprint.
    pub fn scaled(&self, target_size_mm: f64) -> Result<ScaledModel> {
        if !(target_size_mm.is_finite() && target_size_mm > 0.0) {
            return Err(MeshError::InvalidTargetSize(target_size_mm));
        }
        let (extent_x, extent_y) = self.extent();
        let largest = extent_x.max(extent_y);
        if !(largest.is_finite() && largest > 0.0) {
            return Err(MeshError::InvalidResolution {
                x: self.res_x,
                y: self.res_y,
            });
        }

        let scale = target_size_mm / (largest * MM_PER_M);
        let factor = scale * MM_PER_M;

        let mut vertices = Vec::with_capacity(self.cols * self.rows);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let z = self.z[row * self.cols + col];
                if !z.is_finite() {
                    return Err(MeshError::NonFiniteHeight { col, row });
                }
                vertices.push([
                    col as f64 * self.res_x * factor,
                    (self.rows - 1 - row) as f64 * self.res_y * factor,
                    z * factor,
                ]);
            }
        }

        Ok(ScaledModel {
            cols: self.cols,
            rows: self.rows,
            scale,
            vertices,
        })
    }
}

/// A height grid in print millimetres.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledModel {
    /// Vertices per row.
    pub cols: usize,
    /// Vertices per column.
    pub rows: usize,
    /// Dimensionless model-to-world ratio (`target / (extent_m * 1000)`).
    pub scale: f64,
    /// Vertex positions in millimetres, row-major, row 0 northmost.
    pub vertices: Vec<[f64; 3]>,
}

impl ScaledModel {
    /// Vertex at a lattice position.
    pub fn vertex(&self, col: usize, row: usize) -> Option<[f64; 3]> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        Some(self.vertices[row * self.cols + col])
    }

    /// Lowest and highest Z.
    pub fn z_range(&self) -> (f64, f64) {
        self.vertices
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v[2]), hi.max(v[2]))
            })
    }
}
