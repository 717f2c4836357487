//! Triangulated terrain surfaces.

use crate::grid::ScaledModel;
use crate::{MeshError, Result};

/// Axis-aligned bounding box of a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshBounds {
    /// Minimum corner.
    pub min: [f64; 3],
    /// Maximum corner.
    pub max: [f64; 3],
}

impl MeshBounds {
    /// Edge lengths along X, Y and Z.
    pub fn size(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

/// An indexed triangle mesh.
///
/// Triangles are wound counter-clockwise when seen from outside, so the
/// terrain sheet faces +Z.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceMesh {
    /// Vertex positions.
    pub vertices: Vec<[f64; 3]>,
    /// Triangles as indices into `vertices`.
    pub triangles: Vec<[u32; 3]>,
}

impl SurfaceMesh {
    /// Triangulate a scaled lattice: two triangles per cell.
    pub fn triangulate(model: &ScaledModel) -> Result<Self> {
        check_index_range(model.vertices.len())?;

        let cols = model.cols as u32;
        let cells_x = model.cols.saturating_sub(1);
        let cells_y = model.rows.saturating_sub(1);
        let mut triangles = Vec::with_capacity(2 * cells_x * cells_y);

        for row in 0..cells_y as u32 {
            for col in 0..cells_x as u32 {
                let nw = row * cols + col;
                let ne = nw + 1;
                let sw = nw + cols;
                let se = sw + 1;
                triangles.push([sw, se, ne]);
                triangles.push([sw, ne, nw]);
            }
        }

        Ok(Self {
            vertices: model.vertices.clone(),
            triangles,
        })
    }

    /// Triangulate a scaled lattice and close it into a solid.
    ///
    /// A vertical skirt runs from the lattice boundary down to a flat bottom
    /// `thickness_mm` below the lowest vertex. The bottom is a fan around its
    /// centre so every edge is shared by exactly two triangles.
    pub fn with_base(model: &ScaledModel, thickness_mm: f64) -> Result<Self> {
        if !(thickness_mm.is_finite() && thickness_mm > 0.0) {
            return Err(MeshError::InvalidThickness(thickness_mm));
        }
        let mut mesh = Self::triangulate(model)?;
        let boundary = boundary_loop(model.cols, model.rows);
        if boundary.len() < 3 {
            return Ok(mesh);
        }
        check_index_range(mesh.vertices.len() + boundary.len() + 1)?;

        let (min_z, _) = model.z_range();
        let floor = min_z - thickness_mm;
        let top_count = mesh.vertices.len() as u32;

        // Bottom ring mirrors the boundary loop at floor height
        for &index in &boundary {
            let [x, y, _] = mesh.vertices[index as usize];
            mesh.vertices.push([x, y, floor]);
        }
        // The lattice spans (0, 0) to its north-east corner
        let [east, north, _] = model
            .vertex(model.cols - 1, 0)
            .unwrap_or([0.0, 0.0, 0.0]);
        let centre = mesh.vertices.len() as u32;
        mesh.vertices.push([east / 2.0, north / 2.0, floor]);

        let n = boundary.len();
        for i in 0..n {
            let j = (i + 1) % n;
            let (p_top, q_top) = (boundary[i], boundary[j]);
            let (p_bot, q_bot) = (top_count + i as u32, top_count + j as u32);

            mesh.triangles.push([p_top, p_bot, q_bot]);
            mesh.triangles.push([p_top, q_bot, q_top]);
            mesh.triangles.push([centre, q_bot, p_bot]);
        }

        Ok(mesh)
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Bounding box of all vertices, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<MeshBounds> {
        let first = *self.vertices.first()?;
        let bounds = self.vertices.iter().fold(
            MeshBounds {
                min: first,
                max: first,
            },
            |mut b, v| {
                for axis in 0..3 {
                    b.min[axis] = b.min[axis].min(v[axis]);
                    b.max[axis] = b.max[axis].max(v[axis]);
                }
                b
            },
        );
        Some(bounds)
    }

    /// Unit normal of a triangle, or zero for a degenerate one.
    pub fn normal(&self, triangle: [u32; 3]) -> [f64; 3] {
        let [a, b, c] = triangle.map(|i| self.vertices[i as usize]);
        facet_normal(a, b, c)
    }
}

/// Unit normal of the triangle `a b c` (counter-clockwise front face).
pub(crate) fn facet_normal(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> [f64; 3] {
    let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = [
        e1[1] * e2[2] - e1[2] * e2[1],
        e1[2] * e2[0] - e1[0] * e2[2],
        e1[0] * e2[1] - e1[1] * e2[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > f64::EPSILON {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 0.0]
    }
}

/// Lattice boundary vertex indices, counter-clockwise seen from above,
/// starting at the south-west corner.
fn boundary_loop(cols: usize, rows: usize) -> Vec<u32> {
    if cols < 2 || rows < 2 {
        return Vec::new();
    }
    let index = |col: usize, row: usize| (row * cols + col) as u32;
    let south = rows - 1;
    let east = cols - 1;

    let mut ring = Vec::with_capacity(2 * (cols - 1) + 2 * (rows - 1));
    ring.extend((0..east).map(|c| index(c, south)));
    ring.extend((1..=south).rev().map(|r| index(east, r)));
    ring.extend((1..=east).rev().map(|c| index(c, 0)));
    ring.extend((0..south).map(|r| index(0, r)));
    ring
}

fn check_index_range(vertex_count: usize) -> Result<()> {
    if vertex_count > u32::MAX as usize {
        return Err(MeshError::TooLarge(vertex_count));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeightGrid;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    fn model(width: usize, height: usize) -> ScaledModel {
        let values: Vec<f32> = (0..width * height).map(|i| (i % 5) as f32 * 3.0).collect();
        HeightGrid::from_elevations(&values, width, height, 10.0, 10.0, 2.0)
            .unwrap()
            .scaled(100.0)
            .unwrap()
    }

    /// Count of each directed edge in the mesh.
    fn directed_edges(mesh: &SurfaceMesh) -> HashMap<(u32, u32), usize> {
        let mut edges = HashMap::new();
        for t in &mesh.triangles {
            for k in 0..3 {
                *edges.entry((t[k], t[(k + 1) % 3])).or_insert(0) += 1;
            }
        }
        edges
    }

    #[test]
    fn test_two_triangles_per_cell() {
        let m = model(4, 3);
        let mesh = SurfaceMesh::triangulate(&m).unwrap();
        assert_eq!(mesh.vertices.len(), 4 * 3);
        assert_eq!(mesh.triangle_count(), 2 * 3 * 2);
    }

    #[test]
    fn test_surface_faces_up() {
        let flat = HeightGrid::from_elevations(&[7.0; 6], 3, 2, 1.0, 1.0, 1.0)
            .unwrap()
            .scaled(30.0)
            .unwrap();
        let mesh = SurfaceMesh::triangulate(&flat).unwrap();
        for t in &mesh.triangles {
            let n = mesh.normal(*t);
            assert_relative_eq!(n[2], 1.0);
        }
    }

    #[test]
    fn test_bounds() {
        let flat = HeightGrid::from_elevations(&[100.0; 100], 10, 10, 1.0, 1.0, 2.0)
            .unwrap()
            .scaled(100.0)
            .unwrap();
        let mesh = SurfaceMesh::triangulate(&flat).unwrap();
        let size = mesh.bounds().unwrap().size();
        assert_relative_eq!(size[0], 100.0, epsilon = 1e-9);
        assert_relative_eq!(size[1], 100.0, epsilon = 1e-9);
        assert_relative_eq!(size[2], 0.0);
        assert_eq!(SurfaceMesh::default().bounds(), None);
    }

    #[test]
    fn test_boundary_loop_order() {
        // 3 x 2 lattice:
        // 0 1 2
        // 3 4 5
        assert_eq!(boundary_loop(3, 2), vec![3, 4, 5, 2, 1, 0]);
        assert_eq!(boundary_loop(2, 2), vec![2, 3, 1, 0]);
        assert!(boundary_loop(1, 4).is_empty());
    }

    #[test]
    fn test_base_is_watertight_and_consistently_wound() {
        for (w, h) in [(2, 2), (4, 3), (2, 6)] {
            let m = model(w, h);
            let mesh = SurfaceMesh::with_base(&m, 2.0).unwrap();
            let edges = directed_edges(&mesh);
            for (&(a, b), &count) in &edges {
                assert_eq!(count, 1, "edge {}->{} used {} times", a, b, count);
                assert_eq!(
                    edges.get(&(b, a)),
                    Some(&1),
                    "edge {}->{} has no twin",
                    a,
                    b
                );
            }

            let ring = 2 * (w - 1) + 2 * (h - 1);
            assert_eq!(mesh.vertices.len(), w * h + ring + 1);
            assert_eq!(mesh.triangle_count(), 2 * (w - 1) * (h - 1) + 3 * ring);
        }
    }

    #[test]
    fn test_base_floor_height() {
        let m = model(4, 4);
        let (min_z, max_z) = m.z_range();
        let mesh = SurfaceMesh::with_base(&m, 3.0).unwrap();
        let bounds = mesh.bounds().unwrap();
        assert_relative_eq!(bounds.min[2], min_z - 3.0);
        assert_relative_eq!(bounds.max[2], max_z);
        // Bottom faces point down
        let bottom = mesh.triangles.last().unwrap();
        assert_relative_eq!(mesh.normal(*bottom)[2], -1.0);
        assert!(matches!(
            SurfaceMesh::with_base(&m, 0.0),
            Err(MeshError::InvalidThickness(_))
        ));
    }
}
