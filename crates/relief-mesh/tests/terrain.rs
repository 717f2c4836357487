//! End-to-end mesh construction from elevation samples.

use approx::assert_relative_eq;
use relief_mesh::{read_binary_stl, write_stl, HeightGrid, StlFormat, SurfaceMesh};
use tempfile::TempDir;

/// A 10x10 m window of constant elevation 100 at 1 m pixels.
fn flat_window() -> Vec<f32> {
    vec![100.0; 100]
}

#[test]
fn test_flat_square_scenario() {
    let grid = HeightGrid::from_elevations(&flat_window(), 10, 10, 1.0, 1.0, 2.0).unwrap();
    let model = grid.scaled(100.0).unwrap();
    // The 10 sample lattice spans 9 m
    assert_relative_eq!(model.scale, 100.0 / 9000.0);

    let mesh = SurfaceMesh::triangulate(&model).unwrap();
    let size = mesh.bounds().unwrap().size();
    assert_relative_eq!(size[0], 100.0, epsilon = 1e-9);
    assert_relative_eq!(size[1], 100.0, epsilon = 1e-9);
    // No internal relief
    assert_relative_eq!(size[2], 0.0);
    assert!(mesh.vertices.iter().all(|v| v.iter().all(|c| c.is_finite())));
}

#[test]
fn test_written_stl_keeps_print_size() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ridge.stl");

    // West-east ridge over a 25 x 15 m footprint
    let values: Vec<f32> = (0..6 * 4)
        .map(|i| 200.0 + 10.0 * (3.0 - ((i % 6) as f32 - 2.5).abs()))
        .collect();
    let model = HeightGrid::from_elevations(&values, 6, 4, 5.0, 5.0, 4.0)
        .unwrap()
        .scaled(180.0)
        .unwrap();
    let mesh = SurfaceMesh::with_base(&model, 2.5).unwrap();
    write_stl(&mesh, &path, StlFormat::Binary, "ridge").unwrap();

    let loaded = read_binary_stl(&path).unwrap();
    assert_eq!(loaded.triangle_count(), mesh.triangle_count());
    let size = loaded.bounds().unwrap().size();
    assert_relative_eq!(size[0], 180.0, epsilon = 1e-3);
    assert_relative_eq!(size[1], 108.0, epsilon = 1e-3);
    assert!(size[2] > 2.5);
}
