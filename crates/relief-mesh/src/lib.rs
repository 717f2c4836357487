//! # relief-mesh
//!
//! Turns elevation grids into printable terrain meshes.
//!
//! - [`HeightGrid`]: a lattice of exaggerated heights in metres, one vertex
//!   per elevation sample
//! - [`ScaledModel`]: the grid uniformly scaled so its longest planar side
//!   matches a print size in millimetres
//! - [`SurfaceMesh`]: the triangulated lattice, optionally closed into a
//!   solid with [`SurfaceMesh::with_base`]
//! - [`write_stl`]: binary or ASCII STL output
//!
//! ## Example
//!
//! ```no_run
//! use relief_mesh::{write_stl, HeightGrid, StlFormat, SurfaceMesh};
//!
//! let elevations = vec![100.0f32; 100];
//! let grid = HeightGrid::from_elevations(&elevations, 10, 10, 1.0, 1.0, 2.0)?;
//! let model = grid.scaled(100.0)?;
//! let mesh = SurfaceMesh::triangulate(&model)?;
//! write_stl(&mesh, "flat.stl", StlFormat::Binary, "flat")?;
//! # Ok::<(), relief_mesh::MeshError>(())
//! ```

mod error;
mod grid;
mod stl;
mod surface;

pub use error::MeshError;
pub use grid::{HeightGrid, ScaledModel};
pub use stl::{read_binary_stl, write_stl, StlFormat};
pub use surface::{MeshBounds, SurfaceMesh};

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;
