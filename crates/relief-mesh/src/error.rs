//! Error types for mesh construction and output.

use thiserror::Error;

/// Errors that can occur when building or writing a terrain mesh.
#[derive(Debug, Error)]
pub enum MeshError {
    /// I/O error writing or reading a mesh file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The elevation grid has no cells.
    #[error("Elevation grid is empty")]
    EmptyGrid,

    /// A grid narrower than two samples on some axis spans no surface.
    #[error("Elevation grid of {width} x {height} samples spans no surface")]
    DegenerateGrid { width: usize, height: usize },

    /// Number of elevations does not match the grid dimensions.
    #[error("Expected {expected} elevations, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An elevation is NaN or infinite.
    #[error("Non-finite elevation at column {col}, row {row}")]
    NonFiniteHeight { col: usize, row: usize },

    /// Pixel size is not a positive finite number.
    #[error("Invalid resolution {x} x {y}")]
    InvalidResolution { x: f64, y: f64 },

    /// Vertical exaggeration is not finite.
    #[error("Invalid vertical exaggeration {0}")]
    InvalidExaggeration(f64),

    /// Target print size is not a positive finite number.
    #[error("Invalid target size {0} mm")]
    InvalidTargetSize(f64),

    /// Base thickness is not a positive finite number.
    #[error("Invalid base thickness {0} mm")]
    InvalidThickness(f64),

    /// The mesh has more triangles or vertices than the format can index.
    #[error("Mesh too large: {0} triangles")]
    TooLarge(usize),

    /// A file that does not hold a binary STL.
    #[error("Invalid STL: {0}")]
    InvalidStl(String),
}
