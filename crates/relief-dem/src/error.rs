//! Error types for the DEM crate.

use thiserror::Error;

/// Errors that can occur when working with DEM data.
#[derive(Debug, Error)]
pub enum DemError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding or encoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing or malformed georeferencing tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Unsupported data type in the TIFF file.
    #[error("Unsupported TIFF data type: {0}")]
    UnsupportedDataType(String),

    /// The raster carries no usable coordinate reference system.
    #[error("Raster has no coordinate reference system")]
    MissingCrs,

    /// CRS code or identifier that PROJ does not know.
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    /// PROJ could not build a transformation between two reference systems.
    #[error("Cannot transform from {from} to {to}: {reason}")]
    Projection {
        /// Source CRS.
        from: String,
        /// Target CRS.
        to: String,
        /// PROJ's explanation.
        reason: String,
    },

    /// Raster dimensions disagree with the supplied sample buffer.
    #[error("Raster buffer holds {actual} samples, expected {width}x{height}")]
    DimensionMismatch {
        /// Raster width in pixels.
        width: usize,
        /// Raster height in pixels.
        height: usize,
        /// Number of samples supplied.
        actual: usize,
    },

    /// Geometry does not intersect the raster extent.
    #[error("Geometry bounds ({min_x}, {min_y}) - ({max_x}, {max_y}) do not overlap the raster")]
    NoOverlap {
        /// Geometry minimum x.
        min_x: f64,
        /// Geometry minimum y.
        min_y: f64,
        /// Geometry maximum x.
        max_x: f64,
        /// Geometry maximum y.
        max_y: f64,
    },

    /// Geometry has no coordinates to mask with.
    #[error("Geometry is empty")]
    EmptyGeometry,

    /// A transformed coordinate was not finite (outside the projection's domain).
    #[error("Coordinate ({x}, {y}) cannot be transformed from {from} to {to}")]
    TransformFailed {
        /// Source x.
        x: f64,
        /// Source y.
        y: f64,
        /// Source CRS.
        from: String,
        /// Target CRS.
        to: String,
    },
}
