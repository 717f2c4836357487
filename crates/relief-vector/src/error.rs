//! Error types for vector layer loading.

use relief_dem::DemError;
use thiserror::Error;

/// Errors that can occur when loading or transforming a feature collection.
#[derive(Debug, Error)]
pub enum VectorError {
    /// I/O error reading the layer.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid JSON or does not match the GeoJSON layout.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document's top-level `type` is not a GeoJSON object type.
    #[error("Not a GeoJSON document: {0}")]
    NotGeoJson(String),

    /// A feature has no usable polygon footprint.
    #[error("Feature {index}: {source}")]
    Geometry {
        index: usize,
        #[source]
        source: GeometryError,
    },

    /// The collection's CRS could not be understood.
    #[error("Collection CRS: {0}")]
    Crs(#[from] DemError),

    /// A vertex could not be transformed into the target CRS.
    #[error("Feature {index}: reprojection failed: {source}")]
    Transform {
        index: usize,
        #[source]
        source: DemError,
    },
}

/// Why a single feature has no usable footprint.
///
/// Kept on the feature itself so one bad record does not fail its layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The geometry member is null.
    #[error("missing geometry")]
    Missing,

    /// A geometry other than Polygon or MultiPolygon.
    #[error("unsupported geometry type {0} (expected Polygon or MultiPolygon)")]
    Unsupported(String),

    /// Coordinates that do not form a polygon.
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),
}
