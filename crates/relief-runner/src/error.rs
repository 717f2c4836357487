//! Error types for terrain generation runs.

use relief_dem::{Crs, DemError};
use relief_mesh::MeshError;
use relief_vector::VectorError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole run before any feature is processed.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// A configuration value is out of range.
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for a run configuration.
    #[error("Failed to parse config: {0}")]
    ParseConfig(#[from] serde_yaml::Error),

    /// The DEM could not be opened.
    #[error("Failed to open DEM {path}: {source}")]
    Dem {
        path: PathBuf,
        #[source]
        source: DemError,
    },

    /// The district layer could not be opened.
    #[error("Failed to open districts {path}: {source}")]
    Districts {
        path: PathBuf,
        #[source]
        source: VectorError,
    },

    /// The configured target CRS is not supported.
    #[error("Unsupported target CRS: {0}")]
    Crs(#[source] DemError),

    /// Strict mode: the raster is not in the required CRS.
    #[error("DEM is in {raster} but {target} is required")]
    CrsMismatch { raster: Crs, target: Crs },

    /// The district layer could not be moved into the target CRS.
    #[error("Failed to reproject districts: {0}")]
    VectorReprojection(#[source] VectorError),

    /// Whole-raster reprojection failed.
    #[error("Raster warp failed: {0}")]
    Warp(String),

    /// The output directory cannot be created or written.
    #[error("Output directory {path} is not writable: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TerrainError {
    /// Whether the error is caused by the caller's input files or settings
    /// rather than by the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            TerrainError::InvalidConfig(_)
                | TerrainError::ParseConfig(_)
                | TerrainError::Dem { .. }
                | TerrainError::Districts { .. }
                | TerrainError::Crs(_)
                | TerrainError::CrsMismatch { .. }
                | TerrainError::VectorReprojection(_)
        )
    }
}

/// Errors that fail a single feature; sibling features continue.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// The feature's footprint has no valid elevation samples.
    #[error("no valid elevation data under the feature ({0})")]
    NoCoverage(String),

    /// Masking or resampling the raster failed.
    #[error("masking failed: {0}")]
    Mask(#[from] DemError),

    /// The feature has no usable footprint, or it could not be moved into
    /// the raster CRS.
    #[error("unusable geometry: {0}")]
    Geometry(#[from] VectorError),

    /// Building or writing the mesh failed.
    #[error("mesh generation failed: {0}")]
    Mesh(#[from] MeshError),
}
