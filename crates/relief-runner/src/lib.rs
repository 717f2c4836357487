//! Terrain model generation.
//!
//! Ties the DEM, district and mesh crates together: given a district layer
//! and a DEM, [`generate_terrain_models`] writes one STL model per district.
//! The same pipeline backs the `relief` command line tool and the
//! `relief-server` HTTP service (see [`server`]).
//!
//! ```no_run
//! use relief_runner::{generate_terrain_models, TerrainConfig};
//!
//! let config = TerrainConfig {
//!     vertical_exaggeration: 5.0,
//!     ..Default::default()
//! };
//! let summary = generate_terrain_models("districts.geojson", "dem.tif", "stl_districts", &config)?;
//! for path in summary.written() {
//!     println!("{}", path.display());
//! }
//! # Ok::<(), relief_runner::TerrainError>(())
//! ```

mod archive;
mod config;
mod error;
mod pipeline;
mod reconcile;
pub mod server;

pub use archive::zip_files;
pub use config::{CrsPolicy, CrsSpec, OutputFormat, ResamplingMethod, TerrainConfig};
pub use error::{FeatureError, TerrainError};
pub use pipeline::{
    generate_terrain_models, process_feature, FeatureOutcome, FeatureOutput, FeatureReport,
    RunSummary,
};
pub use reconcile::{reconcile, ReconciledInputs};

/// Result type for run-level operations.
pub type Result<T> = std::result::Result<T, TerrainError>;
