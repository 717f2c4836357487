//! # relief-vector
//!
//! District polygon layers for terrain model generation.
//!
//! Layers are read from GeoJSON into [`geo`] geometries. Each [`Feature`]
//! carries its attribute record and an optional name taken from a
//! configurable attribute; features without one are called
//! `district_<index>`. A feature whose geometry is null or not a polygon
//! still loads; its [`GeometryError`] surfaces when the footprint is used.
//! A [`FeatureCollection`] has a single CRS and can be
//! reprojected with [`FeatureCollection::to_crs`].
//!
//! ## Example
//!
//! ```no_run
//! use relief_dem::Crs;
//! use relief_vector::{load_geojson, output_names};
//!
//! let districts = load_geojson("districts.geojson", "shapeName")?;
//! let projected = districts.to_crs(&Crs::from_epsg(32633)?)?;
//! for (feature, stem) in projected.features.iter().zip(output_names(&projected)) {
//!     println!("{} -> {}.stl", feature.resolved_name(), stem);
//! }
//! # Ok::<(), relief_vector::VectorError>(())
//! ```

mod error;
mod feature;
mod geojson;

pub use error::{GeometryError, VectorError};
pub use feature::{output_names, sanitize_name, Feature, FeatureCollection};
pub use geojson::{load_geojson, parse_geojson};

/// Name attribute used when none is configured.
pub const DEFAULT_NAME_ATTRIBUTE: &str = "shapeName";

/// Result type for vector layer operations.
pub type Result<T> = std::result::Result<T, VectorError>;
