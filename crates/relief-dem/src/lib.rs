//! # relief-dem
//!
//! Elevation rasters for terrain model generation.
//!
//! This crate provides:
//! - [`Raster`]: a single-band GeoTIFF DEM with its affine transform, CRS and
//!   nodata sentinel
//! - [`Crs`]: EPSG coordinate reference systems and PROJ-backed point and
//!   bounds transforms between them ([`CrsTransform`])
//! - [`mask`]: clipping a raster to a (multi)polygon, producing an
//!   [`ElevationWindow`] where cells outside the geometry are invalid
//! - [`reproject_raster`] and [`reproject_window`]: resampling onto a grid in
//!   another CRS
//!
//! ## Example
//!
//! ```no_run
//! use geo::{polygon, MultiPolygon};
//! use relief_dem::{mask, Crs, MaskOptions, Raster};
//!
//! let raster = Raster::from_file("dem.tif")?;
//! println!("DEM is in {} at {:?} m/px", raster.crs(), raster.resolution_meters());
//!
//! let district: MultiPolygon<f64> = MultiPolygon::new(vec![polygon![
//!     (x: 14.40, y: 50.05),
//!     (x: 14.50, y: 50.05),
//!     (x: 14.50, y: 50.12),
//!     (x: 14.40, y: 50.05),
//! ]]);
//! let window = mask(&raster, &district, MaskOptions { all_touched: true, crop: true })?;
//! println!("{} valid cells, lowest {:?}", window.valid_count(), window.valid_min());
//! # let _ = Crs::Geographic;
//! # Ok::<(), relief_dem::DemError>(())
//! ```

mod crs;
mod error;
mod mask;
mod raster;
mod transform;
mod warp;

pub use crs::{meters_per_degree, Crs, CrsTransform, METERS_PER_DEGREE};
pub use error::DemError;
pub use mask::{mask, ElevationWindow, MaskOptions};
pub use raster::Raster;
pub use transform::{Bounds, GeoTransform};
pub use warp::{default_grid, reproject_raster, reproject_window, GridSpec, Resampling};

/// Result type for DEM operations.
pub type Result<T> = std::result::Result<T, DemError>;
