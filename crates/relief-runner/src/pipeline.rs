//! Terrain model generation: one STL per district.
//!
//! A run validates its configuration, opens both inputs, reconciles their
//! CRS and checks the output directory before touching any feature. After
//! that each feature is processed independently; a failing feature is
//! reported in the [`RunSummary`] and never stops its siblings.

use crate::config::TerrainConfig;
use crate::reconcile::{reconcile, ReconciledInputs};
use crate::{FeatureError, Result, TerrainError};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use relief_dem::{default_grid, mask, reproject_window, DemError, ElevationWindow, MaskOptions};
use relief_mesh::{write_stl, HeightGrid, SurfaceMesh};
use relief_vector::{load_geojson, output_names, Feature};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Result of one feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeatureOutcome {
    /// A mesh was written.
    Written { path: PathBuf, triangles: usize },
    /// The feature was skipped.
    Failed { reason: String },
}

/// Per-feature line of a run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureReport {
    /// Position of the feature in the district layer.
    pub index: usize,
    /// Resolved feature name.
    pub name: String,
    /// What happened to it.
    pub outcome: FeatureOutcome,
}

/// Outcome of a whole run, ordered by feature index.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// CRS the models were built in.
    pub crs: String,
    /// One report per feature.
    pub reports: Vec<FeatureReport>,
}

impl RunSummary {
    /// Paths of all written meshes.
    pub fn written(&self) -> impl Iterator<Item = &Path> {
        self.reports.iter().filter_map(|r| match &r.outcome {
            FeatureOutcome::Written { path, .. } => Some(path.as_path()),
            FeatureOutcome::Failed { .. } => None,
        })
    }

    /// Reports of all failed features.
    pub fn failures(&self) -> impl Iterator<Item = &FeatureReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, FeatureOutcome::Failed { .. }))
    }

    /// Whether every feature produced a mesh.
    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// A successfully written feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureOutput {
    /// Path of the STL file.
    pub path: PathBuf,
    /// Triangles in the mesh.
    pub triangles: usize,
}

/// Generate one STL model per district polygon.
///
/// Fatal problems (bad configuration, unreadable inputs, unsupported CRS,
/// failed warp, unwritable output directory) are returned as errors before
/// any model is written. Per-feature failures are listed in the summary.
pub fn generate_terrain_models(
    districts_path: impl AsRef<Path>,
    dem_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &TerrainConfig,
) -> Result<RunSummary> {
    let districts_path = districts_path.as_ref();
    let dem_path = dem_path.as_ref();
    let output_dir = output_dir.as_ref();
    let start = Instant::now();

    config.validate()?;

    let districts = load_geojson(districts_path, &config.name_attribute).map_err(|source| {
        TerrainError::Districts {
            path: districts_path.to_path_buf(),
            source,
        }
    })?;
    let inputs = reconcile(dem_path, districts, config)?;
    prepare_output_dir(output_dir)?;

    let stems = output_names(&inputs.districts);
    let features: Vec<(&Feature, &String)> = inputs.districts.features.iter().zip(&stems).collect();

    let run = |&(feature, stem): &(&Feature, &String)| {
        let name = feature.resolved_name();
        let outcome = match process_feature(&inputs, feature, stem, output_dir, config) {
            Ok(output) => {
                info!(
                    feature = %name,
                    path = %output.path.display(),
                    triangles = output.triangles,
                    "Wrote model"
                );
                FeatureOutcome::Written {
                    path: output.path,
                    triangles: output.triangles,
                }
            }
            Err(e) => {
                warn!(feature = %name, index = feature.index, error = %e, "Skipped feature");
                FeatureOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        FeatureReport {
            index: feature.index,
            name,
            outcome,
        }
    };

    let reports: Vec<FeatureReport> = if config.parallel {
        features.par_iter().map(run).collect()
    } else {
        features.iter().map(run).collect()
    };

    let summary = RunSummary {
        finished_at: Utc::now(),
        crs: inputs.target_crs.to_string(),
        reports,
    };
    info!(
        written = summary.written().count(),
        failed = summary.failures().count(),
        elapsed_s = start.elapsed().as_secs_f64(),
        "Run complete"
    );

    // Scratch files of a whole-raster warp go away with the inputs
    drop(inputs);
    Ok(summary)
}

/// Create the output directory and check that files can be created in it.
fn prepare_output_dir(dir: &Path) -> Result<()> {
    let output_error = |source| TerrainError::OutputDir {
        path: dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(dir).map_err(output_error)?;
    tempfile::NamedTempFile::new_in(dir).map_err(output_error)?;
    Ok(())
}

/// Mask, repair, grid, scale, triangulate and write one feature.
pub fn process_feature(
    inputs: &ReconciledInputs,
    feature: &Feature,
    stem: &str,
    output_dir: &Path,
    config: &TerrainConfig,
) -> std::result::Result<FeatureOutput, FeatureError> {
    let window = feature_window(inputs, feature, config)?;

    // Invalid cells take the lowest valid elevation of this window
    let fill = window.valid_min().ok_or_else(|| {
        FeatureError::NoCoverage("every cell under the footprint is nodata".to_string())
    })?;
    let values = window.filled(fill);
    let (res_x, res_y) = window.resolution_meters();

    let grid = HeightGrid::from_elevations(
        &values,
        window.width,
        window.height,
        res_x,
        res_y,
        config.vertical_exaggeration,
    )?;
    let model = grid.scaled(config.target_size_mm)?;
    let mesh = match config.base_thickness_mm {
        Some(thickness) => SurfaceMesh::with_base(&model, thickness)?,
        None => SurfaceMesh::triangulate(&model)?,
    };

    let path = output_dir.join(format!("{}.stl", stem));
    write_stl(&mesh, &path, config.stl_format.into(), &feature.resolved_name())?;

    Ok(FeatureOutput {
        path,
        triangles: mesh.triangle_count(),
    })
}

/// Elevation window of a feature on a grid in the target CRS.
fn feature_window(
    inputs: &ReconciledInputs,
    feature: &Feature,
    config: &TerrainConfig,
) -> std::result::Result<ElevationWindow, FeatureError> {
    let raster = &inputs.raster;
    let geometry = feature.footprint()?;

    if !inputs.reproject_per_feature {
        return mask(raster, geometry, MaskOptions::default()).map_err(coverage_error);
    }

    // Mask in the raster CRS, keeping edge pixels for the resampler
    let footprint = feature.geometry_in(&inputs.target_crs, &raster.crs())?;
    let masked = mask(
        raster,
        &footprint,
        MaskOptions {
            all_touched: true,
            crop: true,
        },
    )
    .map_err(coverage_error)?;

    let grid = default_grid(
        &masked.bounds(),
        masked.width,
        masked.height,
        masked.crs,
        inputs.target_crs,
    )?;
    let warped = reproject_window(&masked, &grid, config.resampling.into())?;
    Ok(warped.clip_to(geometry, true))
}

fn coverage_error(e: DemError) -> FeatureError {
    match e {
        DemError::NoOverlap { .. } => {
            FeatureError::NoCoverage("footprint lies outside the DEM extent".to_string())
        }
        DemError::EmptyGeometry => FeatureError::NoCoverage("empty geometry".to_string()),
        other => FeatureError::Mask(other),
    }
}
