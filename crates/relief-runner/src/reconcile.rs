//! CRS reconciliation.
//!
//! Picks the working CRS (the configured target, else the raster's own CRS),
//! reprojects the district layer into it and, depending on the policy,
//! warps the raster. A warped raster lives in a scratch directory that is
//! removed when the [`ReconciledInputs`] are dropped.

use crate::config::{CrsPolicy, TerrainConfig};
use crate::{Result, TerrainError};
use relief_dem::{reproject_raster, Crs, Raster};
use relief_vector::FeatureCollection;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info};

/// File name of the warped raster inside the scratch directory.
const WARPED_FILE_NAME: &str = "dem_reprojected.tif";

/// Raster and districts expressed in one working CRS.
#[derive(Debug)]
pub struct ReconciledInputs {
    /// The raster features are masked against.
    pub raster: Raster,
    /// Districts in `target_crs`.
    pub districts: FeatureCollection,
    /// The working CRS; every output model is measured in it.
    pub target_crs: Crs,
    /// Masked windows must be reprojected from the raster CRS into
    /// `target_crs` feature by feature.
    pub reproject_per_feature: bool,
    /// Holds the warped raster file, if any, until the run ends.
    scratch: Option<TempDir>,
}

impl ReconciledInputs {
    /// Directory holding the warped raster, when the whole raster was warped.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }
}

/// Open the DEM and bring it and `districts` into one CRS.
pub fn reconcile(
    dem_path: &Path,
    districts: FeatureCollection,
    config: &TerrainConfig,
) -> Result<ReconciledInputs> {
    let raster = Raster::from_file(dem_path).map_err(|source| TerrainError::Dem {
        path: dem_path.to_path_buf(),
        source,
    })?;
    let explicit = config.target_crs()?;
    let target_crs = explicit.unwrap_or_else(|| raster.crs());

    info!(
        raster_crs = %raster.crs(),
        vector_crs = %districts.crs,
        target_crs = %target_crs,
        policy = ?config.crs_policy,
        "Reconciling CRS"
    );

    let mut scratch = None;
    let mut reproject_per_feature = false;

    let raster = if raster.crs() == target_crs {
        debug!("Raster already in target CRS");
        raster
    } else {
        match config.crs_policy {
            CrsPolicy::Strict => {
                return Err(TerrainError::CrsMismatch {
                    raster: raster.crs(),
                    target: target_crs,
                });
            }
            CrsPolicy::PerFeature => {
                reproject_per_feature = true;
                raster
            }
            CrsPolicy::WholeRaster => {
                let dir = tempfile::Builder::new()
                    .prefix("relief-warp")
                    .tempdir()
                    .map_err(|e| TerrainError::Warp(format!("cannot create scratch dir: {}", e)))?;
                let warped_path = dir.path().join(WARPED_FILE_NAME);
                let warped = warp_whole_raster(dem_path, &raster, &warped_path, target_crs, config)?;
                scratch = Some(dir);
                warped
            }
        }
    };

    let districts = districts
        .to_crs(&target_crs)
        .map_err(TerrainError::VectorReprojection)?;

    Ok(ReconciledInputs {
        raster,
        districts,
        target_crs,
        reproject_per_feature,
        scratch,
    })
}

/// Warp the raster into `target` at `dst`, then reopen it.
fn warp_whole_raster(
    src_path: &Path,
    raster: &Raster,
    dst: &Path,
    target: Crs,
    config: &TerrainConfig,
) -> Result<Raster> {
    match &config.warp_command {
        Some(command) => run_warp_command(command, src_path, dst, target)?,
        None => {
            let warped = reproject_raster(raster, target, config.resampling.into())
                .map_err(|e| TerrainError::Warp(e.to_string()))?;
            warped
                .write_geotiff(dst)
                .map_err(|e| TerrainError::Warp(e.to_string()))?;
        }
    }

    let warped = Raster::from_file(dst)
        .map_err(|e| TerrainError::Warp(format!("cannot open warped raster: {}", e)))?;
    if warped.crs() != target {
        return Err(TerrainError::Warp(format!(
            "warped raster is in {}, expected {}",
            warped.crs(),
            target
        )));
    }

    info!(path = %dst.display(), crs = %target, "Warped raster");
    Ok(warped)
}

fn run_warp_command(command: &str, src: &Path, dst: &Path, target: Crs) -> Result<()> {
    let mut words = command.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| TerrainError::Warp("empty warp command".to_string()))?;

    debug!(program, target = %target, "Running external warp");
    let output = Command::new(program)
        .args(words)
        .arg("-t_srs")
        .arg(target.to_string())
        .arg(src)
        .arg(dst)
        .output()
        .map_err(|e| TerrainError::Warp(format!("failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TerrainError::Warp(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrsSpec;
    use relief_dem::GeoTransform;
    use relief_vector::parse_geojson;

    const UTM33: Crs = Crs::Utm {
        zone: 33,
        north: true,
    };

    fn write_geographic_dem(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("dem.tif");
        Raster::from_parts(
            vec![300.0; 40 * 40],
            40,
            40,
            GeoTransform::new(14.40, 0.001, 50.10, -0.001),
            Crs::Geographic,
            Some(-9999.0),
        )
        .unwrap()
        .write_geotiff(&path)
        .unwrap();
        path
    }

    fn districts() -> FeatureCollection {
        parse_geojson(
            r#"{"type": "Polygon", "coordinates": [[[14.41, 50.07], [14.43, 50.07], [14.43, 50.09], [14.41, 50.07]]]}"#,
            "shapeName",
        )
        .unwrap()
    }

    fn config(policy: CrsPolicy, target: Option<u32>) -> TerrainConfig {
        TerrainConfig {
            crs_policy: policy,
            target_crs: target.map(CrsSpec::Epsg),
            ..Default::default()
        }
    }

    #[test]
    fn test_raster_crs_is_trusted_without_target() {
        let dir = TempDir::new().unwrap();
        let dem = write_geographic_dem(dir.path());
        for policy in [CrsPolicy::PerFeature, CrsPolicy::WholeRaster, CrsPolicy::Strict] {
            let inputs = reconcile(&dem, districts(), &config(policy, None)).unwrap();
            assert_eq!(inputs.target_crs, Crs::Geographic);
            assert!(!inputs.reproject_per_feature);
            assert!(inputs.scratch_dir().is_none());
        }
    }

    #[test]
    fn test_per_feature_policy_keeps_raster() {
        let dir = TempDir::new().unwrap();
        let dem = write_geographic_dem(dir.path());
        let inputs = reconcile(&dem, districts(), &config(CrsPolicy::PerFeature, Some(32633))).unwrap();
        assert_eq!(inputs.target_crs, UTM33);
        assert_eq!(inputs.raster.crs(), Crs::Geographic);
        assert_eq!(inputs.districts.crs, UTM33);
        assert!(inputs.reproject_per_feature);
    }

    #[test]
    fn test_whole_raster_scratch_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let dem = write_geographic_dem(dir.path());
        let inputs = reconcile(&dem, districts(), &config(CrsPolicy::WholeRaster, Some(32633))).unwrap();
        assert_eq!(inputs.raster.crs(), UTM33);
        assert!(!inputs.reproject_per_feature);

        let scratch = inputs.scratch_dir().unwrap().to_path_buf();
        assert!(scratch.join(WARPED_FILE_NAME).exists());
        drop(inputs);
        assert!(!scratch.exists());
    }

    #[test]
    fn test_strict_policy_rejects_mismatch() {
        let dir = TempDir::new().unwrap();
        let dem = write_geographic_dem(dir.path());
        let err = reconcile(&dem, districts(), &config(CrsPolicy::Strict, Some(32633))).unwrap_err();
        assert!(matches!(
            err,
            TerrainError::CrsMismatch {
                raster: Crs::Geographic,
                target: UTM33
            }
        ));
        let ok = reconcile(&dem, districts(), &config(CrsPolicy::Strict, Some(4326))).unwrap();
        assert_eq!(ok.target_crs, Crs::Geographic);
    }

    #[test]
    fn test_failing_warp_command_is_fatal() {
        let dir = TempDir::new().unwrap();
        let dem = write_geographic_dem(dir.path());
        let config = TerrainConfig {
            warp_command: Some("relief-no-such-warp-tool".to_string()),
            ..config(CrsPolicy::WholeRaster, Some(32633))
        };
        let err = reconcile(&dem, districts(), &config).unwrap_err();
        assert!(matches!(err, TerrainError::Warp(_)));
    }

    #[test]
    fn test_unreadable_dem() {
        let dir = TempDir::new().unwrap();
        let err = reconcile(
            &dir.path().join("missing.tif"),
            districts(),
            &TerrainConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TerrainError::Dem { .. }));
        assert!(err.is_input_error());
    }
}
