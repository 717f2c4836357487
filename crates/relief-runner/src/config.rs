//! Run configuration.
//!
//! Loaded from YAML; every field has a default, so an empty file is a valid
//! configuration. Command-line flags override file values.

use crate::{Result, TerrainError};
use clap::ValueEnum;
use relief_dem::{Crs, Resampling};
use relief_mesh::StlFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How raster and vector inputs are brought into one CRS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CrsPolicy {
    /// Leave the raster alone; reproject each feature's masked window.
    #[default]
    PerFeature,
    /// Warp the whole raster once into a scratch GeoTIFF.
    WholeRaster,
    /// Require the raster to already be in the target CRS.
    Strict,
}

/// Resampling kernel for raster reprojection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResamplingMethod {
    #[default]
    Nearest,
    Bilinear,
}

impl From<ResamplingMethod> for Resampling {
    fn from(method: ResamplingMethod) -> Self {
        match method {
            ResamplingMethod::Nearest => Resampling::Nearest,
            ResamplingMethod::Bilinear => Resampling::Bilinear,
        }
    }
}

/// STL flavour for output meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Binary,
    Ascii,
}

impl From<OutputFormat> for StlFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Binary => StlFormat::Binary,
            OutputFormat::Ascii => StlFormat::Ascii,
        }
    }
}

/// A CRS as written in configuration: a bare EPSG code or a name such as
/// `EPSG:32633`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CrsSpec {
    Epsg(u32),
    Name(String),
}

impl CrsSpec {
    /// Resolve to a supported CRS.
    pub fn resolve(&self) -> Result<Crs> {
        match self {
            CrsSpec::Epsg(code) => Crs::from_epsg(*code),
            CrsSpec::Name(name) => Crs::parse(name),
        }
        .map_err(TerrainError::Crs)
    }
}

impl FromStr for CrsSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<u32>() {
            Ok(code) => CrsSpec::Epsg(code),
            Err(_) => CrsSpec::Name(s.to_string()),
        })
    }
}

impl fmt::Display for CrsSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsSpec::Epsg(code) => write!(f, "EPSG:{}", code),
            CrsSpec::Name(name) => f.write_str(name),
        }
    }
}

/// Settings for one terrain generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerrainConfig {
    /// Multiplier applied to elevations before scaling.
    pub vertical_exaggeration: f64,
    /// Length of the longest planar side of every model, in millimetres.
    pub target_size_mm: f64,
    /// CRS to work in; the raster's own CRS when unset.
    pub target_crs: Option<CrsSpec>,
    /// Raster reprojection policy.
    pub crs_policy: CrsPolicy,
    /// Resampling kernel for raster reprojection.
    pub resampling: ResamplingMethod,
    /// Feature attribute holding the district name.
    pub name_attribute: String,
    /// STL flavour.
    pub stl_format: OutputFormat,
    /// Close each model into a solid with a base this thick (mm).
    pub base_thickness_mm: Option<f64>,
    /// External warp program for the whole-raster policy, invoked as
    /// `<command> -t_srs EPSG:<code> <src> <dst>`. Extra words in the
    /// command are passed before those arguments.
    pub warp_command: Option<String>,
    /// Process features on the rayon thread pool.
    pub parallel: bool,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            vertical_exaggeration: 10.0,
            target_size_mm: 180.0,
            target_crs: None,
            crs_policy: CrsPolicy::PerFeature,
            resampling: ResamplingMethod::Nearest,
            name_attribute: relief_vector::DEFAULT_NAME_ATTRIBUTE.to_string(),
            stl_format: OutputFormat::Binary,
            base_thickness_mm: None,
            warp_command: None,
            parallel: true,
        }
    }
}

impl TerrainConfig {
    /// Load a configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TerrainError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Check that all values are usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.vertical_exaggeration.is_finite() && self.vertical_exaggeration > 0.0) {
            return Err(TerrainError::InvalidConfig(format!(
                "vertical_exaggeration must be a positive number, got {}",
                self.vertical_exaggeration
            )));
        }
        if !(self.target_size_mm.is_finite() && self.target_size_mm > 0.0) {
            return Err(TerrainError::InvalidConfig(format!(
                "target_size_mm must be a positive number, got {}",
                self.target_size_mm
            )));
        }
        if let Some(t) = self.base_thickness_mm {
            if !(t.is_finite() && t > 0.0) {
                return Err(TerrainError::InvalidConfig(format!(
                    "base_thickness_mm must be a positive number, got {}",
                    t
                )));
            }
        }
        if self.name_attribute.trim().is_empty() {
            return Err(TerrainError::InvalidConfig(
                "name_attribute must not be empty".to_string(),
            ));
        }
        if let Some(cmd) = &self.warp_command {
            if cmd.split_whitespace().next().is_none() {
                return Err(TerrainError::InvalidConfig(
                    "warp_command must not be empty".to_string(),
                ));
            }
        }
        self.target_crs()?;
        Ok(())
    }

    /// The explicit target CRS, if one is configured.
    pub fn target_crs(&self) -> Result<Option<Crs>> {
        self.target_crs.as_ref().map(CrsSpec::resolve).transpose()
    }
}
