use anyhow::{Context, Result};
use clap::Parser;
use relief_runner::{
    generate_terrain_models, CrsPolicy, CrsSpec, FeatureOutcome, OutputFormat, ResamplingMethod,
    TerrainConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Generate a 3D-printable STL terrain model for every district polygon.
#[derive(Parser, Debug)]
#[command(name = "relief", version)]
struct Args {
    /// District polygons (GeoJSON).
    districts: PathBuf,

    /// Elevation raster (GeoTIFF).
    dem: PathBuf,

    /// Directory receiving one STL file per district.
    #[arg(short, long, default_value = "stl_districts")]
    output: PathBuf,

    /// YAML run configuration; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Vertical exaggeration factor.
    #[arg(short, long)]
    exaggeration: Option<f64>,

    /// Longest planar side of each model in millimetres.
    #[arg(short = 's', long)]
    target_size: Option<f64>,

    /// Working CRS, as an EPSG code or name (e.g. 32633 or EPSG:32633).
    #[arg(short, long)]
    crs: Option<CrsSpec>,

    /// How the raster is reprojected when it is not in the working CRS.
    #[arg(long, value_enum)]
    policy: Option<CrsPolicy>,

    /// Resampling kernel for reprojection.
    #[arg(long, value_enum)]
    resampling: Option<ResamplingMethod>,

    /// Feature attribute holding the district name.
    #[arg(long)]
    name_attribute: Option<String>,

    /// Close each model with a flat base of this thickness (mm).
    #[arg(long)]
    base: Option<f64>,

    /// Write ASCII STL instead of binary.
    #[arg(long, default_value_t = false)]
    ascii: bool,

    /// Process districts one at a time.
    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// External program used to warp the whole raster.
    #[arg(long)]
    warp_command: Option<String>,

    /// Write the run summary as JSON to this file.
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

impl Args {
    fn terrain_config(&self) -> Result<TerrainConfig> {
        let mut config = match &self.config {
            Some(path) => TerrainConfig::from_yaml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => TerrainConfig::default(),
        };

        if let Some(v) = self.exaggeration {
            config.vertical_exaggeration = v;
        }
        if let Some(v) = self.target_size {
            config.target_size_mm = v;
        }
        if let Some(crs) = &self.crs {
            config.target_crs = Some(crs.clone());
        }
        if let Some(policy) = self.policy {
            config.crs_policy = policy;
        }
        if let Some(resampling) = self.resampling {
            config.resampling = resampling;
        }
        if let Some(name) = &self.name_attribute {
            config.name_attribute = name.clone();
        }
        if self.base.is_some() {
            config.base_thickness_mm = self.base;
        }
        if self.ascii {
            config.stl_format = OutputFormat::Ascii;
        }
        if self.sequential {
            config.parallel = false;
        }
        if let Some(cmd) = &self.warp_command {
            config.warp_command = Some(cmd.clone());
        }
        Ok(config)
    }
}

fn run(args: &Args) -> Result<bool> {
    let config = args.terrain_config()?;
    let summary = generate_terrain_models(&args.districts, &args.dem, &args.output, &config)
        .context("terrain generation failed")?;

    for report in &summary.reports {
        match &report.outcome {
            FeatureOutcome::Written { path, triangles } => println!(
                "{:>4}  ok      {:<32} {} ({} triangles)",
                report.index,
                report.name,
                path.display(),
                triangles
            ),
            FeatureOutcome::Failed { reason } => println!(
                "{:>4}  FAILED  {:<32} {}",
                report.index, report.name, reason
            ),
        }
    }
    println!(
        "{} written, {} failed ({})",
        summary.written().count(),
        summary.failures().count(),
        summary.crs
    );

    if let Some(path) = &args.summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    Ok(summary.is_complete())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        // Some districts were skipped; models for the rest were written
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
