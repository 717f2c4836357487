//! Example: Print a summary of a DEM GeoTIFF.
//!
//! Usage: cargo run --example inspect_dem -- <dem.tif> [EPSG:code]
//!
//! With a target CRS the raster is also reprojected and the warped grid
//! is reported.

use relief_dem::{reproject_raster, Crs, Raster, Resampling};
use std::env;
use std::time::Instant;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <dem.tif> [EPSG:code]", args[0]);
        eprintln!("Example: {} ./dem.tif EPSG:32633", args[0]);
        std::process::exit(1);
    }

    let start = Instant::now();
    let raster = Raster::from_file(&args[1]).expect("Failed to load DEM");
    let (width, height) = raster.dimensions();
    println!("Loaded {}x{} raster in {:.3}s", width, height, start.elapsed().as_secs_f64());
    print_summary(&raster);

    if let Some(target) = args.get(2) {
        let crs: Crs = target.parse().expect("Invalid CRS");
        let start = Instant::now();
        match reproject_raster(&raster, crs, Resampling::Bilinear) {
            Ok(warped) => {
                println!("\nWarped to {} in {:.3}s", crs, start.elapsed().as_secs_f64());
                print_summary(&warped);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn print_summary(raster: &Raster) {
    let bounds = raster.bounds();
    let (res_x, res_y) = raster.resolution_meters();
    let valid: Vec<f32> = raster
        .data()
        .iter()
        .copied()
        .filter(|v| !raster.is_nodata(*v))
        .collect();

    println!("CRS:        {}", raster.crs());
    println!(
        "Bounds:     x {:.4} to {:.4}, y {:.4} to {:.4}",
        bounds.min_x, bounds.max_x, bounds.min_y, bounds.max_y
    );
    println!("Resolution: {:.2} x {:.2} m", res_x, res_y);
    println!("Nodata:     {:?}", raster.nodata());

    if valid.is_empty() {
        println!("Elevation:  no valid samples");
        return;
    }
    let min = valid.iter().copied().fold(f32::INFINITY, f32::min);
    let max = valid.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    println!(
        "Elevation:  {:.1} to {:.1} m ({} of {} cells valid)",
        min,
        max,
        valid.len(),
        raster.data().len()
    );
}
