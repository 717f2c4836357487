//! Raster reprojection.
//!
//! Destination cells are filled by inverse mapping: each destination pixel
//! centre is transformed into the source CRS and sampled there.

use crate::crs::Crs;
use crate::mask::ElevationWindow;
use crate::transform::{Bounds, GeoTransform};
use crate::{Raster, Result};
use tracing::debug;

/// Resampling kernel used when reprojecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampling {
    /// Value of the source pixel containing the sample point.
    #[default]
    Nearest,
    /// Bilinear blend of the four surrounding pixel centres; falls back to
    /// nearest when any of them is invalid.
    Bilinear,
}

/// A destination grid: transform, size and CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    /// Pixel to world transform in `crs`.
    pub transform: GeoTransform,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// CRS of the grid.
    pub crs: Crs,
}

/// Choose a destination grid for reprojecting `width` x `height` pixels
/// covering `bounds` from `src_crs` into `dst_crs`.
///
/// Pixels are square and sized so that the grid diagonal keeps the same
/// number of pixels as the source diagonal.
pub fn default_grid(
    bounds: &Bounds,
    width: usize,
    height: usize,
    src_crs: Crs,
    dst_crs: Crs,
) -> Result<GridSpec> {
    let dst_bounds = src_crs.transform_bounds(&dst_crs, bounds)?;

    let src_diagonal = ((width * width + height * height) as f64).sqrt();
    let dst_diagonal = dst_bounds.width().hypot(dst_bounds.height());
    let res = dst_diagonal / src_diagonal;

    let dst_width = ((dst_bounds.width() / res).ceil() as usize).max(1);
    let dst_height = ((dst_bounds.height() / res).ceil() as usize).max(1);

    Ok(GridSpec {
        transform: GeoTransform::new(dst_bounds.min_x, res, dst_bounds.max_y, -res),
        width: dst_width,
        height: dst_height,
        crs: dst_crs,
    })
}

/// Reproject a masked window onto `grid`.
///
/// Cells that map outside the source window or onto invalid source cells
/// are invalid in the result.
pub fn reproject_window(
    window: &ElevationWindow,
    grid: &GridSpec,
    resampling: Resampling,
) -> Result<ElevationWindow> {
    let data = resample(
        |col, row| window.get(col, row),
        &window.transform,
        window.width,
        window.height,
        window.crs,
        grid,
        resampling,
    )?;

    Ok(ElevationWindow {
        data,
        width: grid.width,
        height: grid.height,
        transform: grid.transform,
        crs: grid.crs,
    })
}

/// Reproject a whole raster into `dst_crs`.
///
/// Returns a copy when the raster is already in `dst_crs`. Cells with no
/// source coverage are written as the raster's nodata value (NaN when the
/// raster has none).
pub fn reproject_raster(raster: &Raster, dst_crs: Crs, resampling: Resampling) -> Result<Raster> {
    if raster.crs() == dst_crs {
        debug!(crs = %dst_crs, "Raster already in target CRS, skipping warp");
        return Ok(raster.clone());
    }

    let (width, height) = raster.dimensions();
    let grid = default_grid(&raster.bounds(), width, height, raster.crs(), dst_crs)?;
    let fill = raster.nodata().unwrap_or(f32::NAN);

    let data = resample(
        |col, row| raster.get(col, row),
        raster.transform(),
        width,
        height,
        raster.crs(),
        &grid,
        resampling,
    )?
    .into_iter()
    .map(|v| v.unwrap_or(fill))
    .collect();

    debug!(
        from = %raster.crs(),
        to = %dst_crs,
        width = grid.width,
        height = grid.height,
        "Reprojected raster"
    );

    Raster::from_parts(
        data,
        grid.width,
        grid.height,
        grid.transform,
        dst_crs,
        raster.nodata(),
    )
}

/// Sample a source grid at every destination pixel centre.
///
/// Centres that cannot be transformed into the source CRS are invalid.
fn resample<F>(
    get: F,
    src_transform: &GeoTransform,
    src_width: usize,
    src_height: usize,
    src_crs: Crs,
    grid: &GridSpec,
    resampling: Resampling,
) -> Result<Vec<Option<f32>>>
where
    F: Fn(usize, usize) -> Option<f32>,
{
    let to_source = grid.crs.transformer(&src_crs)?;
    let mut out = Vec::with_capacity(grid.width * grid.height);

    for row in 0..grid.height {
        for col in 0..grid.width {
            let (x, y) = grid
                .transform
                .pixel_to_world(col as f64 + 0.5, row as f64 + 0.5);

            let value = to_source.apply(x, y).ok().and_then(|(sx, sy)| {
                let (fx, fy) = src_transform.world_to_pixel(sx, sy);
                match resampling {
                    Resampling::Nearest => nearest(&get, fx, fy, src_width, src_height),
                    Resampling::Bilinear => bilinear(&get, fx, fy, src_width, src_height)
                        .or_else(|| nearest(&get, fx, fy, src_width, src_height)),
                }
            });
            out.push(value);
        }
    }

    Ok(out)
}

fn nearest<F>(get: &F, fx: f64, fy: f64, width: usize, height: usize) -> Option<f32>
where
    F: Fn(usize, usize) -> Option<f32>,
{
    if fx < 0.0 || fy < 0.0 || fx >= width as f64 || fy >= height as f64 {
        return None;
    }
    get(fx.floor() as usize, fy.floor() as usize)
}

fn bilinear<F>(get: &F, fx: f64, fy: f64, width: usize, height: usize) -> Option<f32>
where
    F: Fn(usize, usize) -> Option<f32>,
{
    if fx < 0.0 || fy < 0.0 || fx >= width as f64 || fy >= height as f64 {
        return None;
    }

    // Interpolate between pixel centres, clamping at the grid edge
    let x = (fx - 0.5).clamp(0.0, (width - 1) as f64);
    let y = (fy - 0.5).clamp(0.0, (height - 1) as f64);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let tx = x - x0 as f64;
    let ty = y - y0 as f64;

    let v00 = get(x0, y0)? as f64;
    let v10 = get(x1, y0)? as f64;
    let v01 = get(x0, y1)? as f64;
    let v11 = get(x1, y1)? as f64;

    let value = v00 * (1.0 - tx) * (1.0 - ty)
        + v10 * tx * (1.0 - ty)
        + v01 * (1.0 - tx) * ty
        + v11 * tx * ty;

    Some(value as f32)
}
