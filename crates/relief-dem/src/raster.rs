//! Single-band elevation raster loaded from a GeoTIFF file.

use crate::crs::{meters_per_degree, Crs};
use crate::transform::{Bounds, GeoTransform};
use crate::{DemError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tracing::debug;

/// GeoTIFF ModelPixelScaleTag.
const MODEL_PIXEL_SCALE: u16 = 33550;
/// GeoTIFF ModelTiepointTag.
const MODEL_TIEPOINT: u16 = 33922;
/// GeoTIFF ModelTransformationTag.
const MODEL_TRANSFORMATION: u16 = 34264;
/// GeoTIFF GeoKeyDirectoryTag.
const GEO_KEY_DIRECTORY: u16 = 34735;
/// GDAL_NODATA (ASCII).
const GDAL_NODATA: u16 = 42113;

/// GTModelTypeGeoKey.
const KEY_MODEL_TYPE: u16 = 1024;
/// GTRasterTypeGeoKey.
const KEY_RASTER_TYPE: u16 = 1025;
/// GeographicTypeGeoKey.
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
/// ProjectedCSTypeGeoKey.
const KEY_PROJECTED_TYPE: u16 = 3072;
/// GeoKey value meaning "user defined".
const USER_DEFINED: u16 = 32767;

/// Two samples closer than this are considered equal when testing nodata.
const NODATA_TOLERANCE: f32 = 0.001;

/// An elevation raster: one band of samples on a north-up grid.
///
/// Immutable once opened. Reprojection produces a new raster (see
/// [`crate::reproject_raster`]).
#[derive(Debug, Clone)]
pub struct Raster {
    /// Elevation data in row-major order (north to south, west to east).
    data: Vec<f32>,
    /// Width of the raster in pixels.
    width: usize,
    /// Height of the raster in pixels.
    height: usize,
    /// Pixel to world transform.
    transform: GeoTransform,
    /// Coordinate reference system of the transform.
    crs: Crs,
    /// No-data value (elevations equal to this should be treated as missing).
    nodata: Option<f32>,
}

impl Raster {
    /// Build a raster from its parts, checking that the buffer matches the dimensions.
    pub fn from_parts(
        data: Vec<f32>,
        width: usize,
        height: usize,
        transform: GeoTransform,
        crs: Crs,
        nodata: Option<f32>,
    ) -> Result<Self> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(DemError::DimensionMismatch {
                width,
                height,
                actual: data.len(),
            });
        }

        Ok(Self {
            data,
            width,
            height,
            transform,
            crs,
            nodata,
        })
    }

    /// Load band 1 of a GeoTIFF file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        // Large DEM mosaics easily exceed the default decoder limits
        let mut limits = Limits::default();
        limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
        limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
        limits.ifd_value_size = 1024 * 1024 * 1024;
        decoder = decoder.with_limits(limits);

        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);

        let transform = Self::read_geotransform(&mut decoder)?;
        let crs = Self::read_crs(&mut decoder)?;
        let nodata = Self::read_nodata_value(&mut decoder);
        let samples_per_pixel = decoder
            .get_tag_u32(Tag::SamplesPerPixel)
            .unwrap_or(1)
            .max(1) as usize;

        let samples = Self::decode_elevation_data(&mut decoder)?;
        let data = if samples_per_pixel > 1 {
            // Chunky layout: keep the first sample of every pixel
            samples.into_iter().step_by(samples_per_pixel).collect()
        } else {
            samples
        };

        debug!(
            path = %path.display(),
            width,
            height,
            crs = %crs,
            nodata = ?nodata,
            "Loaded raster"
        );

        Self::from_parts(data, width, height, transform, crs, nodata)
    }

    /// Read the pixel-to-world transform from GeoTIFF tags.
    fn read_geotransform<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
    ) -> Result<GeoTransform> {
        // A full affine matrix takes precedence over tiepoint + scale
        if let Ok(m) = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TRANSFORMATION)) {
            if m.len() >= 8 {
                if m[1] != 0.0 || m[4] != 0.0 {
                    return Err(DemError::InvalidGeoTiff(
                        "rotated ModelTransformation is not supported".to_string(),
                    ));
                }
                return Ok(GeoTransform::new(m[3], m[0], m[7], m[5]));
            }
        }

        let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT));
        let pixel_scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE));

        match (tiepoint, pixel_scale) {
            (Ok(tiepoint), Ok(scale)) if tiepoint.len() >= 6 && scale.len() >= 2 => {
                // Tiepoint format: [i, j, k, x, y, z] where (i,j) is pixel coords and (x,y) is world coords
                let (i, j) = (tiepoint[0], tiepoint[1]);
                let (tie_x, tie_y) = (tiepoint[3], tiepoint[4]);
                let (scale_x, scale_y) = (scale[0], scale[1]);

                Ok(GeoTransform::new(
                    tie_x - i * scale_x,
                    scale_x,
                    tie_y + j * scale_y,
                    -scale_y,
                ))
            }
            _ => Err(DemError::InvalidGeoTiff(
                "missing ModelTiepoint/ModelPixelScale tags".to_string(),
            )),
        }
    }

    /// Read the CRS from the GeoKeyDirectory.
    fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Crs> {
        let directory = decoder
            .get_tag_u16_vec(Tag::Unknown(GEO_KEY_DIRECTORY))
            .map_err(|_| DemError::MissingCrs)?;

        // Header: [version, revision, minor, key count], then [key, location, count, value] entries
        if directory.len() < 4 {
            return Err(DemError::InvalidGeoTiff(
                "truncated GeoKeyDirectory".to_string(),
            ));
        }
        let key_count = directory[3] as usize;
        let lookup = |wanted: u16| {
            directory[4..]
                .chunks_exact(4)
                .take(key_count)
                .find(|entry| entry[0] == wanted && entry[1] == 0)
                .map(|entry| entry[3])
        };

        if let Some(code) = lookup(KEY_PROJECTED_TYPE) {
            if code == USER_DEFINED {
                return Err(DemError::UnsupportedCrs(
                    "user-defined projected CRS".to_string(),
                ));
            }
            return Crs::from_epsg(code as u32);
        }

        if let Some(code) = lookup(KEY_GEOGRAPHIC_TYPE) {
            if code == USER_DEFINED {
                return Err(DemError::UnsupportedCrs(
                    "user-defined geographic CRS".to_string(),
                ));
            }
            return Crs::from_epsg(code as u32);
        }

        Err(DemError::MissingCrs)
    }

    /// Decode elevation data from the TIFF decoder.
    fn decode_elevation_data<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
    ) -> Result<Vec<f32>> {
        let result = decoder.read_image()?;

        match result {
            DecodingResult::F32(data) => Ok(data),
            DecodingResult::F64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        }
    }

    /// Try to read the no-data value from the GDAL_NODATA tag.
    fn read_nodata_value<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
        decoder
            .get_tag_ascii_string(Tag::Unknown(GDAL_NODATA))
            .ok()
            .and_then(|s| s.trim().trim_end_matches('\0').parse().ok())
    }

    /// Write the raster as a single-band 32-bit float GeoTIFF.
    pub fn write_geotiff<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
        let mut image =
            encoder.new_image::<colortype::Gray32Float>(self.width as u32, self.height as u32)?;

        let t = &self.transform;
        let scale = [t.pixel_width, -t.pixel_height, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
        let geokeys = self.geokey_directory();

        image
            .encoder()
            .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])?;
        image
            .encoder()
            .write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])?;
        image
            .encoder()
            .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &geokeys[..])?;
        if let Some(nodata) = self.nodata {
            let text = nodata.to_string();
            image
                .encoder()
                .write_tag(Tag::Unknown(GDAL_NODATA), text.as_str())?;
        }

        image.write_data(&self.data)?;
        debug!(path = %path.display(), crs = %self.crs, "Wrote raster");
        Ok(())
    }

    /// GeoKeyDirectory entries describing this raster's CRS.
    fn geokey_directory(&self) -> Vec<u16> {
        let (model_type, crs_key) = if self.crs.is_geographic() {
            (2, KEY_GEOGRAPHIC_TYPE)
        } else {
            (1, KEY_PROJECTED_TYPE)
        };
        vec![
            1, 1, 0, 3, // version 1.1.0, three keys
            KEY_MODEL_TYPE, 0, 1, model_type,
            KEY_RASTER_TYPE, 0, 1, 1, // RasterPixelIsArea
            crs_key, 0, 1, u16::try_from(self.crs.epsg()).unwrap_or(USER_DEFINED),
        ]
    }

    /// Check if a sample is missing (NaN or equal to the nodata sentinel).
    pub fn is_nodata(&self, value: f32) -> bool {
        if value.is_nan() {
            return true;
        }
        match self.nodata {
            Some(nodata) => value == nodata || (value - nodata).abs() < NODATA_TOLERANCE,
            None => false,
        }
    }

    /// Raw sample at a pixel, or `None` when out of range.
    pub fn value(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.data[row * self.width + col])
    }

    /// Valid elevation at a pixel (`None` for out of range or nodata).
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        self.value(col, row).filter(|v| !self.is_nodata(*v))
    }

    /// Raw samples in row-major order.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Get the dimensions of this raster in pixels.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Pixel to world transform.
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Coordinate reference system.
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// No-data sentinel, if the raster declares one.
    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    /// World bounds of the raster.
    pub fn bounds(&self) -> Bounds {
        self.transform.bounds(self.width, self.height)
    }

    /// Pixel size in CRS units (x, y).
    pub fn resolution(&self) -> (f64, f64) {
        self.transform.resolution()
    }

    /// Approximate pixel size in meters at the center of the raster.
    pub fn resolution_meters(&self) -> (f64, f64) {
        resolution_meters(&self.crs, &self.transform, &self.bounds())
    }
}

/// Pixel size in meters; geographic resolutions are converted at the centre latitude.
pub(crate) fn resolution_meters(crs: &Crs, transform: &GeoTransform, bounds: &Bounds) -> (f64, f64) {
    let (res_x, res_y) = transform.resolution();
    if !crs.is_geographic() {
        return (res_x, res_y);
    }

    let (_, center_lat) = bounds.center();
    let (m_per_deg_lon, m_per_deg_lat) = meters_per_degree(center_lat);
    (res_x * m_per_deg_lon, res_y * m_per_deg_lat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_raster() -> Raster {
        let data = vec![1.0, 2.0, -9999.0, 4.0, 5.0, 6.0];
        Raster::from_parts(
            data,
            3,
            2,
            GeoTransform::new(100.0, 10.0, 200.0, -10.0),
            Crs::WebMercator,
            Some(-9999.0),
        )
        .unwrap()
    }

    #[test]
    fn test_from_parts_checks_dimensions() {
        let result = Raster::from_parts(
            vec![0.0; 5],
            3,
            2,
            GeoTransform::new(0.0, 1.0, 0.0, -1.0),
            Crs::Geographic,
            None,
        );
        assert!(matches!(result, Err(DemError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_sample_and_nodata() {
        let raster = sample_raster();
        assert_eq!(raster.get(0, 0), Some(1.0));
        assert_eq!(raster.get(2, 0), None); // nodata
        assert_eq!(raster.value(2, 0), Some(-9999.0));
        assert_eq!(raster.get(3, 0), None); // out of range
        assert!(raster.is_nodata(f32::NAN));
    }

    #[test]
    fn test_bounds_and_resolution() {
        let raster = sample_raster();
        assert_eq!(raster.bounds(), Bounds::new(100.0, 180.0, 130.0, 200.0));
        assert_eq!(raster.resolution(), (10.0, 10.0));
        assert_eq!(raster.resolution_meters(), (10.0, 10.0));
    }

    #[test]
    fn test_geographic_resolution_meters() {
        let raster = Raster::from_parts(
            vec![0.0; 4],
            2,
            2,
            GeoTransform::new(10.0, 0.001, 61.0, -0.001),
            Crs::Geographic,
            None,
        )
        .unwrap();
        let (mx, my) = raster.resolution_meters();
        assert_relative_eq!(my, 111.32, epsilon = 1e-9);
        // Centre latitude 60.999 degrees
        assert_relative_eq!(mx, 111.32 * 60.999_f64.to_radians().cos(), epsilon = 1e-9);
    }

    #[test]
    fn test_geokey_directory_layout() {
        let raster = sample_raster();
        let keys = raster.geokey_directory();
        assert_eq!(keys.len(), 16);
        assert_eq!(&keys[12..], &[KEY_PROJECTED_TYPE, 0, 1, 3857]);
    }
}
