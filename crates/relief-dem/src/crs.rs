//! Coordinate reference systems and point transforms.
//!
//! A [`Crs`] is an EPSG reference system. The ones elevation data and
//! district boundaries are most often published in have their own variants:
//!
//! - EPSG:4326 (geographic longitude/latitude, also OGC CRS84)
//! - EPSG:3857 (Web Mercator)
//! - EPSG:326zz / EPSG:327zz (UTM zone `zz`, north / south)
//!
//! Any other code PROJ knows (ETRS89 / UTM 33N, Lambert-93, British
//! National Grid, LAEA Europe, ...) is held as [`Crs::Epsg`]. Transforms
//! between any two of them go through PROJ, with coordinates in
//! longitude/latitude (easting/northing) order.

use crate::transform::Bounds;
use crate::{DemError, Result};
use proj::Proj;
use std::fmt;
use tracing::debug;

/// Meters per degree of latitude, used for geographic resolution estimates.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Number of samples taken along each edge when transforming bounds.
const BOUNDS_EDGE_SAMPLES: usize = 21;

/// A coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crs {
    /// WGS84 longitude/latitude in degrees (x = longitude, y = latitude).
    Geographic,
    /// Spherical Web Mercator in meters.
    WebMercator,
    /// Universal Transverse Mercator on WGS84.
    Utm {
        /// Zone number (1-60).
        zone: u8,
        /// Northern hemisphere zone.
        north: bool,
    },
    /// Any other EPSG reference system known to PROJ.
    Epsg {
        /// EPSG code.
        code: u32,
        /// Whether coordinates are longitude/latitude degrees.
        geographic: bool,
    },
}

impl Crs {
    /// Look up a CRS by EPSG code.
    ///
    /// Codes without a dedicated variant are checked against the PROJ
    /// database; unknown codes are an [`DemError::UnsupportedCrs`].
    pub fn from_epsg(code: u32) -> Result<Self> {
        match code {
            4326 => Ok(Crs::Geographic),
            3857 | 900913 => Ok(Crs::WebMercator),
            32601..=32660 => Ok(Crs::Utm {
                zone: (code - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Ok(Crs::Utm {
                zone: (code - 32700) as u8,
                north: false,
            }),
            _ => {
                let geographic = lookup_geographic(code)?;
                Ok(Crs::Epsg { code, geographic })
            }
        }
    }

    /// Parse a CRS identifier.
    ///
    /// Accepts `EPSG:32633`, a bare `32633`, OGC URNs such as
    /// `urn:ogc:def:crs:EPSG::4326` and `urn:ogc:def:crs:OGC:1.3:CRS84`.
    pub fn parse(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        if upper == "CRS84" || upper.ends_with(":CRS84") {
            return Ok(Crs::Geographic);
        }

        let code = if let Some(rest) = upper.strip_prefix("EPSG:") {
            rest
        } else if upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            // Optional version segment: urn:ogc:def:crs:EPSG:6.6:4326
            upper.rsplit(':').next().unwrap_or_default()
        } else {
            upper.as_str()
        };

        code.parse::<u32>()
            .map_err(|_| DemError::UnsupportedCrs(s.trim().to_string()))
            .and_then(Self::from_epsg)
    }

    /// The EPSG code of this CRS.
    pub fn epsg(&self) -> u32 {
        match *self {
            Crs::Geographic => 4326,
            Crs::WebMercator => 3857,
            Crs::Utm { zone, north: true } => 32600 + zone as u32,
            Crs::Utm { zone, north: false } => 32700 + zone as u32,
            Crs::Epsg { code, .. } => code,
        }
    }

    /// Whether coordinates are angular (degrees) rather than linear (meters).
    pub fn is_geographic(&self) -> bool {
        match *self {
            Crs::Geographic => true,
            Crs::Epsg { geographic, .. } => geographic,
            Crs::WebMercator | Crs::Utm { .. } => false,
        }
    }

    /// Transformer from this CRS into `to`, for converting many points.
    pub fn transformer(&self, to: &Crs) -> Result<CrsTransform> {
        CrsTransform::new(*self, *to)
    }

    /// Transform a single point into another CRS.
    pub fn transform_point(&self, to: &Crs, x: f64, y: f64) -> Result<(f64, f64)> {
        if self == to {
            return Ok((x, y));
        }
        self.transformer(to)?.apply(x, y)
    }

    /// Transform a bounding box, sampling along each edge so that curved
    /// edges in the target CRS are fully enclosed.
    pub fn transform_bounds(&self, to: &Crs, bounds: &Bounds) -> Result<Bounds> {
        if self == to {
            return Ok(*bounds);
        }
        self.transformer(to)?.apply_bounds(bounds)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl std::str::FromStr for Crs {
    type Err = DemError;

    fn from_str(s: &str) -> Result<Self> {
        Crs::parse(s)
    }
}

/// A prepared PROJ transformation between two reference systems.
///
/// Building one is far more expensive than applying it, so loops over
/// pixels or vertices create it once. The identity transform holds no PROJ
/// object at all.
pub struct CrsTransform {
    from: Crs,
    to: Crs,
    proj: Option<Proj>,
}

impl CrsTransform {
    /// Prepare the transformation from `from` into `to`.
    pub fn new(from: Crs, to: Crs) -> Result<Self> {
        let proj = if from == to {
            None
        } else {
            let proj = Proj::new_known_crs(&from.to_string(), &to.to_string(), None).map_err(
                |e| DemError::Projection {
                    from: from.to_string(),
                    to: to.to_string(),
                    reason: e.to_string(),
                },
            )?;
            debug!(from = %from, to = %to, "Prepared CRS transform");
            Some(proj)
        };
        Ok(Self { from, to, proj })
    }

    /// Source CRS.
    pub fn source(&self) -> Crs {
        self.from
    }

    /// Target CRS.
    pub fn target(&self) -> Crs {
        self.to
    }

    /// Whether points pass through unchanged.
    pub fn is_identity(&self) -> bool {
        self.proj.is_none()
    }

    /// Transform one point.
    pub fn apply(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let Some(proj) = &self.proj else {
            return Ok((x, y));
        };
        match proj.convert((x, y)) {
            Ok((tx, ty)) if tx.is_finite() && ty.is_finite() => Ok((tx, ty)),
            _ => Err(DemError::TransformFailed {
                x,
                y,
                from: self.from.to_string(),
                to: self.to.to_string(),
            }),
        }
    }

    /// Transform a bounding box by sampling points along its edges.
    pub fn apply_bounds(&self, bounds: &Bounds) -> Result<Bounds> {
        if self.is_identity() {
            return Ok(*bounds);
        }

        let mut out = Bounds::empty();
        let steps = (BOUNDS_EDGE_SAMPLES - 1) as f64;
        for i in 0..BOUNDS_EDGE_SAMPLES {
            let t = i as f64 / steps;
            let x = bounds.min_x + t * bounds.width();
            let y = bounds.min_y + t * bounds.height();
            for (px, py) in [
                (x, bounds.min_y),
                (x, bounds.max_y),
                (bounds.min_x, y),
                (bounds.max_x, y),
            ] {
                let (tx, ty) = self.apply(px, py)?;
                out.extend(tx, ty);
            }
        }
        Ok(out)
    }
}

impl fmt::Debug for CrsTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrsTransform")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Check that PROJ knows `code` and report whether it is a geographic CRS.
fn lookup_geographic(code: u32) -> Result<bool> {
    let definition = format!("EPSG:{}", code);
    let unsupported = |reason: String| DemError::UnsupportedCrs(format!("{} ({})", definition, reason));

    let crs = Proj::new(&definition).map_err(|e| unsupported(e.to_string()))?;
    let projjson = crs
        .to_projjson(None, None, None)
        .map_err(|e| unsupported(e.to_string()))?;
    let description: serde_json::Value =
        serde_json::from_str(&projjson).map_err(|e| unsupported(e.to_string()))?;

    match description["type"].as_str() {
        Some("GeographicCRS") => Ok(true),
        Some("ProjectedCRS") => Ok(false),
        other => Err(unsupported(format!(
            "{} is not a 2D geographic or projected CRS",
            other.unwrap_or("unknown object")
        ))),
    }
}

/// Approximate ground size of one degree at a latitude.
///
/// Returns (meters per degree of longitude, meters per degree of latitude).
pub fn meters_per_degree(lat: f64) -> (f64, f64) {
    (METERS_PER_DEGREE * lat.to_radians().cos(), METERS_PER_DEGREE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_parse_identifiers() {
        assert_eq!(Crs::parse("EPSG:4326").unwrap(), Crs::Geographic);
        assert_eq!(Crs::parse("epsg:3857").unwrap(), Crs::WebMercator);
        assert_eq!(
            Crs::parse("32633").unwrap(),
            Crs::Utm {
                zone: 33,
                north: true
            }
        );
        assert_eq!(
            Crs::parse("urn:ogc:def:crs:EPSG::32718").unwrap(),
            Crs::Utm {
                zone: 18,
                north: false
            }
        );
        assert_eq!(
            Crs::parse("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap(),
            Crs::Geographic
        );
        assert!(Crs::parse("not a crs").is_err());
        assert!(matches!(
            Crs::parse("EPSG:999999"),
            Err(DemError::UnsupportedCrs(_))
        ));
    }

    #[test]
    fn test_national_grids_parse() {
        for (code, geographic) in [
            (25833, false), // ETRS89 / UTM zone 33N
            (2154, false),  // RGF93 / Lambert-93
            (27700, false), // OSGB36 / British National Grid
            (3035, false),  // ETRS89 / LAEA Europe
            (4258, true),   // ETRS89
        ] {
            let crs = Crs::parse(&format!("EPSG:{}", code)).unwrap();
            assert_eq!(crs, Crs::Epsg { code, geographic });
            assert_eq!(crs.epsg(), code);
            assert_eq!(crs.is_geographic(), geographic);
            assert_eq!(crs.to_string(), format!("EPSG:{}", code));
        }
    }

    #[test]
    fn test_epsg_roundtrip() {
        for code in [4326, 3857, 32601, 32660, 32701, 32760, 25833] {
            assert_eq!(Crs::from_epsg(code).unwrap().epsg(), code);
        }
        assert_eq!(Crs::WebMercator.to_string(), "EPSG:3857");
    }

    #[test]
    fn test_web_mercator_known_values() {
        let (x, y) = Crs::Geographic
            .transform_point(&Crs::WebMercator, 180.0, 0.0)
            .unwrap();
        assert_abs_diff_eq!(x, 20_037_508.342_789_244, epsilon = 1e-3);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_utm_central_meridian_on_equator() {
        let utm = Crs::Utm {
            zone: 31,
            north: true,
        };
        let (x, y) = Crs::Geographic.transform_point(&utm, 3.0, 0.0).unwrap();
        assert_abs_diff_eq!(x, 500_000.0, epsilon = 1e-3);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_utm_roundtrip() {
        let cases = [
            (Crs::Utm { zone: 10, north: true }, -122.3321, 47.6062),
            (Crs::Utm { zone: 33, north: true }, 14.42, 50.08),
            (Crs::Utm { zone: 56, north: false }, 151.2093, -33.8688),
        ];
        for (utm, lon, lat) in cases {
            let (x, y) = Crs::Geographic.transform_point(&utm, lon, lat).unwrap();
            let (lon2, lat2) = utm.transform_point(&Crs::Geographic, x, y).unwrap();
            assert_abs_diff_eq!(lon, lon2, epsilon = 1e-6);
            assert_abs_diff_eq!(lat, lat2, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_etrs89_utm_matches_wgs84_utm() {
        // ETRS89 and WGS84 agree to well under a metre for mapping purposes
        let etrs = Crs::from_epsg(25833).unwrap();
        let wgs = Crs::Utm {
            zone: 33,
            north: true,
        };
        let (x, y) = Crs::Geographic.transform_point(&etrs, 14.42, 50.08).unwrap();
        let (x2, y2) = Crs::Geographic.transform_point(&wgs, 14.42, 50.08).unwrap();
        assert_abs_diff_eq!(x, x2, epsilon = 2.0);
        assert_abs_diff_eq!(y, y2, epsilon = 2.0);
    }

    #[test]
    fn test_lambert93_origin() {
        // Lambert-93 places 3 E, 46.5 N at (700000, 6600000)
        let lambert = Crs::from_epsg(2154).unwrap();
        let (x, y) = Crs::Geographic.transform_point(&lambert, 3.0, 46.5).unwrap();
        assert_abs_diff_eq!(x, 700_000.0, epsilon = 1.0);
        assert_abs_diff_eq!(y, 6_600_000.0, epsilon = 1.0);
    }

    #[test]
    fn test_transform_bounds_encloses_corners() {
        let bounds = Bounds::new(14.0, 50.0, 15.0, 51.0);
        let utm = Crs::Utm {
            zone: 33,
            north: true,
        };
        let out = Crs::Geographic.transform_bounds(&utm, &bounds).unwrap();
        let transform = Crs::Geographic.transformer(&utm).unwrap();
        for (lon, lat) in [(14.0, 50.0), (15.0, 50.0), (14.0, 51.0), (15.0, 51.0)] {
            let (x, y) = transform.apply(lon, lat).unwrap();
            assert!(out.contains(x, y));
        }
    }

    #[test]
    fn test_same_crs_is_identity() {
        let (x, y) = Crs::WebMercator
            .transform_point(&Crs::WebMercator, 12.5, -7.25)
            .unwrap();
        assert_eq!((x, y), (12.5, -7.25));
        assert!(Crs::Geographic
            .transformer(&Crs::Geographic)
            .unwrap()
            .is_identity());
    }
}
