//! Features and feature collections.

use crate::{GeometryError, Result, VectorError};
use geo::{BoundingRect, Coord, MapCoords, MultiPolygon};
use relief_dem::{Bounds, Crs};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

/// Characters that are not allowed in output file stems.
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Device names Windows refuses as file stems, whatever the extension.
const RESERVED_STEMS: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// One district: a (multi)polygon with its attribute record.
#[derive(Debug, Clone)]
pub struct Feature {
    /// Position of the feature in its collection.
    pub index: usize,
    /// Value of the name attribute, if the feature has one.
    pub name: Option<String>,
    /// All attributes of the feature.
    pub properties: Map<String, Value>,
    /// Footprint geometry in the collection's CRS, or why there is none.
    pub geometry: std::result::Result<MultiPolygon<f64>, GeometryError>,
}

impl Feature {
    /// Name attribute, or `district_<index>` when the feature has none.
    pub fn resolved_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| fallback_name(self.index))
    }

    /// Footprint geometry, or a [`VectorError::Geometry`] naming this feature.
    pub fn footprint(&self) -> Result<&MultiPolygon<f64>> {
        self.geometry
            .as_ref()
            .map_err(|source| VectorError::Geometry {
                index: self.index,
                source: source.clone(),
            })
    }

    /// Bounding box of the geometry; `None` when empty or unusable.
    pub fn bounds(&self) -> Option<Bounds> {
        self.geometry
            .as_ref()
            .ok()?
            .bounding_rect()
            .map(Bounds::from)
    }

    /// Geometry transformed from `from` into `to`.
    pub fn geometry_in(&self, from: &Crs, to: &Crs) -> Result<MultiPolygon<f64>> {
        let geometry = self.footprint()?;
        if from == to {
            return Ok(geometry.clone());
        }
        let transform_error = |source| VectorError::Transform {
            index: self.index,
            source,
        };
        let transform = from.transformer(to).map_err(transform_error)?;
        geometry
            .try_map_coords(|c| transform.apply(c.x, c.y).map(|(x, y)| Coord { x, y }))
            .map_err(transform_error)
    }
}

/// An ordered set of features sharing one CRS.
#[derive(Debug, Clone)]
pub struct FeatureCollection {
    /// CRS of every feature geometry.
    pub crs: Crs,
    /// Features in document order.
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Check if the collection has no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Collection reprojected into `target`; a plain copy when already there.
    ///
    /// Features without a usable geometry are carried over unchanged.
    pub fn to_crs(&self, target: &Crs) -> Result<FeatureCollection> {
        if self.crs == *target {
            return Ok(self.clone());
        }

        let features = self
            .features
            .iter()
            .map(|feature| {
                let geometry = match &feature.geometry {
                    Ok(_) => Ok(feature.geometry_in(&self.crs, target)?),
                    Err(e) => Err(e.clone()),
                };
                Ok(Feature {
                    geometry,
                    ..feature.clone()
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            from = %self.crs,
            to = %target,
            features = features.len(),
            "Reprojected feature collection"
        );

        Ok(FeatureCollection {
            crs: *target,
            features,
        })
    }

    /// Bounding box of all features.
    pub fn bounds(&self) -> Option<Bounds> {
        self.features
            .iter()
            .filter_map(Feature::bounds)
            .reduce(|mut acc, b| {
                acc.extend(b.min_x, b.min_y);
                acc.extend(b.max_x, b.max_y);
                acc
            })
    }
}

fn fallback_name(index: usize) -> String {
    format!("district_{}", index)
}

/// Make a feature name safe to use as a file stem.
///
/// Path separators, reserved and control characters become `_`; leading and
/// trailing whitespace and dots are trimmed. Windows device names such as
/// `CON` or `lpt1` get a trailing `_`. Returns `district_<index>` when
/// nothing usable is left.
pub fn sanitize_name(name: &str, index: usize) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_control() || RESERVED_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c.is_whitespace() || c == '.');

    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        fallback_name(index)
    } else if RESERVED_STEMS
        .iter()
        .any(|stem| stem.eq_ignore_ascii_case(trimmed))
    {
        format!("{}_", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// File stems for every feature, in collection order, unique within the run.
///
/// The first feature to claim a stem keeps it; later features resolving to
/// the same stem (compared case-insensitively) get `_<index>` appended.
pub fn output_names(collection: &FeatureCollection) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();

    collection
        .features
        .iter()
        .map(|feature| {
            let mut stem = sanitize_name(&feature.resolved_name(), feature.index);
            while !taken.insert(stem.to_lowercase()) {
                stem = format!("{}_{}", stem, feature.index);
            }
            stem
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::polygon;

    fn feature(index: usize, name: Option<&str>) -> Feature {
        Feature {
            index,
            name: name.map(str::to_string),
            properties: Map::new(),
            geometry: Ok(MultiPolygon::new(vec![polygon![
                (x: 14.0, y: 50.0),
                (x: 14.1, y: 50.0),
                (x: 14.1, y: 50.1),
                (x: 14.0, y: 50.0),
            ]])),
        }
    }

    fn collection(names: &[Option<&str>]) -> FeatureCollection {
        FeatureCollection {
            crs: Crs::Geographic,
            features: names
                .iter()
                .enumerate()
                .map(|(i, n)| feature(i, *n))
                .collect(),
        }
    }

    #[test]
    fn test_resolved_name_fallback() {
        assert_eq!(feature(3, Some("Brno")).resolved_name(), "Brno");
        assert_eq!(feature(3, None).resolved_name(), "district_3");
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Praha 1", 0), "Praha 1");
        assert_eq!(sanitize_name("a/b\\c:d", 0), "a_b_c_d");
        assert_eq!(sanitize_name("  ..hidden.. ", 0), "hidden");
        assert_eq!(sanitize_name("tab\there", 0), "tab_here");
        assert_eq!(sanitize_name("..", 4), "district_4");
        assert_eq!(sanitize_name("///", 5), "district_5");
    }

    #[test]
    fn test_sanitize_windows_device_names() {
        assert_eq!(sanitize_name("CON", 0), "CON_");
        assert_eq!(sanitize_name("nul", 0), "nul_");
        assert_eq!(sanitize_name("Aux", 0), "Aux_");
        assert_eq!(sanitize_name("com7", 0), "com7_");
        assert_eq!(sanitize_name(" LPT9. ", 0), "LPT9_");
        assert_eq!(sanitize_name("COM10", 0), "COM10");
        assert_eq!(sanitize_name("Console", 0), "Console");
        assert_eq!(sanitize_name("PRN 2", 0), "PRN 2");

        let names = output_names(&collection(&[Some("Con"), Some("con")]));
        assert_eq!(names, vec!["Con_", "con__1"]);
    }

    #[test]
    fn test_unusable_geometry_stays_on_its_feature() {
        let mut layer = collection(&[Some("good"), Some("bad")]);
        layer.features[1].geometry = Err(GeometryError::Missing);

        assert_eq!(layer.features[1].bounds(), None);
        assert_eq!(layer.bounds(), layer.features[0].bounds());
        assert!(matches!(
            layer.features[1].footprint(),
            Err(VectorError::Geometry {
                index: 1,
                source: GeometryError::Missing
            })
        ));

        let utm = Crs::Utm {
            zone: 33,
            north: true,
        };
        let projected = layer.to_crs(&utm).unwrap();
        assert!(projected.features[0].geometry.is_ok());
        assert_eq!(projected.features[1].geometry, Err(GeometryError::Missing));
        assert!(projected.features[1]
            .geometry_in(&utm, &Crs::Geographic)
            .is_err());
    }

    #[test]
    fn test_output_names_resolve_collisions() {
        let names = output_names(&collection(&[
            Some("Centre"),
            Some("North"),
            Some("Centre"),
            None,
            Some("centre"),
        ]));
        assert_eq!(
            names,
            vec!["Centre", "North", "Centre_2", "district_3", "centre_4"]
        );
    }

    #[test]
    fn test_output_names_never_collide_with_suffixed_name() {
        let names = output_names(&collection(&[Some("A_2"), Some("A"), Some("A")]));
        assert_eq!(names, vec!["A_2", "A", "A_2_2"]);
    }

    #[test]
    fn test_to_crs_same_is_copy() {
        let layer = collection(&[Some("x")]);
        let same = layer.to_crs(&Crs::Geographic).unwrap();
        assert_eq!(same.features[0].geometry, layer.features[0].geometry);
    }

    #[test]
    fn test_to_crs_projects_every_vertex() {
        let layer = collection(&[Some("x"), None]);
        let utm = Crs::Utm {
            zone: 33,
            north: true,
        };
        let projected = layer.to_crs(&utm).unwrap();
        assert_eq!(projected.crs, utm);
        assert_eq!(projected.len(), 2);
        assert_eq!(projected.features[1].name, None);

        let bounds = projected.features[0].bounds().unwrap();
        // 14 E is one degree west of the zone 33 central meridian
        assert!(bounds.min_x > 420_000.0 && bounds.min_x < 440_000.0);
        assert!(bounds.min_y > 5_530_000.0 && bounds.min_y < 5_550_000.0);

        let back = projected.to_crs(&Crs::Geographic).unwrap();
        let b = back.features[0].bounds().unwrap();
        assert_relative_eq!(b.min_x, 14.0, epsilon = 1e-6);
        assert_relative_eq!(b.max_y, 50.1, epsilon = 1e-6);
    }

    #[test]
    fn test_collection_bounds() {
        let mut layer = collection(&[Some("a")]);
        let mut other = feature(1, None);
        other.geometry = Ok(MultiPolygon::new(vec![polygon![
            (x: 15.0, y: 49.0),
            (x: 15.5, y: 49.0),
            (x: 15.5, y: 49.5),
            (x: 15.0, y: 49.0),
        ]]));
        layer.features.push(other);
        assert_eq!(layer.bounds(), Some(Bounds::new(14.0, 49.0, 15.5, 50.1)));
    }
}
