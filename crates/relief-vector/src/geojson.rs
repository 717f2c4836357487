//! GeoJSON reading.
//!
//! Accepts a FeatureCollection, a single Feature or a bare geometry. Only
//! Polygon and MultiPolygon geometries are supported; a feature with any
//! other or a null geometry is kept with a [`GeometryError`] so the rest of
//! the layer stays usable. The collection CRS is
//! taken from the legacy `crs` member when present; RFC 7946 documents
//! without one are WGS84 longitude/latitude.

use crate::feature::{Feature, FeatureCollection};
use crate::{GeometryError, Result, VectorError};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use relief_dem::Crs;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

// ============================================================================
// JSON Schema Types
// ============================================================================

/// A FeatureCollection document.
#[derive(Debug, Deserialize)]
struct RawCollection {
    #[serde(default)]
    crs: Option<RawCrs>,
    features: Vec<RawFeature>,
}

/// A Feature object.
#[derive(Debug, Deserialize)]
struct RawFeature {
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    crs: Option<RawCrs>,
}

/// A geometry object; coordinates are decoded once the type is known.
#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
    #[serde(default)]
    crs: Option<RawCrs>,
}

/// Legacy named CRS member (`{"type": "name", "properties": {"name": ...}}`).
#[derive(Debug, Deserialize)]
struct RawCrs {
    properties: RawCrsProperties,
}

#[derive(Debug, Deserialize)]
struct RawCrsProperties {
    name: String,
}

type Position = Vec<f64>;
type Ring = Vec<Position>;
type GeometryResult<T> = std::result::Result<T, GeometryError>;

// ============================================================================
// Loading
// ============================================================================

/// Load a GeoJSON file, resolving feature names from `name_attribute`.
pub fn load_geojson<P: AsRef<Path>>(path: P, name_attribute: &str) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let collection = parse_geojson(&text, name_attribute)?;
    debug!(
        path = %path.display(),
        features = collection.features.len(),
        crs = %collection.crs,
        "Loaded feature collection"
    );
    Ok(collection)
}

/// Parse a GeoJSON document, resolving feature names from `name_attribute`.
pub fn parse_geojson(text: &str, name_attribute: &str) -> Result<FeatureCollection> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| VectorError::NotGeoJson("missing \"type\" member".to_string()))?
        .to_string();

    let (crs, raw_features) = match kind.as_str() {
        "FeatureCollection" => {
            let collection: RawCollection = serde_json::from_value(value)?;
            (collection.crs, collection.features)
        }
        "Feature" => {
            let mut feature: RawFeature = serde_json::from_value(value)?;
            // A lone feature may carry the CRS member itself or on its geometry
            let crs = feature
                .crs
                .take()
                .or_else(|| feature.geometry.as_mut().and_then(|g| g.crs.take()));
            (crs, vec![feature])
        }
        "Point" | "MultiPoint" | "LineString" | "MultiLineString" | "Polygon"
        | "MultiPolygon" | "GeometryCollection" => {
            let mut geometry: RawGeometry = serde_json::from_value(value)?;
            let crs = geometry.crs.take();
            let feature = RawFeature {
                geometry: Some(geometry),
                properties: None,
                crs: None,
            };
            (crs, vec![feature])
        }
        other => return Err(VectorError::NotGeoJson(format!("unknown type {}", other))),
    };

    let crs = match crs {
        Some(raw) => Crs::parse(&raw.properties.name)?,
        None => Crs::Geographic,
    };

    let features = raw_features
        .into_iter()
        .enumerate()
        .map(|(index, raw)| convert_feature(index, raw, name_attribute))
        .collect();

    Ok(FeatureCollection { crs, features })
}

fn convert_feature(index: usize, raw: RawFeature, name_attribute: &str) -> Feature {
    let geometry = match raw.geometry {
        Some(geometry) => convert_geometry(geometry),
        None => Err(GeometryError::Missing),
    };
    let properties = raw.properties.unwrap_or_default();
    let name = properties.get(name_attribute).and_then(attribute_text);

    if let Err(e) = &geometry {
        warn!(index, name = ?name, error = %e, "Feature has no usable footprint");
    }

    Feature {
        index,
        name,
        properties,
        geometry,
    }
}

/// Render an attribute value as a name; strings and numbers only.
fn attribute_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn convert_geometry(raw: RawGeometry) -> GeometryResult<MultiPolygon<f64>> {
    let invalid = |e: serde_json::Error| GeometryError::InvalidCoordinates(e.to_string());

    match raw.kind.as_str() {
        "Polygon" => {
            let rings: Vec<Ring> = serde_json::from_value(raw.coordinates).map_err(invalid)?;
            Ok(MultiPolygon::new(vec![convert_polygon(rings)?]))
        }
        "MultiPolygon" => {
            let polygons: Vec<Vec<Ring>> =
                serde_json::from_value(raw.coordinates).map_err(invalid)?;
            let polygons = polygons
                .into_iter()
                .map(convert_polygon)
                .collect::<GeometryResult<Vec<_>>>()?;
            Ok(MultiPolygon::new(polygons))
        }
        other => Err(GeometryError::Unsupported(other.to_string())),
    }
}

fn convert_polygon(rings: Vec<Ring>) -> GeometryResult<Polygon<f64>> {
    let mut rings = rings
        .into_iter()
        .map(convert_ring)
        .collect::<GeometryResult<Vec<_>>>()?;

    if rings.is_empty() {
        return Err(GeometryError::InvalidCoordinates(
            "polygon has no exterior ring".to_string(),
        ));
    }
    let exterior = rings.remove(0);
    Ok(Polygon::new(exterior, rings))
}

fn convert_ring(ring: Ring) -> GeometryResult<LineString<f64>> {
    if ring.len() < 3 {
        return Err(GeometryError::InvalidCoordinates(format!(
            "ring has {} positions, need at least 3",
            ring.len()
        )));
    }

    ring.into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
            _ => Err(GeometryError::InvalidCoordinates(format!(
                "bad position {:?}",
                position
            ))),
        })
        .collect::<GeometryResult<Vec<_>>>()
        .map(LineString::new)
}
