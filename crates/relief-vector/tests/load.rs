//! Loading district layers from disk.

use relief_dem::Crs;
use relief_vector::{load_geojson, output_names, VectorError, DEFAULT_NAME_ATTRIBUTE};
use std::fs;
use tempfile::TempDir;

const DISTRICTS: &str = r#"{
    "type": "FeatureCollection",
    "crs": {"type": "name", "properties": {"name": "EPSG:32633"}},
    "features": [
        {
            "type": "Feature",
            "properties": {"shapeName": "Vinohrady"},
            "geometry": {"type": "Polygon", "coordinates": [[
                [458000, 5544000], [459000, 5544000], [459000, 5545000], [458000, 5545000], [458000, 5544000]
            ]]}
        },
        {
            "type": "Feature",
            "properties": {"shapeName": "Vinohrady"},
            "geometry": {"type": "Polygon", "coordinates": [[
                [459000, 5544000], [460000, 5544000], [460000, 5545000], [459000, 5544000]
            ]]}
        },
        {
            "type": "Feature",
            "properties": {"shapeName": null},
            "geometry": {"type": "Polygon", "coordinates": [[
                [460000, 5544000], [461000, 5544000], [461000, 5545000], [460000, 5544000]
            ]]}
        }
    ]
}"#;

#[test]
fn test_load_projected_layer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("districts.geojson");
    fs::write(&path, DISTRICTS).unwrap();

    let layer = load_geojson(&path, DEFAULT_NAME_ATTRIBUTE).unwrap();
    assert_eq!(
        layer.crs,
        Crs::Utm {
            zone: 33,
            north: true
        }
    );
    assert_eq!(layer.len(), 3);
    assert_eq!(
        output_names(&layer),
        vec!["Vinohrady", "Vinohrady_1", "district_2"]
    );

    let geographic = layer.to_crs(&Crs::Geographic).unwrap();
    let bounds = geographic.bounds().unwrap();
    assert!(bounds.min_x > 14.0 && bounds.max_x < 15.0);
    assert!(bounds.min_y > 50.0 && bounds.max_y < 50.1);
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = load_geojson(dir.path().join("nope.geojson"), DEFAULT_NAME_ATTRIBUTE);
    assert!(matches!(result, Err(VectorError::Io(_))));
}
