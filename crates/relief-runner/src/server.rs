//! HTTP front end.
//!
//! `POST /generate` takes a multipart form with a `geojson` file, a `dem`
//! file and an optional `exaggeration` field, runs the generator in a
//! scratch directory and answers with `terrain.zip`.

use crate::archive::zip_files;
use crate::config::TerrainConfig;
use crate::pipeline::generate_terrain_models;
use crate::TerrainError;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Largest accepted request body; DEM uploads are big.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Errors returned to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (missing parts, bad fields).
    #[error("{0}")]
    BadRequest(String),
    /// Well-formed request whose files cannot be used.
    #[error("{0}")]
    Unprocessable(String),
    /// Server-side failure.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for the error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            info!(status = status.as_u16(), error = %self, "Rejected request");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<TerrainError> for ApiError {
    fn from(e: TerrainError) -> Self {
        if e.is_input_error() {
            ApiError::Unprocessable(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

/// Build the service router around a base configuration.
pub fn router(config: Arc<TerrainConfig>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/generate", post(generate))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(config)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "message": "Terrain STL generator is running" }))
}

async fn generate(
    State(config): State<Arc<TerrainConfig>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut geojson = None;
    let mut dem = None;
    let mut exaggeration = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "geojson" => geojson = Some(field.bytes().await?),
            "dem" => dem = Some(field.bytes().await?),
            "exaggeration" => {
                let text = field.text().await?;
                let value: f64 = text.trim().parse().map_err(|_| {
                    ApiError::BadRequest(format!("exaggeration must be a number, got {:?}", text))
                })?;
                exaggeration = Some(value);
            }
            _ => debug!(field = %name, "Ignoring form field"),
        }
    }

    let geojson = geojson
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing file part \"geojson\"".to_string()))?;
    let dem = dem
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing file part \"dem\"".to_string()))?;

    let mut config = TerrainConfig::clone(&config);
    if let Some(value) = exaggeration {
        config.vertical_exaggeration = value;
    }
    info!(
        geojson_bytes = geojson.len(),
        dem_bytes = dem.len(),
        exaggeration = config.vertical_exaggeration,
        "Generating terrain"
    );

    let archive = tokio::task::spawn_blocking(move || build_archive(&geojson, &dem, &config))
        .await
        .map_err(|e| ApiError::Internal(format!("generation task failed: {}", e)))??;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"terrain.zip\""),
        ],
        archive,
    )
        .into_response())
}

/// Run the generator on uploaded file contents and zip the models.
///
/// All files live in a scratch directory removed before returning.
pub fn build_archive(
    geojson: &[u8],
    dem: &[u8],
    config: &TerrainConfig,
) -> Result<Vec<u8>, ApiError> {
    let internal = |e: std::io::Error| ApiError::Internal(e.to_string());

    let scratch = tempfile::Builder::new()
        .prefix("relief-upload")
        .tempdir()
        .map_err(internal)?;
    let districts_path = scratch.path().join("districts.geojson");
    let dem_path = scratch.path().join("dem.tif");
    fs::write(&districts_path, geojson).map_err(internal)?;
    fs::write(&dem_path, dem).map_err(internal)?;

    let summary = generate_terrain_models(
        &districts_path,
        &dem_path,
        scratch.path().join("stl"),
        config,
    )?;

    if summary.written().next().is_none() {
        let reasons: Vec<String> = summary
            .failures()
            .map(|r| {
                let reason = match &r.outcome {
                    crate::FeatureOutcome::Failed { reason } => reason.as_str(),
                    crate::FeatureOutcome::Written { .. } => "",
                };
                format!("{}: {}", r.name, reason)
            })
            .collect();
        let detail = if reasons.is_empty() {
            "the district layer has no features".to_string()
        } else {
            reasons.join("; ")
        };
        return Err(ApiError::Unprocessable(format!(
            "no models could be generated ({})",
            detail
        )));
    }

    zip_files(summary.written()).map_err(|e| ApiError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_dem::{Crs, GeoTransform, Raster};
    use std::io::Cursor;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn dem_bytes() -> Vec<u8> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dem.tif");
        Raster::from_parts(
            (0..400).map(|i| 100.0 + (i % 20) as f32).collect(),
            20,
            20,
            GeoTransform::new(500_000.0, 10.0, 5_500_200.0, -10.0),
            Crs::Utm {
                zone: 33,
                north: true,
            },
            Some(-9999.0),
        )
        .unwrap()
        .write_geotiff(&path)
        .unwrap();
        fs::read(&path).unwrap()
    }

    const DISTRICTS: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "EPSG:32633"}},
        "features": [
            {"type": "Feature", "properties": {"shapeName": "West"},
             "geometry": {"type": "Polygon", "coordinates": [[[500000, 5500000], [500100, 5500000], [500100, 5500200], [500000, 5500200], [500000, 5500000]]]}},
            {"type": "Feature", "properties": {"shapeName": "East"},
             "geometry": {"type": "Polygon", "coordinates": [[[500100, 5500000], [500200, 5500000], [500200, 5500200], [500100, 5500200], [500100, 5500000]]]}}
        ]
    }"#;

    #[test]
    fn test_build_archive() {
        let config = TerrainConfig {
            parallel: false,
            ..Default::default()
        };
        let bytes = build_archive(DISTRICTS.as_bytes(), &dem_bytes(), &config).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["East.stl", "West.stl"]);
    }

    #[test]
    fn test_unreadable_dem_is_unprocessable() {
        let err = build_archive(DISTRICTS.as_bytes(), b"not a tiff", &TerrainConfig::default())
            .unwrap_err();
        assert!(matches!(err, ApiError::Unprocessable(_)));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_no_coverage_is_unprocessable() {
        let outside = r#"{"type": "Polygon", "crs": {"type": "name", "properties": {"name": "EPSG:32633"}},
            "coordinates": [[[600000, 5500000], [600100, 5500000], [600100, 5500100], [600000, 5500000]]]}"#;
        let err = build_archive(outside.as_bytes(), &dem_bytes(), &TerrainConfig::default())
            .unwrap_err();
        match err {
            ApiError::Unprocessable(detail) => assert!(detail.contains("district_0")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        let fatal = TerrainError::Warp("boom".into());
        assert_eq!(ApiError::from(fatal).status(), StatusCode::INTERNAL_SERVER_ERROR);
        let input = TerrainError::InvalidConfig("bad".into());
        assert_eq!(ApiError::from(input).status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body["message"], "Terrain STL generator is running");
    }
}
