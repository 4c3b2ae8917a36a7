use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use realmmap_shared::{MapMode, ProvinceLookup};
use tracing::warn;

use super::{error_response, parse_coords, sample_at};
use crate::error::MapError;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let last_report = state.last_report.read().await.clone();
    Json(serde_json::json!({
        "status": "ok",
        "regenerating": state.gate.is_running(),
        "privileged_routes_enabled": state.secret.is_some(),
        "publishing_enabled": state.paths.publish_dir.is_some(),
        "last_regeneration": last_report,
    }))
}

/// Serve the most recent composite for a mode.
pub async fn get_map(State(state): State<AppState>, Path(mode): Path<String>) -> Response {
    let mode = match mode.parse::<MapMode>() {
        Ok(mode) => mode,
        Err(e) => return error_response(MapError::from(e)),
    };
    let path = state.paths.full_map(mode);
    match tokio::fs::read(&path).await {
        Ok(data) => png_bytes_response(Bytes::from(data), "no-cache"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(%mode, path = %path.display(), error = %e, "failed to read composite map");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn get_province(State(state): State<AppState>, Path(coords): Path<String>) -> Response {
    let Some((x, y)) = parse_coords(&coords) else {
        return error_response(MapError::MalformedInput(format!(
            "invalid coordinates {coords:?}, expected x,y"
        )));
    };
    match sample_at(state.paths.clone(), x, y).await {
        Ok(province_id) => Json(ProvinceLookup { x, y, province_id }).into_response(),
        Err(e) => error_response(e),
    }
}

fn png_bytes_response(body: Bytes, cache_control: &'static str) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    response
}
