pub mod api;
pub mod claims;
pub mod regen;

use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::config::DataPaths;
use crate::error::MapError;
use crate::render::{raster, sample_province};
use crate::store::ProvinceIndex;

/// Parse an `x,y` path segment.
pub(crate) fn parse_coords(raw: &str) -> Option<(u32, u32)> {
    let (x, y) = raw.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

pub(crate) fn error_status(err: &MapError) -> StatusCode {
    match err {
        MapError::MalformedInput(_) | MapError::UnknownMode(_) | MapError::OutOfBounds { .. } => {
            StatusCode::BAD_REQUEST
        }
        MapError::Busy => StatusCode::TOO_MANY_REQUESTS,
        MapError::Io(_) | MapError::Image(_) | MapError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// JSON error body with the status `err` maps to. Internal failures are
/// logged and not echoed back in detail.
pub(crate) fn error_response(err: MapError) -> Response {
    let status = error_status(&err);
    let message = if status.is_server_error() {
        error!(error = %err, "request failed");
        "internal error".to_string()
    } else {
        warn!(error = %err, "request rejected");
        err.to_string()
    };
    (
        status,
        Json(serde_json::json!({ "success": false, "message": message })),
    )
        .into_response()
}

pub(crate) fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "success": false, "message": "unauthorized" })),
    )
        .into_response()
}

/// Run filesystem work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, MapError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, MapError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| MapError::Io(std::io::Error::other(e)))?
}

/// Province id under `(x, y)`, read fresh from disk.
pub(crate) async fn sample_at(paths: Arc<DataPaths>, x: u32, y: u32) -> Result<u32, MapError> {
    run_blocking(move || {
        let provinces = ProvinceIndex::load(&paths.provinces_txt())?;
        let source = raster::load_rgba(&paths.province_raster())?;
        sample_province(&source, &provinces, x, y)
    })
    .await
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::{error_status, parse_coords};
    use crate::error::MapError;

    #[test]
    fn coords_need_two_unsigned_parts() {
        assert_eq!(parse_coords("12,40"), Some((12, 40)));
        assert_eq!(parse_coords(" 3 , 4 "), Some((3, 4)));
        assert_eq!(parse_coords("12"), None);
        assert_eq!(parse_coords("-1,4"), None);
        assert_eq!(parse_coords("1,2,3"), None);
        assert_eq!(parse_coords("a,b"), None);
    }

    #[test]
    fn busy_and_bad_input_have_distinct_statuses() {
        assert_eq!(error_status(&MapError::Busy), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            error_status(&MapError::MalformedInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&MapError::OutOfBounds {
                x: 9,
                y: 9,
                width: 1,
                height: 1
            }),
            StatusCode::BAD_REQUEST
        );
    }
}
