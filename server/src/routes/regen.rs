use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use realmmap_shared::{MapMode, RegenKind, Rgb, parse_rgb, rgb_string};
use tracing::info;

use super::{error_response, run_blocking, unauthorized};
use crate::config::DataPaths;
use crate::error::MapError;
use crate::queue::QueueStore;
use crate::regen::trigger;
use crate::services::nation_compiler::{NationLock, nation_with_color, read_nation_input};
use crate::state::AppState;

/// Dispatch a regeneration and answer before it runs.
pub async fn regenerate(
    State(state): State<AppState>,
    Path((secret, mode, regen_type)): Path<(String, String, String)>,
) -> Response {
    if !state.authorized(&secret) {
        return unauthorized();
    }
    let mode = match mode.parse::<MapMode>() {
        Ok(mode) => mode,
        Err(e) => return error_response(MapError::from(e)),
    };
    let kind = RegenKind::from_request(&regen_type);

    match trigger(&state, mode, kind) {
        Ok(accepted) => (StatusCode::ACCEPTED, Json(accepted)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Queue an existing nation for the next queued run.
pub async fn enqueue(
    State(state): State<AppState>,
    Path((secret, nation_rgb)): Path<(String, String)>,
) -> Response {
    if !state.authorized(&secret) {
        return unauthorized();
    }
    let Some(rgb) = parse_rgb(&nation_rgb) else {
        return error_response(MapError::MalformedInput(format!(
            "invalid color {nation_rgb:?}, expected r,g,b"
        )));
    };

    let (paths, queue, nations) = (
        state.paths.clone(),
        state.queue.clone(),
        state.nations_lock.clone(),
    );
    match run_blocking(move || queue_nation(&paths, &queue, &nations, rgb)).await {
        Ok(Some((nation, added))) => {
            info!(%nation, added, "nation queued for regeneration");
            Json(serde_json::json!({ "success": true })).into_response()
        }
        Ok(None) => error_response(MapError::MalformedInput(format!(
            "no nation found with color {nation_rgb}"
        ))),
        Err(e) => error_response(e),
    }
}

/// Id of the nation with `rgb` and whether it was newly queued, or None
/// when no nation has that color.
fn queue_nation(
    paths: &DataPaths,
    queue: &QueueStore,
    nations: &NationLock,
    rgb: Rgb,
) -> Result<Option<(String, bool)>, MapError> {
    let records = {
        let _nations = nations.hold();
        read_nation_input(paths)?
    };
    let Some(nation) = nation_with_color(&records, rgb) else {
        return Ok(None);
    };
    let added = queue.enqueue(MapMode::Nation, &rgb_string(rgb))?;
    Ok(Some((nation, added)))
}
