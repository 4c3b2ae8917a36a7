use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use realmmap_shared::{ClaimResponse, MapMode, Rgb, parse_rgb, rgb_string};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::{error_response, parse_coords, run_blocking, sample_at, unauthorized};
use crate::config::DataPaths;
use crate::error::MapError;
use crate::queue::QueueStore;
use crate::services::nation_compiler::{
    NationLock, claimant_of, nation_with_color, read_nation_input, write_nation_input,
};
use crate::state::AppState;

#[derive(Debug, PartialEq, Eq)]
enum ClaimOutcome {
    Granted { nation: String },
    AlreadyHeld { holder: String },
}

/// Assign the province under `coords` to the nation with `nation_rgb`,
/// founding a new nation when no nation has that color yet.
pub async fn claim(
    State(state): State<AppState>,
    Path((secret, nation_rgb, coords)): Path<(String, String, String)>,
) -> Response {
    if !state.authorized(&secret) {
        return unauthorized();
    }
    let Some(rgb) = parse_rgb(&nation_rgb) else {
        return error_response(MapError::MalformedInput(format!(
            "invalid color {nation_rgb:?}, expected r,g,b"
        )));
    };
    let Some((x, y)) = parse_coords(&coords) else {
        return error_response(MapError::MalformedInput(format!(
            "invalid coordinates {coords:?}, expected x,y"
        )));
    };

    let province_id = match sample_at(state.paths.clone(), x, y).await {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };
    if province_id == 0 {
        return (StatusCode::NOT_FOUND, Json(ClaimResponse { province_id: 0 })).into_response();
    }

    let (paths, queue, nations) = (
        state.paths.clone(),
        state.queue.clone(),
        state.nations_lock.clone(),
    );
    let outcome =
        run_blocking(move || record_claim(&paths, &queue, &nations, rgb, province_id)).await;
    match outcome {
        Ok(ClaimOutcome::Granted { nation }) => {
            info!(province_id, %nation, x, y, "province claimed");
            Json(ClaimResponse {
                province_id: i64::from(province_id),
            })
            .into_response()
        }
        Ok(ClaimOutcome::AlreadyHeld { holder }) => {
            info!(province_id, %holder, "province already claimed");
            (StatusCode::CONFLICT, Json(ClaimResponse { province_id: -1 })).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Read-modify-write of the nation file under its lock, then queue the
/// claiming nation.
fn record_claim(
    paths: &DataPaths,
    queue: &QueueStore,
    nations: &NationLock,
    rgb: Rgb,
    province_id: u32,
) -> Result<ClaimOutcome, MapError> {
    let _nations = nations.hold();
    let mut records = read_nation_input(paths)?;
    if let Some(holder) = claimant_of(&records, province_id) {
        return Ok(ClaimOutcome::AlreadyHeld { holder });
    }

    let color = rgb_string(rgb);
    let nation =
        nation_with_color(&records, rgb).unwrap_or_else(|| found_nation(&mut records, &color));
    append_province(&mut records, &nation, province_id)?;
    write_nation_input(paths, &records)?;
    if let Err(e) = queue.enqueue(MapMode::Nation, &color) {
        warn!(%nation, error = %e, "claim saved but nation could not be queued");
    }
    Ok(ClaimOutcome::Granted { nation })
}

/// Insert an empty nation under the first free `NATION_<n>` id.
fn found_nation(nations: &mut Map<String, Value>, color: &str) -> String {
    let mut next = nations.len() + 1;
    while nations.contains_key(&format!("NATION_{next}")) {
        next += 1;
    }
    let id = format!("NATION_{next}");
    nations.insert(id.clone(), json!({ "rgb": color, "provinces": [] }));
    info!(nation = %id, rgb = %color, "founded new nation");
    id
}

fn append_province(
    nations: &mut Map<String, Value>,
    nation_id: &str,
    province_id: u32,
) -> Result<(), MapError> {
    let Some(Value::Object(nation)) = nations.get_mut(nation_id) else {
        return Err(MapError::MalformedInput(format!(
            "nation {nation_id} is not a JSON object"
        )));
    };
    match nation.entry("provinces").or_insert_with(|| Value::Array(Vec::new())) {
        Value::Array(provinces) => {
            provinces.push(Value::from(province_id));
            Ok(())
        }
        _ => Err(MapError::MalformedInput(format!(
            "nation {nation_id} has a non-list provinces field"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use realmmap_shared::ClaimResponse;
    use serde_json::{Map, json};
    use tempfile::{TempDir, tempdir};
    use tower::ServiceExt;

    use super::found_nation;
    use crate::config::DataPaths;
    use crate::regen::tests::seed_world;
    use crate::services::nation_compiler::read_nation_input;
    use crate::state::AppState;

    async fn claim(state: &AppState, uri: &str) -> (StatusCode, ClaimResponse) {
        let response = crate::app::build_app(state.clone())
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let body = response.into_body().collect().await.expect("body").to_bytes();
        (status, serde_json::from_slice(&body).expect("claim json"))
    }

    /// Same world as the regeneration fixtures, with province 3 unowned.
    fn state_with_free_province(dir: &TempDir) -> AppState {
        let paths = DataPaths::new(dir.path());
        seed_world(&paths);
        std::fs::write(
            paths.nation_input(),
            json!({"NATION_1": {"rgb": "100,0,0", "provinces": [1, 2], "motto": "hold"}})
                .to_string(),
        )
        .expect("write nations");
        AppState::new(paths, Some("key".to_string()))
    }

    #[tokio::test]
    async fn claim_creates_a_nation_and_queues_it() {
        let dir = tempdir().expect("temp dir");
        let state = state_with_free_province(&dir);

        let (status, body) = claim(&state, "/key/api/claim/0,0,200/5,0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.province_id, 3);

        let nations = read_nation_input(&state.paths).expect("read nations");
        assert_eq!(nations["NATION_2"], json!({"rgb": "0,0,200", "provinces": [3]}));
        assert_eq!(nations["NATION_1"]["motto"], json!("hold"));
        assert_eq!(state.queue.raw().expect("raw")["nation"], vec!["0,0,200".to_string()]);
    }

    #[tokio::test]
    async fn claimed_and_unmapped_provinces_are_rejected() {
        let dir = tempdir().expect("temp dir");
        let state = state_with_free_province(&dir);

        let (status, body) = claim(&state, "/key/api/claim/100,0,0/0,0").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.province_id, -1);

        let (status, body) = claim(&state, "/key/api/claim/100,0,0/4,1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.province_id, 3);
        let nations = read_nation_input(&state.paths).expect("read nations");
        assert_eq!(nations["NATION_1"]["provinces"], json!([1, 2, 3]));

        // Repaint one province pixel in a color no province uses.
        let mut source = image::open(state.paths.province_raster())
            .expect("open raster")
            .to_rgba8();
        source.put_pixel(0, 0, image::Rgba([1, 1, 1, 255]));
        crate::render::raster::save_png(&source, &state.paths.province_raster())
            .expect("save raster");
        let (status, body) = claim(&state, "/key/api/claim/100,0,0/0,0").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.province_id, 0);
    }

    #[test]
    fn new_nation_ids_skip_taken_numbers() {
        let mut nations = Map::new();
        nations.insert("NATION_2".to_string(), json!({"rgb": "1,1,1"}));
        assert_eq!(found_nation(&mut nations, "2,2,2"), "NATION_3");
        assert_eq!(found_nation(&mut nations, "3,3,3"), "NATION_4");
    }
}
