use std::path::Path;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let regions = Router::new()
        .fallback_service(ServeDir::new(state.paths.regions_root()))
        .layer(middleware::from_fn(set_region_cache_control));

    let app = Router::new()
        .route("/api/health", get(routes::api::health))
        .route("/api/map/{mode}", get(routes::api::get_map))
        .route("/api/province/{coords}", get(routes::api::get_province))
        .route(
            "/{secret}/api/regenerate/{mode}/{regen_type}",
            get(routes::regen::regenerate),
        )
        .route(
            "/{secret}/api/enqueue/{nation_rgb}",
            post(routes::regen::enqueue),
        )
        .route(
            "/{secret}/api/claim/{nation_rgb}/{coords}",
            get(routes::claims::claim),
        )
        .nest_service("/regions", regions);

    app.layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn set_region_cache_control(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;

    if response.status().is_success()
        && let Some(cache_control) = cache_control_for_path(&path)
    {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(cache_control),
        );
    }

    response
}

/// Region images are rewritten in place on every regeneration, so clients
/// must revalidate. Anything else under the mount is left alone.
fn cache_control_for_path(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension().and_then(|ext| ext.to_str())?;
    if ext.eq_ignore_ascii_case("png") {
        return Some("public, max-age=30, must-revalidate");
    }
    None
}
