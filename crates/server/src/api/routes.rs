use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::{auth_middleware, metrics_middleware};
use super::{handlers, sabnzbd, torznab};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Indexer API, as configured in Lidarr: http://host:port/torznab
    let torznab_routes = Router::new()
        .route("/", get(torznab::api))
        .route("/api", get(torznab::api))
        .route("/download/{guid}", get(torznab::download));

    // Download client API, as configured in Lidarr with URL base /sabnzbd
    let sabnzbd_routes = Router::new().route("/api", get(sabnzbd::api).post(sabnzbd::api));

    let protected = Router::new()
        .nest("/torznab", torznab_routes)
        .nest("/sabnzbd", sabnzbd_routes)
        .route("/api/v1/config", get(handlers::get_config))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    Router::new()
        .merge(protected)
        .route("/api/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
