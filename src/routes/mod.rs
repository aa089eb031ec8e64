pub mod api;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/deployments", get(api::handle_list_deployments))
        .route(
            "/api/deployments/{namespace}/{name}/start",
            post(api::handle_start_deployment),
        )
        .route(
            "/api/deployments/{namespace}/{name}/stop",
            post(api::handle_stop_deployment),
        )
        .route(
            "/api/deployments/{namespace}/{name}/restart",
            post(api::handle_restart_deployment),
        )
        .route(
            "/api/deployments/{namespace}/{name}/pods",
            get(api::handle_deployment_pods),
        )
        .route("/api/games", get(api::handle_list_games))
        .route(
            "/api/games/{game}/instances",
            get(api::handle_game_instances),
        )
        .route("/api/pods/{namespace}/{name}/logs", get(api::handle_pod_logs))
        .route("/healthz", get(api::handle_healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
