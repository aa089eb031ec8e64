use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::aggregate;
use crate::clients::ClientError;

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub logs: String,
}

#[derive(Debug, Deserialize)]
pub struct DeploymentsQuery {
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub container: Option<String>,
    #[serde(default = "default_tail_lines")]
    pub tail_lines: i64,
}

fn default_tail_lines() -> i64 {
    100
}

fn error_response(e: ClientError) -> Response {
    let status = match &e {
        ClientError::Authorization(_) => StatusCode::FORBIDDEN,
        ClientError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string()).into_response()
}

fn action_ok(message: String) -> Response {
    Json(ActionResponse {
        status: "success".to_string(),
        message,
    })
    .into_response()
}

impl AppState {
    /// Requested namespace, or the configured pin when none is given.
    fn effective_namespace(&self, requested: Option<String>) -> Option<String> {
        requested.or_else(|| self.config.namespace.clone())
    }
}

pub async fn handle_list_deployments(
    State(state): State<AppState>,
    Query(query): Query<DeploymentsQuery>,
) -> Response {
    let ns = state.effective_namespace(query.namespace);
    match state.fleet.list_workloads(ns.as_deref()).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_list_games(State(state): State<AppState>) -> Response {
    let ns = state.effective_namespace(None);
    match state.fleet.list_workloads(ns.as_deref()).await {
        Ok(records) => Json(aggregate::summarize_games(&records)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_game_instances(
    State(state): State<AppState>,
    Path(game): Path<String>,
) -> Response {
    let ns = state.effective_namespace(None);
    match state.fleet.list_workloads(ns.as_deref()).await {
        Ok(records) => Json(aggregate::list_instances(&records, &game)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_start_deployment(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    match state.fleet.scale(&namespace, &name, 1).await {
        Ok(message) => action_ok(message),
        Err(e) => error_response(e),
    }
}

pub async fn handle_stop_deployment(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    match state.fleet.scale(&namespace, &name, 0).await {
        Ok(message) => action_ok(message),
        Err(e) => error_response(e),
    }
}

pub async fn handle_restart_deployment(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    match state.fleet.restart(&namespace, &name).await {
        Ok(message) => action_ok(message),
        Err(e) => error_response(e),
    }
}

pub async fn handle_deployment_pods(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    match state.fleet.list_pods(&namespace, &name).await {
        Ok(pods) => Json(pods).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_pod_logs(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Query(query): Query<LogsQuery>,
) -> Response {
    match state
        .fleet
        .get_logs(&namespace, &name, query.container.as_deref(), query.tail_lines)
        .await
    {
        Ok(logs) => Json(LogResponse { logs }).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_healthz() -> &'static str {
    "ok\n"
}
