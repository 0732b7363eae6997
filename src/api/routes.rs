//! HTTP routes for submitting pgcopydb jobs and inspecting them.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::error::ApiError;
use crate::jobs::runner::NO_EXECUTION_LOGS;
use crate::jobs::{JobRecord, JobRunner};
use crate::pgcopydb::{
    CloneRequest, CommandBuilder, ConnectionRequest, CopyRequest, DumpRequest,
    FilterTablesRequest, RestoreRequest, TableQueries,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<JobRunner>,
    pub builder: CommandBuilder,
    pub tables: TableQueries,
    /// Reported by the info and health endpoints.
    pub pod_name: String,
}

impl AppState {
    pub fn new(
        runner: Arc<JobRunner>,
        builder: CommandBuilder,
        pod_name: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            tables: TableQueries::new(builder.clone()),
            builder,
            pod_name: pod_name.into(),
        }
    }
}

/// Build the Axum router with all API routes.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/v1", get(api_info))
        .route("/v1/", get(api_info))
        .route("/v1/health", get(health))
        .route("/v1/clone", post(clone_db))
        .route("/v1/dump", post(dump))
        .route("/v1/restore", post(restore))
        .route("/v1/copy", post(copy_db))
        .route("/v1/list-tables", post(list_tables))
        .route("/v1/filter-tables", post(filter_tables))
        .route("/v1/check-status/{job_id}", get(check_status))
        .route("/v1/logs/{job_id}", get(job_logs))
        .route("/v1/execution-logs", get(execution_logs))
        .route("/v1/jobs", get(list_jobs))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Info / Health ───────────────────────────────────────────────────────

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Welcome to pgcopydb API - use /v1 for API endpoints"
    }))
}

async fn api_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "pgcopydb API",
        "version": env!("CARGO_PKG_VERSION"),
        "pod": state.pod_name,
        "endpoints": [
            "/v1/clone", "/v1/dump", "/v1/restore", "/v1/copy",
            "/v1/list-tables", "/v1/filter-tables",
            "/v1/check-status/{job_id}", "/v1/logs/{job_id}",
            "/v1/execution-logs", "/v1/jobs", "/v1/health"
        ],
    }))
}

async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let version = state
        .tables
        .version()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "pgcopydb_version": version,
        "pod": state.pod_name,
    })))
}

// ── Job submission ──────────────────────────────────────────────────────

async fn submit(
    state: &AppState,
    operation: &str,
    command: String,
) -> Result<Json<JobRecord>, ApiError> {
    let record = state.runner.start(command).await?;
    info!(job_id = %record.id, operation, "Job submitted");
    Ok(Json(record))
}

async fn clone_db(
    State(state): State<AppState>,
    Json(body): Json<CloneRequest>,
) -> Result<Json<JobRecord>, ApiError> {
    let command = state.builder.clone_db(&body)?;
    submit(&state, "clone", command).await
}

async fn dump(
    State(state): State<AppState>,
    Json(body): Json<DumpRequest>,
) -> Result<Json<JobRecord>, ApiError> {
    let command = state.builder.dump(&body)?;
    submit(&state, "dump", command).await
}

async fn restore(
    State(state): State<AppState>,
    Json(body): Json<RestoreRequest>,
) -> Result<Json<JobRecord>, ApiError> {
    let command = state.builder.restore(&body)?;
    submit(&state, "restore", command).await
}

async fn copy_db(
    State(state): State<AppState>,
    Json(body): Json<CopyRequest>,
) -> Result<Json<JobRecord>, ApiError> {
    let command = state.builder.copy_db(&body)?;
    submit(&state, "copy", command).await
}

// ── Table listing ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct TableList {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    tables: Vec<String>,
    count: usize,
}

async fn list_tables(
    State(state): State<AppState>,
    Json(body): Json<ConnectionRequest>,
) -> Result<Json<TableList>, ApiError> {
    let tables = state.tables.list(&body).await?;
    Ok(Json(TableList {
        success: true,
        filter: None,
        count: tables.len(),
        tables,
    }))
}

async fn filter_tables(
    State(state): State<AppState>,
    Json(body): Json<FilterTablesRequest>,
) -> Result<Json<TableList>, ApiError> {
    let tables = state.tables.filter(&body).await?;
    Ok(Json(TableList {
        success: true,
        filter: Some(body.filter),
        count: tables.len(),
        tables,
    }))
}

// ── Job queries ─────────────────────────────────────────────────────────

async fn check_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    let record = state.runner.status(&job_id).await;
    record.map(Json).ok_or(ApiError::JobNotFound(job_id))
}

async fn job_logs(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(record) = state.runner.status(&job_id).await else {
        return Err(ApiError::JobNotFound(job_id));
    };
    let logs = state.runner.job_log(&job_id).await.into_text();

    Ok(Json(serde_json::json!({
        "job_id": record.id,
        "status": record.status,
        "command": record.command,
        "finished": record.finished,
        "logs": logs,
    })))
}

async fn execution_logs(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let logs = state
        .runner
        .execution_ledger()
        .await?
        .unwrap_or_else(|| NO_EXECUTION_LOGS.to_string());
    Ok(Json(serde_json::json!({ "logs": logs })))
}

async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.runner.registry().list().await)
}
