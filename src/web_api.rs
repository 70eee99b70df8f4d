//! Web API Server
//!
//! HTTP surface over the engine for the surrounding service layer.
//!
//! ## Endpoints
//!
//! - `POST /api/v1/route` — Route a single request (JSON)
//! - `POST /api/v1/workflow` — Run a workflow to a terminal state (JSON)
//! - `GET  /api/v1/workflows` — Snapshot of the workflow table
//! - `GET  /api/v1/workflows/{id}` — Single workflow record
//! - `GET  /health` — Health check with configured backend names

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router as AxumRouter,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::backend::BackendRegistry;
use crate::routing::Router;
use crate::workflow::WorkflowEngine;
use crate::{OrchestraError, RequestContext};

/// Shared state handed to every handler.
pub struct AppState {
    /// The request router.
    pub router: Arc<Router>,
    /// The workflow engine.
    pub engine: Arc<WorkflowEngine>,
    /// The backend registry, for health reporting.
    pub registry: Arc<BackendRegistry>,
}

/// JSON body for `POST /api/v1/route`.
#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    /// Task category to route under.
    pub task_category: String,
    /// The prompt to send.
    pub prompt: String,
    /// Opaque context forwarded to the backend adapter.
    #[serde(default)]
    pub context: RequestContext,
}

/// JSON body for `POST /api/v1/workflow`.
#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    /// Workflow kind: `linear` or `bounded_retry`.
    pub workflow_type: String,
    /// Workflow params (`seed` for linear, `artifact` for bounded retry).
    #[serde(default)]
    pub params: RequestContext,
}

/// JSON body for error responses.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Map engine errors onto HTTP status codes.
///
/// Unknown workflow kinds and unknown backends are 4xx; upstream backend
/// trouble is 502; configuration problems are 500.
fn error_response(err: &OrchestraError) -> Response {
    let status = match err {
        OrchestraError::UnknownWorkflowType(_) | OrchestraError::BackendNotConfigured(_) => {
            StatusCode::BAD_REQUEST
        }
        OrchestraError::BackendInvocation { .. } => StatusCode::BAD_GATEWAY,
        OrchestraError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// Build the axum router over shared state.
pub fn build_router(state: Arc<AppState>) -> AxumRouter {
    AxumRouter::new()
        .route("/api/v1/route", post(handle_route))
        .route("/api/v1/workflow", post(handle_workflow))
        .route("/api/v1/workflows", get(handle_list_workflows))
        .route("/api/v1/workflows/:id", get(handle_get_workflow))
        .route("/health", get(handle_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on `addr` until the listener fails.
///
/// # Errors
///
/// Returns [`OrchestraError::Config`] if the address cannot be bound.
pub async fn serve(state: Arc<AppState>, addr: &str) -> Result<(), OrchestraError> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| OrchestraError::Config(format!("failed to bind {addr}: {e}")))?;
    info!(addr, "web API listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| OrchestraError::Config(format!("server error: {e}")))
}

async fn handle_route(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RouteRequest>,
) -> Response {
    match state
        .router
        .route(&body.task_category, &body.prompt, &body.context)
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn handle_workflow(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WorkflowRequest>,
) -> Response {
    match state.engine.start(&body.workflow_type, &body.params).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn handle_list_workflows(State(state): State<Arc<AppState>>) -> Response {
    Json(state.engine.list()).into_response()
}

async fn handle_get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.engine.get(&id) {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: format!("no workflow with id `{id}`"),
            }),
        )
            .into_response(),
    }
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Response {
    let mut body = HashMap::new();
    body.insert("status".to_string(), serde_json::json!("ok"));
    body.insert(
        "backends".to_string(),
        serde_json::json!(state.registry.names()),
    );
    body.insert(
        "workflows_retained".to_string(),
        serde_json::json!(state.engine.len()),
    );
    Json(body).into_response()
}
