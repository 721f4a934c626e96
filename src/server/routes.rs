//! Axum route handlers for the bridge HTTP front-end.
//!
//! # Routes
//!
//! - `GET  /health`        — Returns `{"status": "ok", "version": ...}`
//! - `GET  /tools`         — Discovery listing of registered tools
//! - `POST /tools/{name}`  — Invoke a tool with a JSON object of arguments
//!
//! Status mapping for invocation errors: 404 for an unknown tool, 400 for
//! a local validation error, 504 for a timeout, 502 for transport
//! failures, 503 when the bridge is shutting down. Provider-reported
//! errors are not interpreted; whatever value the provider published
//! comes back with a 200.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use tower_http::cors::CorsLayer;

use crate::bridge::Bridge;
use crate::error::InvokeError;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// The running bridge.
    pub bridge: Arc<Bridge>,
}

impl AppState {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge }
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/tools", get(list_tools_handler))
        .route("/tools/{name}", post(invoke_tool_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health — liveness probe.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "mqtt-mcp-bridge",
        "tools": state.bridge.registry().len(),
        "pending_calls": state.bridge.pending_calls(),
    }))
}

/// GET /tools — list every registered tool with its parameter schema.
async fn list_tools_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tools: Vec<Value> = state
        .bridge
        .registry()
        .list()
        .into_iter()
        .map(|def| {
            serde_json::json!({
                "name": def.name,
                "description": def.description,
                "parameters": def.params_schema(),
            })
        })
        .collect();
    Json(serde_json::json!({ "tools": tools }))
}

/// POST /tools/{name} — invoke a tool.
///
/// The body must be a JSON object of arguments (use `{}` for none);
/// anything else is a 400 before dispatch.
async fn invoke_tool_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let args: Map<String, Value> = match body {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                format!("arguments must be a JSON object, got: {other}"),
            ))
        }
    };

    match state.bridge.invoke(&name, &args).await {
        Ok(result) => Ok(Json(serde_json::json!({ "result": result }))),
        Err(err) => Err(error_response(status_for(&err), err.to_string())),
    }
}

fn status_for(err: &InvokeError) -> StatusCode {
    match err {
        InvokeError::UnknownTool(_) => StatusCode::NOT_FOUND,
        InvokeError::MissingParameter { .. } => StatusCode::BAD_REQUEST,
        InvokeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        InvokeError::Transport(_) => StatusCode::BAD_GATEWAY,
        InvokeError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_response(status: StatusCode, message: String) -> (StatusCode, Json<Value>) {
    (status, Json(serde_json::json!({ "error": message })))
}
