//! Axum routes for the mycelia HTTP server.
//!
//! # Routes
//!
//! - `GET    /health`              Liveness probe
//! - `POST   /mcp`                 MCP JSON-RPC message (see [`super::mcp`])
//! - `GET    /mcp`                 MCP session event stream
//! - `DELETE /mcp`                 End an MCP session
//! - `POST   /api/resource/:code`  Call a resource directly with a typed JSON body

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::mcp::{delete_mcp, get_mcp, post_mcp, unauthorized};
use crate::auth::{AccessLogger, Authenticator, StaticTokenAuthenticator, TracingAccessLogger};
use crate::codec;
use crate::config::GatewayConfig;
use crate::error::AccessError;
use crate::mcp::jsonrpc::JsonRpcNotification;
use crate::mcp::{ProtocolVersions, SessionManager, TOOLS_LIST_CHANGED};
use crate::resource::{Resource, ResourceManager};
use crate::resources::register_builtin;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub resources: Arc<ResourceManager>,
    pub sessions: Arc<SessionManager>,
    pub authenticator: Arc<dyn Authenticator>,
    pub protocol: Arc<ProtocolVersions>,
}

impl AppState {
    /// Empty resource table, default session timeout and protocol versions.
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            resources: Arc::new(ResourceManager::new()),
            sessions: Arc::new(SessionManager::new()),
            authenticator,
            protocol: Arc::new(ProtocolVersions::default()),
        }
    }

    /// State for a configured gateway, with the built-in resources registered.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let access_logger: Arc<dyn AccessLogger> = Arc::new(TracingAccessLogger);
        let authenticator = StaticTokenAuthenticator::from_config(&config.principals, access_logger);
        let state = Self::new(Arc::new(authenticator)).with_protocol(config.protocol.clone());
        register_builtin(&state.resources);
        state
    }

    pub fn with_resources(mut self, resources: Arc<ResourceManager>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_sessions(mut self, sessions: SessionManager) -> Self {
        self.sessions = Arc::new(sessions);
        self
    }

    pub fn with_protocol(mut self, protocol: ProtocolVersions) -> Self {
        self.protocol = Arc::new(protocol);
        self
    }

    /// Register a resource and tell connected MCP clients the tool list changed.
    pub fn register_resource<R: Resource>(&self, resource: R) {
        self.resources.register_resource(resource);
        self.notify_tools_changed();
    }

    /// Unregister a resource; connected MCP clients are told if it existed.
    pub fn unregister_resource(&self, code: &str) -> bool {
        let removed = self.resources.unregister_resource(code).is_some();
        if removed {
            self.notify_tools_changed();
        }
        removed
    }

    fn notify_tools_changed(&self) {
        let message = JsonRpcNotification::new(TOOLS_LIST_CHANGED).to_value();
        let delivered = self.sessions.broadcast(&message);
        tracing::debug!(sessions = delivered, "Broadcast tool list change");
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/mcp", post(post_mcp).get(get_mcp).delete(delete_mcp))
        .route(
            "/api/resource/:code",
            post(resource_handler).fallback(resource_method_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health: liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "mycelia",
    }))
}

/// POST /api/resource/:code: one mediated call.
///
/// The body is the resource input (an empty body means `{}`). Typed values
/// (`$date`, `$oid`) are validated and normalized before authorization.
async fn resource_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, Response> {
    let auth = state
        .authenticator
        .authenticate(&headers)
        .await
        .ok_or_else(unauthorized)?;

    let input: Value = if body.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            error_response(AccessError::Validation(format!("invalid JSON body: {}", e)))
        })?
    };
    let input = codec::normalize(input).map_err(|e| error_response(e.into()))?;

    let gated = auth
        .get_resource(&state.resources, &code)
        .map_err(error_response)?;
    let output = gated.call(input).await.map_err(|err| {
        if let AccessError::Resource(inner) = &err {
            tracing::warn!(resource = %code, error = %inner, "Resource call failed");
        }
        error_response(err)
    })?;

    Ok(Json(output))
}

/// Any other method on /api/resource/:code.
async fn resource_method_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Only POST is supported for resource calls" })),
    )
}

fn error_response(err: AccessError) -> Response {
    let kind = match &err {
        AccessError::Validation(_) => "validation",
        AccessError::Forbidden(_) => "forbidden",
        AccessError::NotFound(_) => "not_found",
        AccessError::Protocol(_) => "protocol",
        AccessError::Resource(_) => "resource",
    };
    (
        err.status_code(),
        Json(json!({ "error": err.to_string(), "kind": kind })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
