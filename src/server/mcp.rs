//! Streamable HTTP transport for MCP on `/mcp`.
//!
//! # POST /mcp
//!
//! Checked in order, each failure ending the request:
//!
//! 1. bearer authentication (401)
//! 2. `MCP-Protocol-Version` header, if present, must be supported (400, -32600)
//! 3. `Mcp-Session-Id` header, if present, must name a live session owned by
//!    the same principal (404)
//! 4. body must be JSON (400, -32700)
//! 5. body must be a request, notification, or response (400, -32600)
//!
//! Notifications and responses are acknowledged with 202 and no body.
//! Requests are answered with 200 and a JSON-RPC response carrying the same
//! id. A successful `initialize` outside a session creates one and returns
//! its id in the `Mcp-Session-Id` response header.
//!
//! # GET /mcp
//!
//! Opens the session's SSE stream for server-originated notifications.
//!
//! # DELETE /mcp
//!
//! Ends the session (204).

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;

use super::routes::AppState;
use crate::auth::Auth;
use crate::mcp::jsonrpc::{classify, JsonRpcError, JsonRpcMessage, JsonRpcResponse};
use crate::mcp::{McpServer, McpSession, SseTransport, MCP_PROTOCOL_VERSION_HEADER, MCP_SESSION_ID_HEADER};

/// POST /mcp: one JSON-RPC message.
pub(crate) async fn post_mcp(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let auth = match state.authenticator.authenticate(&headers).await {
        Some(auth) => auth,
        None => return unauthorized(),
    };

    if let Err(message) = state
        .protocol
        .resolve(header_str(&headers, MCP_PROTOCOL_VERSION_HEADER))
    {
        return rpc_error(StatusCode::BAD_REQUEST, JsonRpcError::invalid_request(message));
    }

    let session = match lookup_session(&state, &headers, &auth) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(err) => return rpc_error(StatusCode::BAD_REQUEST, JsonRpcError::parse_error(err)),
    };

    let request = match classify(&body) {
        Ok(JsonRpcMessage::Request(request)) => request,
        Ok(JsonRpcMessage::Notification(notification)) => {
            if let Some(session) = &session {
                session.server.handle_notification(&notification).await;
            }
            return StatusCode::ACCEPTED.into_response();
        }
        Ok(JsonRpcMessage::Response(_)) => return StatusCode::ACCEPTED.into_response(),
        Err(message) => {
            return rpc_error(StatusCode::BAD_REQUEST, JsonRpcError::invalid_request(message))
        }
    };

    let server = match &session {
        Some(session) => session.server.clone(),
        None => Arc::new(McpServer::new(
            auth.clone(),
            state.resources.clone(),
            (*state.protocol).clone(),
        )),
    };
    let response = server.handle_request(&request).await;

    let opens_session = session.is_none() && request.method == "initialize" && !response.is_error();
    let mut http_response = Json(response).into_response();
    if opens_session {
        let session = state.sessions.create_session(auth, server);
        if let Ok(value) = HeaderValue::from_str(&session.id) {
            http_response
                .headers_mut()
                .insert(HeaderName::from_static(MCP_SESSION_ID_HEADER), value);
        }
    }
    http_response
}

/// GET /mcp: SSE stream for the session named by `Mcp-Session-Id`.
pub(crate) async fn get_mcp(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let auth = match state.authenticator.authenticate(&headers).await {
        Some(auth) => auth,
        None => return unauthorized(),
    };

    let session = match lookup_session(&state, &headers, &auth) {
        Ok(Some(session)) => session,
        Ok(None) => return missing_session_header(),
        Err(response) => return response,
    };

    let (transport, receiver) = SseTransport::channel();
    if state
        .sessions
        .set_transport(&session.id, Arc::new(transport))
        .is_err()
    {
        return session_not_found();
    }
    tracing::debug!(session_id = %session.id, "Opened MCP event stream");

    let events = ReceiverStream::new(receiver)
        .map(|message| Event::default().event("message").json_data(message));
    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}

/// DELETE /mcp: end the session named by `Mcp-Session-Id`.
pub(crate) async fn delete_mcp(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let auth = match state.authenticator.authenticate(&headers).await {
        Some(auth) => auth,
        None => return unauthorized(),
    };

    match lookup_session(&state, &headers, &auth) {
        Ok(Some(session)) => {
            state.sessions.delete_session(&session.id);
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(None) => missing_session_header(),
        Err(response) => response,
    }
}

/// `Ok(None)` when no session header was sent.
fn lookup_session(
    state: &AppState,
    headers: &HeaderMap,
    auth: &Auth,
) -> Result<Option<McpSession>, Response> {
    let Some(id) = header_str(headers, MCP_SESSION_ID_HEADER) else {
        return Ok(None);
    };
    match state.sessions.get_session(id) {
        Some(session) if session.auth.principal() == auth.principal() => Ok(Some(session)),
        Some(_) => {
            tracing::warn!(
                session_id = %id,
                principal = %auth.principal(),
                "Session presented by a different principal"
            );
            Err(session_not_found())
        }
        None => Err(session_not_found()),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn rpc_error(status: StatusCode, error: JsonRpcError) -> Response {
    (status, Json(JsonRpcResponse::error(Value::Null, error))).into_response()
}

fn session_not_found() -> Response {
    rpc_error(StatusCode::NOT_FOUND, JsonRpcError::internal("Session not found"))
}

fn missing_session_header() -> Response {
    rpc_error(
        StatusCode::BAD_REQUEST,
        JsonRpcError::invalid_request("Missing Mcp-Session-Id header"),
    )
}

pub(crate) fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({ "error": "Unauthorized" })),
    )
        .into_response()
}
