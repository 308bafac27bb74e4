//! MCP method dispatch for one session.
//!
//! Supported methods: `initialize`, `ping`, `tools/list`, `tools/call`.
//! Tool calls go through [`crate::auth::Auth::get_resource`], so an MCP
//! client gets exactly the same authorization as a REST caller. Failures
//! inside a tool are reported in the result (`isError: true`), not as
//! JSON-RPC errors.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use super::jsonrpc::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use super::tools::list_tools;
use super::version::ProtocolVersions;
use crate::auth::Auth;
use crate::error::AccessError;
use crate::resource::ResourceManager;

pub const SERVER_NAME: &str = "mycelia";

/// Per-session MCP server state.
#[derive(Debug)]
pub struct McpServer {
    auth: Auth,
    resources: Arc<ResourceManager>,
    versions: ProtocolVersions,
    negotiated_version: Mutex<Option<String>>,
    client_info: Mutex<Option<Value>>,
}

impl McpServer {
    pub fn new(auth: Auth, resources: Arc<ResourceManager>, versions: ProtocolVersions) -> Self {
        Self {
            auth,
            resources,
            versions,
            negotiated_version: Mutex::new(None),
            client_info: Mutex::new(None),
        }
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Version agreed during `initialize`, if it has happened.
    pub fn negotiated_version(&self) -> Option<String> {
        self.negotiated_version.lock().clone()
    }

    pub fn client_info(&self) -> Option<Value> {
        self.client_info.lock().clone()
    }

    /// Answer a request; the response always carries the request's id.
    pub async fn handle_request(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let params = request.params.clone().unwrap_or(Value::Null);
        match self.dispatch(&request.method, params).await {
            Ok(result) => JsonRpcResponse::success(request.id.clone(), result),
            Err(error) => {
                tracing::debug!(
                    method = %request.method,
                    code = error.code,
                    message = %error.message,
                    "MCP request failed"
                );
                JsonRpcResponse::error(request.id.clone(), error)
            }
        }
    }

    /// Notifications are acknowledged and otherwise ignored.
    pub async fn handle_notification(&self, notification: &JsonRpcNotification) {
        tracing::debug!(method = %notification.method, "Received MCP notification");
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, JsonRpcError> {
        match method {
            "initialize" => Ok(self.initialize(&params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list()),
            "tools/call" => self.tools_call(&params).await,
            other => Err(JsonRpcError::internal(format!("Unknown method: {}", other))),
        }
    }

    fn initialize(&self, params: &Value) -> Value {
        let requested = params.get("protocolVersion").and_then(Value::as_str);
        let version = self.versions.negotiate(requested);

        *self.negotiated_version.lock() = Some(version.clone());
        *self.client_info.lock() = params.get("clientInfo").cloned();

        tracing::debug!(
            principal = %self.auth.principal(),
            requested = ?requested,
            negotiated = %version,
            "MCP initialize"
        );

        json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": {"listChanged": true}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": crate::VERSION
            }
        })
    }

    fn tools_list(&self) -> Value {
        json!({ "tools": list_tools(&self.resources) })
    }

    async fn tools_call(&self, params: &Value) -> Result<Value, JsonRpcError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::internal("Tool name is required"))?;
        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        let gated = self
            .auth
            .get_resource(&self.resources, name)
            .map_err(|_| JsonRpcError::method_not_found(format!("Tool '{}' not found", name)))?;

        Ok(match gated.call(arguments).await {
            Ok(output) => tool_result(output_text(&output), false),
            Err(err) => {
                log_tool_failure(name, &err);
                tool_result(format!("Error: {}", err), true)
            }
        })
    }
}

/// String outputs are sent as-is; anything else as serialized JSON.
fn output_text(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn tool_result(text: String, is_error: bool) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error
    })
}

fn log_tool_failure(name: &str, err: &AccessError) {
    if err.is_authorization() {
        tracing::info!(tool = %name, error = %err, "Tool call denied");
    } else {
        tracing::warn!(tool = %name, error = %err, "Tool call failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::jsonrpc::{JsonRpcOutcome, INTERNAL_ERROR, METHOD_NOT_FOUND};
    use crate::policy::Policy;
    use crate::resources::register_builtin;

    fn server(policies: Vec<Policy>) -> McpServer {
        let resources = Arc::new(ResourceManager::new());
        register_builtin(&resources);
        McpServer::new(Auth::new("alice", policies), resources, ProtocolVersions::default())
    }

    fn request(id: Value, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            id,
            method: method.to_string(),
            params: Some(params),
        }
    }

    fn result(response: JsonRpcResponse) -> Value {
        match response.outcome {
            JsonRpcOutcome::Result(value) => value,
            JsonRpcOutcome::Error(err) => panic!("unexpected error: {:?}", err),
        }
    }

    fn error(response: JsonRpcResponse) -> JsonRpcError {
        match response.outcome {
            JsonRpcOutcome::Error(err) => err,
            JsonRpcOutcome::Result(value) => panic!("unexpected result: {}", value),
        }
    }

    #[tokio::test]
    async fn test_initialize_negotiates_version() {
        let server = server(vec![]);
        let response = server
            .handle_request(&request(
                json!(1),
                "initialize",
                json!({"protocolVersion": "2024-11-05", "clientInfo": {"name": "test"}}),
            ))
            .await;
        assert_eq!(response.id, json!(1));
        let result = result(response);
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(server.negotiated_version().as_deref(), Some("2024-11-05"));
        assert_eq!(server.client_info(), Some(json!({"name": "test"})));
    }

    #[tokio::test]
    async fn test_ping() {
        let response = server(vec![]).handle_request(&request(json!("p"), "ping", json!({}))).await;
        assert_eq!(response.id, json!("p"));
        assert_eq!(result(response), json!({}));
    }

    #[tokio::test]
    async fn test_tools_list_is_not_policy_filtered() {
        let response = server(vec![])
            .handle_request(&request(json!(2), "tools/list", json!({})))
            .await;
        let tools = result(response)["tools"].as_array().unwrap().len();
        assert_eq!(tools, 3);
    }

    #[tokio::test]
    async fn test_tools_call_echo() {
        let response = server(vec![Policy::allow("**", "*").unwrap()])
            .handle_request(&request(
                json!(3),
                "tools/call",
                json!({"name": "echo", "arguments": {"message": "hi"}}),
            ))
            .await;
        assert_eq!(
            result(response),
            json!({"content": [{"type": "text", "text": "Echo: hi"}], "isError": false})
        );
    }

    #[tokio::test]
    async fn test_tools_call_structured_output_is_serialized() {
        let response = server(vec![Policy::allow("**", "*").unwrap()])
            .handle_request(&request(
                json!(4),
                "tools/call",
                json!({"name": "docs", "arguments": {"action": "find", "collection": "x"}}),
            ))
            .await;
        assert_eq!(result(response)["content"][0]["text"], "[]");
    }

    #[tokio::test]
    async fn test_tools_call_denied_is_tool_error() {
        let response = server(vec![])
            .handle_request(&request(
                json!(5),
                "tools/call",
                json!({"name": "echo", "arguments": {"message": "hi"}}),
            ))
            .await;
        let result = result(response);
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Error: Access denied"));
    }

    #[tokio::test]
    async fn test_tools_call_validation_is_tool_error() {
        let response = server(vec![Policy::allow("**", "*").unwrap()])
            .handle_request(&request(json!(6), "tools/call", json!({"name": "echo"})))
            .await;
        let result = result(response);
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Error: Validation error"));
    }

    #[tokio::test]
    async fn test_tools_call_errors() {
        let server = server(vec![]);

        let missing_name = error(
            server
                .handle_request(&request(json!(7), "tools/call", json!({})))
                .await,
        );
        assert_eq!(missing_name.code, INTERNAL_ERROR);
        assert_eq!(missing_name.message, "Tool name is required");

        let unknown = error(
            server
                .handle_request(&request(json!(8), "tools/call", json!({"name": "ghost"})))
                .await,
        );
        assert_eq!(unknown.code, METHOD_NOT_FOUND);
        assert!(unknown.message.contains("not found"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let err = error(
            server(vec![])
                .handle_request(&request(json!(9), "resources/list", json!({})))
                .await,
        );
        assert_eq!(err.code, INTERNAL_ERROR);
        assert_eq!(err.message, "Unknown method: resources/list");
    }
}
