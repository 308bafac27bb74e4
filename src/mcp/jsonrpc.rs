//! JSON-RPC 2.0 envelopes.
//!
//! Incoming bodies are classified structurally before any method dispatch:
//!
//! | Shape                               | Kind           |
//! |-------------------------------------|----------------|
//! | `method` and `id`                   | request        |
//! | `method`, no `id`                   | notification   |
//! | no `method`, `result` or `error`    | response       |
//! | anything else (arrays included)     | malformed      |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(PARSE_ERROR, format!("Parse error: {}", detail))
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::new(METHOD_NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

/// A call expecting a response with the same `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    pub id: Value,
    pub method: String,
    pub params: Option<Value>,
}

/// A one-way message.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcNotification {
    pub method: String,
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: None,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("jsonrpc".into(), Value::String(JSONRPC_VERSION.into()));
        object.insert("method".into(), Value::String(self.method.clone()));
        if let Some(params) = &self.params {
            object.insert("params".into(), params.clone());
        }
        Value::Object(object)
    }
}

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    /// A response sent by the peer; acknowledged, never answered.
    Response(Value),
}

/// Classify a parsed body. `Err` carries the reason it is malformed.
pub fn classify(body: &Value) -> Result<JsonRpcMessage, String> {
    let object = match body {
        Value::Object(object) => object,
        Value::Array(_) => return Err("Batch requests are not supported".to_string()),
        _ => return Err("Message must be a JSON object".to_string()),
    };

    if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err("Missing or unsupported 'jsonrpc' version".to_string());
    }

    match object.get("method") {
        Some(Value::String(method)) => {
            let params = object.get("params").cloned();
            match object.get("id") {
                None => Ok(JsonRpcMessage::Notification(JsonRpcNotification {
                    method: method.clone(),
                    params,
                })),
                Some(id @ (Value::String(_) | Value::Number(_) | Value::Null)) => {
                    Ok(JsonRpcMessage::Request(JsonRpcRequest {
                        id: id.clone(),
                        method: method.clone(),
                        params,
                    }))
                }
                Some(_) => Err("'id' must be a string, number, or null".to_string()),
            }
        }
        Some(_) => Err("'method' must be a string".to_string()),
        None if object.contains_key("result") || object.contains_key("error") => {
            Ok(JsonRpcMessage::Response(body.clone()))
        }
        None => Err("Message is neither a request, notification, nor response".to_string()),
    }
}

/// Success or error payload of a response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum JsonRpcOutcome {
    #[serde(rename = "result")]
    Result(Value),
    #[serde(rename = "error")]
    Error(JsonRpcError),
}

/// Outbound response envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(flatten)]
    pub outcome: JsonRpcOutcome,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: JsonRpcOutcome::Result(result),
        }
    }

    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: JsonRpcOutcome::Error(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, JsonRpcOutcome::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_request() {
        let message = classify(&json!({"jsonrpc": "2.0", "id": 7, "method": "ping"})).unwrap();
        assert_eq!(
            message,
            JsonRpcMessage::Request(JsonRpcRequest {
                id: json!(7),
                method: "ping".into(),
                params: None
            })
        );
    }

    #[test]
    fn test_classify_notification() {
        let message = classify(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .unwrap();
        assert!(matches!(message, JsonRpcMessage::Notification(n) if n.method == "notifications/initialized"));
    }

    #[test]
    fn test_classify_response() {
        let message = classify(&json!({"jsonrpc": "2.0", "id": 1, "result": {}})).unwrap();
        assert!(matches!(message, JsonRpcMessage::Response(_)));
        let message = classify(&json!({"jsonrpc": "2.0", "id": 1, "error": {"code": 1, "message": "x"}}))
            .unwrap();
        assert!(matches!(message, JsonRpcMessage::Response(_)));
    }

    #[test]
    fn test_classify_malformed() {
        assert!(classify(&json!([{"jsonrpc": "2.0", "method": "ping", "id": 1}])).is_err());
        assert!(classify(&json!("ping")).is_err());
        assert!(classify(&json!({"jsonrpc": "2.0", "id": 1})).is_err());
        assert!(classify(&json!({"jsonrpc": "2.0", "method": 5, "id": 1})).is_err());
        assert!(classify(&json!({"jsonrpc": "2.0", "method": "x", "id": {}})).is_err());
        assert!(classify(&json!({"method": "ping", "id": 1})).is_err());
    }

    #[test]
    fn test_response_serialization() {
        let ok = JsonRpcResponse::success(json!("a"), json!({}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"jsonrpc": "2.0", "id": "a", "result": {}})
        );

        let err = JsonRpcResponse::error(json!(3), JsonRpcError::internal("boom"));
        assert!(err.is_error());
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"jsonrpc": "2.0", "id": 3, "error": {"code": -32603, "message": "boom"}})
        );
    }

    #[test]
    fn test_notification_to_value() {
        let n = JsonRpcNotification::new("notifications/tools/list_changed");
        assert_eq!(
            n.to_value(),
            json!({"jsonrpc": "2.0", "method": "notifications/tools/list_changed"})
        );
    }
}
