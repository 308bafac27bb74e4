//! `echo`: returns its message. Useful for wiring checks.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Auth;
use crate::resource::{Obligation, Resource};

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoResource;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EchoRequest {
    pub message: String,
}

#[async_trait]
impl Resource for EchoResource {
    type Input = EchoRequest;
    type Output = String;

    fn code(&self) -> &str {
        "echo"
    }

    fn description(&self) -> Option<&str> {
        Some("Echo a message back to the caller")
    }

    fn request_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string", "description": "Text to echo"}
            },
            "required": ["message"],
            "additionalProperties": false
        })
    }

    fn response_schema(&self) -> Value {
        json!({"type": "string"})
    }

    fn extract_actions(&self, _input: &EchoRequest) -> Vec<Obligation> {
        vec![Obligation::new(["echo"], &["read"])]
    }

    async fn execute(&self, input: EchoRequest, _auth: &Auth) -> anyhow::Result<String> {
        Ok(format!("Echo: {}", input.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo() {
        let auth = Auth::new("t", vec![]);
        let out = tokio_test::block_on(
            EchoResource.execute(EchoRequest { message: "hi".into() }, &auth),
        );
        assert_eq!(tokio_test::assert_ok!(out), "Echo: hi");
    }

    #[test]
    fn test_echo_obligation() {
        let request = EchoRequest { message: "x".into() };
        assert_eq!(
            EchoResource.extract_actions(&request),
            vec![Obligation::new(["echo"], &["read"])]
        );
    }
}
