//! Resource capability contract.
//!
//! Every stateful capability (document store, cache, blob store, broker,
//! LLM proxy) is wrapped as a named [`Resource`] and can only be reached
//! through [`crate::auth::Auth::get_resource`].
//!
//! Implementors work with typed input and output. The registry stores them
//! behind the object-safe [`DynResource`] view, which speaks JSON and is
//! provided for every `Resource` by a blanket impl.

pub mod manager;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::Auth;
use crate::error::AccessError;
use crate::policy::ResourcePath;

pub use manager::ResourceManager;

/// A `{path, actions}` pair a call must be authorized for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    pub path: ResourcePath,
    pub actions: Vec<String>,
}

impl Obligation {
    pub fn new<P, S>(path: P, actions: &[S]) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        S: AsRef<str>,
    {
        Self {
            path: ResourcePath::new(path),
            actions: actions.iter().map(|a| a.as_ref().to_string()).collect(),
        }
    }
}

/// A named capability mediated by this layer.
///
/// `extract_actions` must be pure and must report every path the eventual
/// `execute` touches. Anything it leaves out is never authorized.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Typed request; deserialization doubles as request validation.
    type Input: DeserializeOwned + Send + Sync;
    /// Typed response.
    type Output: Serialize + Send;

    /// Globally unique code; also the tool name over MCP.
    fn code(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    /// JSON Schema for `Input`.
    fn request_schema(&self) -> Value;

    /// JSON Schema for `Output`.
    fn response_schema(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }

    /// Enumerate the authorization obligations of `input`.
    fn extract_actions(&self, input: &Self::Input) -> Vec<Obligation>;

    /// Perform the call. Only reached once every obligation is authorized.
    async fn execute(&self, input: Self::Input, auth: &Auth) -> anyhow::Result<Self::Output>;
}

/// JSON-level, object-safe view of a [`Resource`].
#[async_trait]
pub trait DynResource: Send + Sync {
    fn code(&self) -> &str;

    fn description(&self) -> Option<&str>;

    fn request_schema(&self) -> Value;

    fn response_schema(&self) -> Value;

    /// Validate `input` and enumerate its obligations.
    fn obligations(&self, input: &Value) -> Result<Vec<Obligation>, AccessError>;

    /// Validate `input`, execute, and serialize the output.
    async fn execute_json(&self, input: Value, auth: &Auth) -> Result<Value, AccessError>;
}

/// Parse a JSON input into a resource's typed request.
pub fn validate_input<T: DeserializeOwned>(input: &Value) -> Result<T, AccessError> {
    T::deserialize(input).map_err(|e| AccessError::Validation(e.to_string()))
}

#[async_trait]
impl<R> DynResource for R
where
    R: Resource,
{
    fn code(&self) -> &str {
        Resource::code(self)
    }

    fn description(&self) -> Option<&str> {
        Resource::description(self)
    }

    fn request_schema(&self) -> Value {
        Resource::request_schema(self)
    }

    fn response_schema(&self) -> Value {
        Resource::response_schema(self)
    }

    fn obligations(&self, input: &Value) -> Result<Vec<Obligation>, AccessError> {
        let typed: R::Input = validate_input(input)?;
        Ok(self.extract_actions(&typed))
    }

    async fn execute_json(&self, input: Value, auth: &Auth) -> Result<Value, AccessError> {
        let typed: R::Input = validate_input(&input)?;
        let output = self.execute(typed, auth).await.map_err(|err| {
            // A nested mediated call keeps its original classification.
            match err.downcast::<AccessError>() {
                Ok(access) => access,
                Err(other) => AccessError::Resource(other),
            }
        })?;
        serde_json::to_value(output).map_err(|e| AccessError::Resource(e.into()))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ProbeResource;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_obligations_validate_input() {
        let probe = ProbeResource::default();
        let resource: &dyn DynResource = &probe;

        let err = resource.obligations(&json!({"nope": 1})).unwrap_err();
        assert!(matches!(err, AccessError::Validation(_)));

        let obligations = resource
            .obligations(&json!({"touches": [{"path": ["db", "a"], "actions": ["read"]}]}))
            .unwrap();
        assert_eq!(obligations, vec![Obligation::new(["db", "a"], &["read"])]);
    }

    #[tokio::test]
    async fn test_execute_json_propagates_resource_error() {
        let probe = ProbeResource::default();
        let resource: &dyn DynResource = &probe;
        let auth = Auth::new("tester", vec![]);

        let err = resource
            .execute_json(json!({"touches": [], "fail": "backend offline"}), &auth)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Resource(_)));
        assert_eq!(err.to_string(), "backend offline");
    }
}
