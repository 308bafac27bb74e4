//! Named input transforms attached to `modify` policies.
//!
//! A policy never carries executable code: it names a middleware by `code`
//! and supplies a JSON `arg`. The code is resolved through a
//! [`MiddlewareRegistry`], a small closed table of transform functions.
//! Each transform receives the (possibly already rewritten) resource input
//! and either returns the next input or denies the call.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reference to a registered middleware plus its argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiddlewareDescriptor {
    pub code: String,
    #[serde(default)]
    pub arg: Value,
}

impl MiddlewareDescriptor {
    pub fn new(code: impl Into<String>, arg: Value) -> Self {
        Self {
            code: code.into(),
            arg,
        }
    }
}

/// Why a middleware refused to pass the input on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MiddlewareError {
    #[error("{0}")]
    Denied(String),

    #[error("unknown middleware '{0}'")]
    Unknown(String),

    #[error("invalid argument for middleware '{code}': {reason}")]
    InvalidArgument { code: String, reason: String },
}

/// Transform signature: `(input, arg) -> input'`.
pub type MiddlewareFn = Arc<dyn Fn(Value, &Value) -> Result<Value, MiddlewareError> + Send + Sync>;

static GLOBAL_REGISTRY: Lazy<Arc<MiddlewareRegistry>> =
    Lazy::new(|| Arc::new(MiddlewareRegistry::with_defaults()));

/// Registry of named middleware functions.
pub struct MiddlewareRegistry {
    functions: RwLock<HashMap<String, MiddlewareFn>>,
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes: Vec<String> = self.functions.read().keys().cloned().collect();
        codes.sort();
        f.debug_struct("MiddlewareRegistry")
            .field("codes", &codes)
            .finish()
    }
}

impl MiddlewareRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the built-in transforms (`filter`).
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register("filter", Arc::new(filter_middleware));
        registry
    }

    /// Process-wide registry used by [`crate::auth::Auth`] unless another is injected.
    pub fn global() -> Arc<MiddlewareRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Register (or replace) a middleware under `code`.
    pub fn register(&self, code: impl Into<String>, function: MiddlewareFn) {
        self.functions.write().insert(code.into(), function);
    }

    pub fn contains(&self, code: &str) -> bool {
        self.functions.read().contains_key(code)
    }

    /// Run `chain` in order, each step receiving the previous step's output.
    pub fn apply_chain(
        &self,
        chain: &[MiddlewareDescriptor],
        mut input: Value,
    ) -> Result<Value, MiddlewareError> {
        for descriptor in chain {
            let function = self
                .functions
                .read()
                .get(&descriptor.code)
                .cloned()
                .ok_or_else(|| MiddlewareError::Unknown(descriptor.code.clone()))?;
            input = function(input, &descriptor.arg)?;
        }
        Ok(input)
    }
}

impl Default for MiddlewareRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ---------------------------------------------------------------------------
// filter
// ---------------------------------------------------------------------------

/// Confine a document-store call to the subset described by `arg.filter`.
///
/// Written documents (`doc`, every element of `docs`, and `update.$set`) must
/// agree with the filter on each filter key. The filter is then merged into
/// `query`, overriding any caller-supplied value for the same key.
///
/// Only single-collection calls can be confined this way. Multi-collection
/// calls (`collections`) and inputs without a `collection` are denied.
fn filter_middleware(mut input: Value, arg: &Value) -> Result<Value, MiddlewareError> {
    let filter = arg
        .get("filter")
        .and_then(Value::as_object)
        .ok_or_else(|| MiddlewareError::InvalidArgument {
            code: "filter".to_string(),
            reason: "expected {\"filter\": {...}}".to_string(),
        })?;

    let object = input
        .as_object_mut()
        .ok_or_else(|| MiddlewareError::Denied("filter requires an object input".to_string()))?;

    if object.contains_key("collections") {
        return Err(MiddlewareError::Denied(
            "filter cannot confine a multi-collection call".to_string(),
        ));
    }
    if !object.get("collection").is_some_and(Value::is_string) {
        return Err(MiddlewareError::Denied(
            "filter requires a single 'collection'".to_string(),
        ));
    }

    if let Some(doc) = object.get("doc") {
        require_match(doc, filter)?;
    }
    if let Some(docs) = object.get("docs") {
        let docs = docs
            .as_array()
            .ok_or_else(|| MiddlewareError::Denied("'docs' must be an array".to_string()))?;
        for doc in docs {
            require_match(doc, filter)?;
        }
    }
    if let Some(set) = object.get("update").and_then(|u| u.get("$set")) {
        require_consistent(set, filter)?;
    }

    let query = object
        .entry("query")
        .or_insert_with(|| Value::Object(Map::new()));
    let query = query
        .as_object_mut()
        .ok_or_else(|| MiddlewareError::Denied("'query' must be an object".to_string()))?;
    for (key, value) in filter {
        query.insert(key.clone(), value.clone());
    }

    Ok(input)
}

/// Every filter key must be present in `doc` with an equal value.
fn require_match(doc: &Value, filter: &Map<String, Value>) -> Result<(), MiddlewareError> {
    for (key, expected) in filter {
        if doc.get(key) != Some(expected) {
            return Err(MiddlewareError::Denied(format!(
                "document does not satisfy required filter on '{}'",
                key
            )));
        }
    }
    Ok(())
}

/// Filter keys that `set` touches must keep the filtered value.
fn require_consistent(set: &Value, filter: &Map<String, Value>) -> Result<(), MiddlewareError> {
    for (key, expected) in filter {
        if let Some(actual) = set.get(key) {
            if actual != expected {
                return Err(MiddlewareError::Denied(format!(
                    "update would move document outside required filter on '{}'",
                    key
                )));
            }
        }
    }
    Ok(())
}
