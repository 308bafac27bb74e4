//! Projection of resources into MCP tool descriptors.
//!
//! Each registered resource becomes one tool named by its code. The tool's
//! `inputSchema` is the resource's request schema with every local `$ref`
//! inlined; if the result is not an object schema, clients get the generic
//! `{"type": "object"}` instead.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::resource::{DynResource, ResourceManager};

/// An MCP tool descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    /// Empty when the resource has none.
    pub description: String,
    pub input_schema: Value,
}

impl Tool {
    pub fn from_resource(resource: &dyn DynResource) -> Self {
        Self {
            name: resource.code().to_string(),
            description: resource.description().unwrap_or_default().to_string(),
            input_schema: project_input_schema(&resource.request_schema()),
        }
    }
}

/// Every registered resource as a tool, sorted by name.
pub fn list_tools(manager: &ResourceManager) -> Vec<Tool> {
    manager
        .list()
        .iter()
        .map(|resource| Tool::from_resource(resource.as_ref()))
        .collect()
}

/// Inline `$ref`s and fall back to a generic object schema.
pub fn project_input_schema(schema: &Value) -> Value {
    let definitions = schema
        .get("$defs")
        .or_else(|| schema.get("definitions"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let resolved = resolve_refs(schema, &definitions, 0);
    if resolved.get("type").and_then(Value::as_str) == Some("object") {
        resolved
    } else {
        json!({"type": "object"})
    }
}

/// Recursive references stop expanding past this depth.
const MAX_REF_DEPTH: usize = 32;

/// Replace `#/$defs/Name` and `#/definitions/Name` pointers with the
/// referenced definition, dropping the definitions block itself.
fn resolve_refs(schema: &Value, definitions: &Map<String, Value>, depth: usize) -> Value {
    match schema {
        Value::Object(obj) => {
            if let Some(Value::String(pointer)) = obj.get("$ref") {
                let name = pointer.rsplit('/').next().unwrap_or(pointer);
                if depth >= MAX_REF_DEPTH {
                    return json!({"type": "object"});
                }
                if let Some(definition) = definitions.get(name) {
                    return resolve_refs(definition, definitions, depth + 1);
                }
            }

            let resolved = obj
                .iter()
                .filter(|(key, _)| key.as_str() != "$defs" && key.as_str() != "definitions")
                .map(|(key, value)| (key.clone(), resolve_refs(value, definitions, depth)))
                .collect();
            Value::Object(resolved)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_refs(item, definitions, depth))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{register_builtin, EchoResource};

    #[test]
    fn test_refs_are_inlined() {
        let schema = json!({
            "type": "object",
            "properties": {"doc": {"$ref": "#/$defs/Doc"}},
            "$defs": {"Doc": {"type": "object", "properties": {"a": {"type": "string"}}}}
        });
        let projected = project_input_schema(&schema);
        assert_eq!(
            projected,
            json!({
                "type": "object",
                "properties": {"doc": {"type": "object", "properties": {"a": {"type": "string"}}}}
            })
        );
    }

    #[test]
    fn test_non_object_schema_falls_back() {
        assert_eq!(project_input_schema(&json!({"type": "string"})), json!({"type": "object"}));
        assert_eq!(project_input_schema(&json!({})), json!({"type": "object"}));
    }

    #[test]
    fn test_recursive_ref_terminates() {
        let schema = json!({
            "type": "object",
            "properties": {"node": {"$ref": "#/$defs/Node"}},
            "$defs": {"Node": {"type": "object", "properties": {"next": {"$ref": "#/$defs/Node"}}}}
        });
        let projected = project_input_schema(&schema);
        assert_eq!(projected["type"], "object");
    }

    #[test]
    fn test_tool_from_resource() {
        let tool = Tool::from_resource(&EchoResource);
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["name"], "echo");
        assert_eq!(value["inputSchema"]["type"], "object");
        assert_eq!(value["inputSchema"]["required"], json!(["message"]));
    }

    #[test]
    fn test_missing_description_is_empty() {
        let tool = Tool::from_resource(&crate::resource::testing::ProbeResource::default());
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["description"], "");
    }

    #[test]
    fn test_list_tools_covers_every_resource() {
        let manager = ResourceManager::new();
        register_builtin(&manager);
        let names: Vec<String> = list_tools(&manager).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["cache", "docs", "echo"]);

        let docs = list_tools(&manager).into_iter().find(|t| t.name == "docs").unwrap();
        assert!(docs.input_schema.get("$defs").is_none());
        assert_eq!(docs.input_schema["properties"]["doc"]["type"], "object");
    }
}
