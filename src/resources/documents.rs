//! `docs`: an in-memory document store.
//!
//! Every operation names the collection(s) it touches, which become
//! `db/<collection>` paths. Queries are top-level field equality; a `filter`
//! middleware can therefore confine a principal to a subset of documents by
//! pinning query fields.
//!
//! ```text
//! {"action": "insertOne", "collection": "users", "doc": {...}}  → db/users write
//! {"action": "find", "collection": "users", "query": {...}}     → db/users read
//! {"action": "drop", "collections": ["a", "b"]}                 → db/a delete, db/b delete
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::auth::Auth;
use crate::resource::{Obligation, Resource};

type Document = Map<String, Value>;

/// A request to the document store, tagged by `action`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action")]
pub enum DocumentRequest {
    #[serde(rename = "find")]
    Find {
        collection: String,
        #[serde(default)]
        query: Document,
        #[serde(default)]
        limit: Option<usize>,
    },
    #[serde(rename = "insertOne")]
    InsertOne { collection: String, doc: Document },
    #[serde(rename = "insertMany")]
    InsertMany {
        collection: String,
        docs: Vec<Document>,
    },
    #[serde(rename = "updateMany")]
    UpdateMany {
        collection: String,
        #[serde(default)]
        query: Document,
        update: Update,
    },
    #[serde(rename = "deleteMany")]
    DeleteMany {
        collection: String,
        #[serde(default)]
        query: Document,
    },
    #[serde(rename = "drop")]
    Drop { collections: Vec<String> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    #[serde(rename = "$set")]
    pub set: Document,
}

impl DocumentRequest {
    fn obligations(&self) -> Vec<Obligation> {
        let single = |collection: &str, action: &str| {
            vec![Obligation::new(["db", collection], &[action])]
        };
        match self {
            DocumentRequest::Find { collection, .. } => single(collection, "read"),
            DocumentRequest::InsertOne { collection, .. }
            | DocumentRequest::InsertMany { collection, .. }
            | DocumentRequest::UpdateMany { collection, .. } => single(collection, "write"),
            DocumentRequest::DeleteMany { collection, .. } => single(collection, "delete"),
            DocumentRequest::Drop { collections } => collections
                .iter()
                .map(|c| Obligation::new(["db", c.as_str()], &["delete"]))
                .collect(),
        }
    }
}

/// In-memory collections of JSON documents.
#[derive(Debug, Default)]
pub struct DocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection` (0 if absent).
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, Vec::len)
    }

    fn find(&self, collection: &str, query: &Document, limit: Option<usize>) -> Value {
        let collections = self.collections.read();
        let docs: Vec<Value> = collections
            .get(collection)
            .into_iter()
            .flatten()
            .filter(|doc| matches_query(doc, query))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .map(Value::Object)
            .collect();
        Value::Array(docs)
    }

    fn insert(&self, collection: &str, docs: Vec<Document>) -> Value {
        let mut collections = self.collections.write();
        let target = collections.entry(collection.to_string()).or_default();
        let mut ids = Vec::with_capacity(docs.len());
        for mut doc in docs {
            let id = doc
                .entry("_id")
                .or_insert_with(|| json!({ "$oid": new_object_id() }))
                .clone();
            ids.push(id);
            target.push(doc);
        }
        json!({ "insertedCount": ids.len(), "insertedIds": ids })
    }

    fn update(&self, collection: &str, query: &Document, set: &Document) -> Value {
        let mut collections = self.collections.write();
        let mut matched = 0;
        let mut modified = 0;
        if let Some(docs) = collections.get_mut(collection) {
            for doc in docs.iter_mut().filter(|doc| matches_query(doc, query)) {
                matched += 1;
                let mut changed = false;
                for (key, value) in set {
                    if doc.get(key) != Some(value) {
                        doc.insert(key.clone(), value.clone());
                        changed = true;
                    }
                }
                if changed {
                    modified += 1;
                }
            }
        }
        json!({ "matchedCount": matched, "modifiedCount": modified })
    }

    fn delete(&self, collection: &str, query: &Document) -> Value {
        let mut collections = self.collections.write();
        let deleted = collections.get_mut(collection).map_or(0, |docs| {
            let before = docs.len();
            docs.retain(|doc| !matches_query(doc, query));
            before - docs.len()
        });
        json!({ "deletedCount": deleted })
    }

    fn drop_collections(&self, names: &[String]) -> Value {
        let mut collections = self.collections.write();
        let dropped: Vec<&String> = names
            .iter()
            .filter(|name| collections.remove(name.as_str()).is_some())
            .collect();
        json!({ "dropped": dropped })
    }
}

/// Top-level field equality; an empty query matches everything.
fn matches_query(doc: &Document, query: &Document) -> bool {
    query.iter().all(|(key, expected)| doc.get(key) == Some(expected))
}

/// 24 hex digit identifier in ObjectId shape.
fn new_object_id() -> String {
    let uuid = Uuid::new_v4();
    hex::encode(&uuid.as_bytes()[..12])
}

#[async_trait]
impl Resource for DocumentStore {
    type Input = DocumentRequest;
    type Output = Value;

    fn code(&self) -> &str {
        "docs"
    }

    fn description(&self) -> Option<&str> {
        Some("Query and modify JSON document collections")
    }

    fn request_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["find", "insertOne", "insertMany", "updateMany", "deleteMany", "drop"]
                },
                "collection": {"type": "string"},
                "collections": {"type": "array", "items": {"type": "string"}},
                "query": {"$ref": "#/$defs/Document"},
                "doc": {"$ref": "#/$defs/Document"},
                "docs": {"type": "array", "items": {"$ref": "#/$defs/Document"}},
                "update": {
                    "type": "object",
                    "properties": {"$set": {"$ref": "#/$defs/Document"}},
                    "required": ["$set"]
                },
                "limit": {"type": "integer", "minimum": 0}
            },
            "required": ["action"],
            "$defs": {
                "Document": {"type": "object", "additionalProperties": true}
            }
        })
    }

    fn extract_actions(&self, input: &DocumentRequest) -> Vec<Obligation> {
        input.obligations()
    }

    async fn execute(&self, input: DocumentRequest, _auth: &Auth) -> anyhow::Result<Value> {
        let output = match input {
            DocumentRequest::Find {
                collection,
                query,
                limit,
            } => self.find(&collection, &query, limit),
            DocumentRequest::InsertOne { collection, doc } => self.insert(&collection, vec![doc]),
            DocumentRequest::InsertMany { collection, docs } => self.insert(&collection, docs),
            DocumentRequest::UpdateMany {
                collection,
                query,
                update,
            } => self.update(&collection, &query, &update.set),
            DocumentRequest::DeleteMany { collection, query } => self.delete(&collection, &query),
            DocumentRequest::Drop { collections } => self.drop_collections(&collections),
        };
        Ok(output)
    }
}
