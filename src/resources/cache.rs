//! `cache`: a key/value cache with optional per-entry TTL.
//!
//! Keys map to `cache/<key>` paths. A multi-key delete yields one obligation
//! per key, so every key must be authorized.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Auth;
use crate::resource::{Obligation, Resource};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum CacheRequest {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: Value,
        #[serde(default)]
        ttl_seconds: Option<u64>,
    },
    Delete {
        keys: Vec<String>,
    },
}

/// Cached value.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory cache backed by a concurrent map.
#[derive(Debug, Default)]
pub struct CacheResource {
    entries: DashMap<String, CacheEntry>,
}

impl CacheResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Value {
        let now = Instant::now();
        // Expired entries are dropped lazily on read.
        if self.entries.remove_if(key, |_, entry| entry.is_expired(now)).is_some() {
            return Value::Null;
        }
        self.entries
            .get(key)
            .map_or(Value::Null, |entry| entry.value.clone())
    }

    fn set(&self, key: String, value: Value, ttl: Option<Duration>) {
        let entry = CacheEntry {
            value,
            // A TTL past the end of the clock never expires.
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        };
        self.entries.insert(key, entry);
    }

    fn delete(&self, keys: &[String]) -> usize {
        keys.iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count()
    }
}

#[async_trait]
impl Resource for CacheResource {
    type Input = CacheRequest;
    type Output = Value;

    fn code(&self) -> &str {
        "cache"
    }

    fn description(&self) -> Option<&str> {
        Some("Read and write cached values by key")
    }

    fn request_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["get", "set", "delete"]},
                "key": {"type": "string"},
                "keys": {"type": "array", "items": {"type": "string"}},
                "value": {},
                "ttl_seconds": {"type": "integer", "minimum": 0}
            },
            "required": ["action"]
        })
    }

    fn extract_actions(&self, input: &CacheRequest) -> Vec<Obligation> {
        match input {
            CacheRequest::Get { key } => vec![Obligation::new(["cache", key.as_str()], &["read"])],
            CacheRequest::Set { key, .. } => {
                vec![Obligation::new(["cache", key.as_str()], &["write"])]
            }
            CacheRequest::Delete { keys } => keys
                .iter()
                .map(|key| Obligation::new(["cache", key.as_str()], &["delete"]))
                .collect(),
        }
    }

    async fn execute(&self, input: CacheRequest, _auth: &Auth) -> anyhow::Result<Value> {
        let output = match input {
            CacheRequest::Get { key } => json!({ "value": self.get(&key) }),
            CacheRequest::Set {
                key,
                value,
                ttl_seconds,
            } => {
                self.set(key, value, ttl_seconds.map(Duration::from_secs));
                json!({ "ok": true })
            }
            CacheRequest::Delete { keys } => json!({ "deleted": self.delete(&keys) }),
        };
        Ok(output)
    }
}
