//! Access logging for successful mediated calls.
//!
//! The gate calls [`AccessLogger::log`] once per obligation after a resource
//! returns, so a multi-path call produces one record per path. Denied calls
//! and resource failures are never recorded here.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::Auth;
use crate::resource::{DynResource, Obligation};

/// Sink for access records.
pub trait AccessLogger: Send + Sync {
    fn log(&self, auth: &Auth, resource: &dyn DynResource, obligations: &[Obligation]);
}

/// Emits one structured `tracing` event per record on target `mycelia::access`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAccessLogger;

impl AccessLogger for TracingAccessLogger {
    fn log(&self, auth: &Auth, resource: &dyn DynResource, obligations: &[Obligation]) {
        for obligation in obligations {
            tracing::info!(
                target: "mycelia::access",
                principal = %auth.principal(),
                resource = %resource.code(),
                path = %obligation.path,
                actions = ?obligation.actions,
                "Access granted"
            );
        }
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAccessLogger;

impl AccessLogger for NoopAccessLogger {
    fn log(&self, _auth: &Auth, _resource: &dyn DynResource, _obligations: &[Obligation]) {}
}

/// One recorded access.
#[derive(Debug, Clone, Serialize)]
pub struct AccessRecord {
    pub principal: String,
    pub resource: String,
    pub obligations: Vec<Obligation>,
    pub timestamp: DateTime<Utc>,
}

/// Keeps records in memory, for inspection.
#[derive(Debug, Default)]
pub struct MemoryAccessLogger {
    records: Mutex<Vec<AccessRecord>>,
}

impl MemoryAccessLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AccessRecord> {
        self.records.lock().clone()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl AccessLogger for MemoryAccessLogger {
    fn log(&self, auth: &Auth, resource: &dyn DynResource, obligations: &[Obligation]) {
        self.records.lock().push(AccessRecord {
            principal: auth.principal().to_string(),
            resource: resource.code().to_string(),
            obligations: obligations.to_vec(),
            timestamp: Utc::now(),
        });
    }
}
