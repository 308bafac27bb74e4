//! # Auth
//!
//! The authenticated principal, and the only way to reach a resource.
//!
//! ## Architecture
//!
//! ```text
//! Auth::get_resource(manager, "docs") ──► GatedResource
//!
//! GatedResource::call(input)
//!   1. validate input             (request schema, Validation on failure)
//!   2. extract obligations        (every path/action the call touches)
//!   3. evaluate every pair        (any Deny ⇒ Forbidden, nothing runs)
//!   4. run middleware chains      (Modify decisions, in obligation order)
//!   5. execute                    (resource errors pass through unchanged)
//!   6. access log                 (one record per obligation, success only)
//! ```
//!
//! Steps 1-4 complete before any side effect. A denial on any single pair
//! blocks the whole call.

pub mod access_log;
pub mod authenticator;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::AccessError;
use crate::policy::{evaluate, Decision, MiddlewareDescriptor, MiddlewareRegistry, Policy, ResourcePath};
use crate::resource::{DynResource, Obligation, ResourceManager};

pub use access_log::{AccessLogger, AccessRecord, MemoryAccessLogger, NoopAccessLogger, TracingAccessLogger};
pub use authenticator::{bearer_token, token_digest, Authenticator, StaticTokenAuthenticator};

/// An authenticated principal with its policy list.
///
/// Cheap to clone; policies and collaborators are shared.
#[derive(Clone)]
pub struct Auth {
    principal: Arc<str>,
    policies: Arc<[Policy]>,
    access_logger: Arc<dyn AccessLogger>,
    middleware: Arc<MiddlewareRegistry>,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("principal", &self.principal)
            .field("policies", &self.policies.len())
            .finish()
    }
}

impl Auth {
    /// Principal logging to `tracing` and using the global middleware registry.
    pub fn new(principal: impl Into<String>, policies: Vec<Policy>) -> Self {
        Self {
            principal: Arc::from(principal.into()),
            policies: Arc::from(policies),
            access_logger: Arc::new(TracingAccessLogger),
            middleware: MiddlewareRegistry::global(),
        }
    }

    pub fn with_access_logger(mut self, logger: Arc<dyn AccessLogger>) -> Self {
        self.access_logger = logger;
        self
    }

    pub fn with_middleware(mut self, registry: Arc<MiddlewareRegistry>) -> Self {
        self.middleware = registry;
        self
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Evaluate this principal's policies for one pair.
    pub fn evaluate(&self, path: &ResourcePath, action: &str) -> Decision {
        evaluate(&self.policies, path, action)
    }

    /// Look up `code` and wrap it so every call is authorized.
    pub fn get_resource(
        &self,
        manager: &ResourceManager,
        code: &str,
    ) -> Result<GatedResource, AccessError> {
        let resource = manager
            .get_resource(code)
            .ok_or_else(|| AccessError::NotFound(format!("Resource '{}'", code)))?;
        Ok(GatedResource {
            resource,
            auth: self.clone(),
        })
    }
}

/// A resource bound to an [`Auth`]; the sole entry point for calls.
#[derive(Clone)]
pub struct GatedResource {
    resource: Arc<dyn DynResource>,
    auth: Auth,
}

impl fmt::Debug for GatedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatedResource")
            .field("resource", &self.resource.code())
            .field("principal", &self.auth.principal())
            .finish()
    }
}

impl GatedResource {
    pub fn code(&self) -> &str {
        self.resource.code()
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Authorize and execute one call.
    pub async fn call(&self, input: Value) -> Result<Value, AccessError> {
        let obligations = self.resource.obligations(&input)?;
        let chain = self.authorize(&obligations)?;

        let input = if chain.is_empty() {
            input
        } else {
            self.auth
                .middleware
                .apply_chain(&chain, input)
                .map_err(|e| AccessError::Forbidden(e.to_string()))?
        };

        let output = self.resource.execute_json(input, &self.auth).await?;

        for obligation in &obligations {
            self.auth.access_logger.log(
                &self.auth,
                self.resource.as_ref(),
                std::slice::from_ref(obligation),
            );
        }

        Ok(output)
    }

    /// Evaluate every `(path, action)` pair before anything runs.
    ///
    /// Returns the concatenated middleware chain for all `Modify` decisions.
    fn authorize(&self, obligations: &[Obligation]) -> Result<Vec<MiddlewareDescriptor>, AccessError> {
        let mut chain = Vec::new();
        for obligation in obligations {
            for action in &obligation.actions {
                match self.auth.evaluate(&obligation.path, action) {
                    Decision::Deny => {
                        tracing::info!(
                            principal = %self.auth.principal(),
                            resource = %self.resource.code(),
                            path = %obligation.path,
                            action = %action,
                            "Access denied"
                        );
                        return Err(AccessError::Forbidden(format!(
                            "{} on '{}' is not permitted for '{}'",
                            action,
                            obligation.path,
                            self.auth.principal()
                        )));
                    }
                    Decision::Modify(middleware) => chain.extend(middleware),
                    Decision::Allow => {}
                }
            }
        }
        Ok(chain)
    }
}
