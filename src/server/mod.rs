//! HTTP server for the mediation layer.
//!
//! Exposes every registered resource two ways, both behind bearer
//! authentication and the same policy gate:
//!
//! - as MCP tools over streamable HTTP on `/mcp`
//! - as plain REST calls on `POST /api/resource/:code`

pub mod mcp;
pub mod routes;

pub use routes::{app_router, AppState};

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use serde_json::json;

    use super::AppState;
    use crate::auth::{Auth, NoopAccessLogger, StaticTokenAuthenticator};
    use crate::policy::{MiddlewareDescriptor, Policy};
    use crate::resources::register_builtin;

    /// May do anything.
    pub const ADMIN_TOKEN: &str = "admin-token";
    /// Reads everything; document access is confined to `owner: reader`.
    pub const READER_TOKEN: &str = "reader-token";

    pub fn test_state() -> AppState {
        let owner = || MiddlewareDescriptor::new("filter", json!({"filter": {"owner": "reader"}}));
        let admin = Auth::new("admin", vec![Policy::allow("**", "*").unwrap()])
            .with_access_logger(Arc::new(NoopAccessLogger));
        let reader = Auth::new(
            "reader",
            vec![
                Policy::allow("**", "read").unwrap(),
                Policy::modify("db/*", "read", owner()).unwrap(),
                Policy::modify("db/*", "write", owner()).unwrap(),
            ],
        )
        .with_access_logger(Arc::new(NoopAccessLogger));

        let authenticator = StaticTokenAuthenticator::new()
            .with_token(ADMIN_TOKEN, admin)
            .with_token(READER_TOKEN, reader);
        let state = AppState::new(Arc::new(authenticator));
        register_builtin(&state.resources);
        state
    }
}
