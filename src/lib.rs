//! # Mycelia
//!
//! A policy-gated resource mediation layer.
//!
//! Stateful capabilities (document stores, caches, brokers, model proxies)
//! are wrapped as named resources. A caller never touches a resource
//! directly: it authenticates as a principal, obtains a gated handle via
//! [`Auth::get_resource`], and every call on that handle is checked against
//! the principal's path/action policies before anything executes.
//!
//! The same resources are projected as tools over the Model Context
//! Protocol (JSON-RPC 2.0 on streamable HTTP), so an MCP client gets the
//! same authorization as a direct REST caller.

pub mod auth;
pub mod codec;
pub mod config;
pub mod error;
pub mod mcp;
pub mod policy;
pub mod resource;
pub mod resources;
pub mod server;

pub use auth::{Auth, GatedResource};
pub use error::AccessError;
pub use policy::{evaluate, Decision, Policy, PolicyEffect, ResourcePath};
pub use resource::{DynResource, Obligation, Resource, ResourceManager};

/// Library version, reported by `/health` and MCP `serverInfo`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
