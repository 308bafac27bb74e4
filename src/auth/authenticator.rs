//! Request authentication for the HTTP surfaces.
//!
//! Identity is established once per request from the `Authorization`
//! header. Tokens are never stored in clear: principals are keyed by the
//! SHA-256 hex digest of their bearer token.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

use super::{AccessLogger, Auth};
use crate::config::PrincipalConfig;

/// Turns request headers into an [`Auth`], or `None` when unauthenticated.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Option<Auth>;
}

/// Lowercase hex SHA-256 of a bearer token.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Fixed table of bearer-token principals.
#[derive(Debug, Default, Clone)]
pub struct StaticTokenAuthenticator {
    principals: HashMap<String, Auth>,
}

impl StaticTokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Principals from configuration, all sharing `access_logger`.
    pub fn from_config(principals: &[PrincipalConfig], access_logger: Arc<dyn AccessLogger>) -> Self {
        principals.iter().fold(Self::new(), |authenticator, principal| {
            let auth = Auth::new(principal.name.clone(), principal.policies.clone())
                .with_access_logger(access_logger.clone());
            authenticator.with_digest(principal.token_sha256.to_ascii_lowercase(), auth)
        })
    }

    /// Register a principal by the digest of its token.
    pub fn with_digest(mut self, token_sha256: impl Into<String>, auth: Auth) -> Self {
        self.principals.insert(token_sha256.into(), auth);
        self
    }

    /// Register a principal by its clear token.
    pub fn with_token(self, token: &str, auth: Auth) -> Self {
        self.with_digest(token_digest(token), auth)
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Option<Auth> {
        let token = bearer_token(headers)?;
        let auth = self.principals.get(&token_digest(token)).cloned();
        if auth.is_none() {
            tracing::debug!("Rejected unknown bearer token");
        }
        auth
    }
}
