//! # Policy Evaluator
//!
//! Deterministic path/action-level authorization for mediated resources.
//!
//! ## Architecture
//!
//! A principal carries an ordered list of [`Policy`] rules. Before a resource
//! executes, every `(path, action)` pair it will touch is evaluated against
//! that list:
//!
//! ```text
//! docs.insertOne({collection: "users", doc: {...}})
//!   → obligation (db/users, write)
//!   → evaluate(policies, ["db","users"], "write")
//!       matching: [{db/*, write, modify, filter}]
//!   → Decision::Modify([filter])
//! ```
//!
//! ## Resolution
//!
//! 1. Keep policies whose path pattern and action pattern both match.
//! 2. Any matching `deny` wins outright.
//! 3. Otherwise any matching `modify` yields `Modify` with every matching
//!    middleware descriptor, in list order.
//! 4. Otherwise any matching `allow` yields `Allow`.
//! 5. Nothing matched: `Deny`.
//!
//! Evaluation is a pure linear scan; policy lists are small.

pub mod middleware;
pub mod path;

use serde::{Deserialize, Serialize};

pub use middleware::{MiddlewareDescriptor, MiddlewareError, MiddlewareRegistry};
pub use path::{ActionPattern, PathPattern, PatternError, ResourcePath};

/// Policy effect
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PolicyEffect {
    Allow,
    Deny,
    Modify,
}

/// A rule granting, denying, or conditionally rewriting access.
///
/// A `modify` policy always carries a middleware descriptor and an
/// `allow`/`deny` policy never does; [`Policy::new`] and deserialization both
/// enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy", into = "RawPolicy")]
pub struct Policy {
    resource: PathPattern,
    action: ActionPattern,
    effect: PolicyEffect,
    middleware: Option<MiddlewareDescriptor>,
}

/// Wire form of a policy, before invariant checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPolicy {
    resource: PathPattern,
    action: ActionPattern,
    effect: PolicyEffect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    middleware: Option<MiddlewareDescriptor>,
}

/// Policy document that violates the effect/middleware invariant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("modify policy on '{0}' requires a middleware")]
    MissingMiddleware(String),

    #[error("{effect:?} policy on '{resource}' must not carry a middleware")]
    UnexpectedMiddleware {
        resource: String,
        effect: PolicyEffect,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

impl TryFrom<RawPolicy> for Policy {
    type Error = PolicyError;

    fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
        match (raw.effect, &raw.middleware) {
            (PolicyEffect::Modify, None) => {
                return Err(PolicyError::MissingMiddleware(raw.resource.to_string()))
            }
            (PolicyEffect::Allow | PolicyEffect::Deny, Some(_)) => {
                return Err(PolicyError::UnexpectedMiddleware {
                    resource: raw.resource.to_string(),
                    effect: raw.effect,
                })
            }
            _ => {}
        }
        Ok(Self {
            resource: raw.resource,
            action: raw.action,
            effect: raw.effect,
            middleware: raw.middleware,
        })
    }
}

impl From<Policy> for RawPolicy {
    fn from(policy: Policy) -> Self {
        Self {
            resource: policy.resource,
            action: policy.action,
            effect: policy.effect,
            middleware: policy.middleware,
        }
    }
}

impl Policy {
    /// Build a policy, checking pattern syntax and the middleware invariant.
    pub fn new(
        resource: &str,
        action: &str,
        effect: PolicyEffect,
        middleware: Option<MiddlewareDescriptor>,
    ) -> Result<Self, PolicyError> {
        Policy::try_from(RawPolicy {
            resource: PathPattern::parse(resource)?,
            action: ActionPattern::from(action),
            effect,
            middleware,
        })
    }

    pub fn allow(resource: &str, action: &str) -> Result<Self, PolicyError> {
        Self::new(resource, action, PolicyEffect::Allow, None)
    }

    pub fn deny(resource: &str, action: &str) -> Result<Self, PolicyError> {
        Self::new(resource, action, PolicyEffect::Deny, None)
    }

    pub fn modify(
        resource: &str,
        action: &str,
        middleware: MiddlewareDescriptor,
    ) -> Result<Self, PolicyError> {
        Self::new(resource, action, PolicyEffect::Modify, Some(middleware))
    }

    pub fn resource(&self) -> &PathPattern {
        &self.resource
    }

    pub fn action(&self) -> &ActionPattern {
        &self.action
    }

    pub fn effect(&self) -> PolicyEffect {
        self.effect
    }

    pub fn middleware(&self) -> Option<&MiddlewareDescriptor> {
        self.middleware.as_ref()
    }

    /// Whether this policy applies to `(path, action)`.
    pub fn matches(&self, path: &ResourcePath, action: &str) -> bool {
        self.resource.matches(path) && self.action.matches(action)
    }
}

/// Outcome of evaluating one `(path, action)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Deny,
    Allow,
    /// Proceed after running these middleware, in order, over the input.
    Modify(Vec<MiddlewareDescriptor>),
}

impl Decision {
    pub fn is_deny(&self) -> bool {
        matches!(self, Decision::Deny)
    }
}

/// Evaluate `policies` for a single `(path, action)` pair.
pub fn evaluate(policies: &[Policy], path: &ResourcePath, action: &str) -> Decision {
    let mut allowed = false;
    let mut chain = Vec::new();

    for policy in policies.iter().filter(|p| p.matches(path, action)) {
        match policy.effect {
            PolicyEffect::Deny => return Decision::Deny,
            PolicyEffect::Modify => {
                if let Some(middleware) = &policy.middleware {
                    chain.push(middleware.clone());
                }
            }
            PolicyEffect::Allow => allowed = true,
        }
    }

    if !chain.is_empty() {
        Decision::Modify(chain)
    } else if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(segments: &[&str]) -> ResourcePath {
        ResourcePath::new(segments.iter().copied())
    }

    fn filter(role: &str) -> MiddlewareDescriptor {
        MiddlewareDescriptor::new("filter", json!({"filter": {"role": role}}))
    }

    #[test]
    fn test_default_closed() {
        assert_eq!(evaluate(&[], &path(&["db", "users"]), "read"), Decision::Deny);

        let policies = vec![Policy::allow("fs/**", "*").unwrap()];
        assert_eq!(
            evaluate(&policies, &path(&["db", "users"]), "read"),
            Decision::Deny
        );
    }

    #[test]
    fn test_deny_dominates_regardless_of_order() {
        let allow = Policy::allow("db/*", "write").unwrap();
        let deny = Policy::deny("db/users", "*").unwrap();
        let target = path(&["db", "users"]);

        let forward = vec![allow.clone(), deny.clone()];
        let backward = vec![deny, allow];
        assert_eq!(evaluate(&forward, &target, "write"), Decision::Deny);
        assert_eq!(evaluate(&backward, &target, "write"), Decision::Deny);
    }

    #[test]
    fn test_deny_dominates_modify() {
        let policies = vec![
            Policy::modify("db/*", "write", filter("user")).unwrap(),
            Policy::deny("db/**", "write").unwrap(),
        ];
        assert_eq!(
            evaluate(&policies, &path(&["db", "users"]), "write"),
            Decision::Deny
        );
    }

    #[test]
    fn test_modify_wins_over_allow() {
        let policies = vec![
            Policy::allow("**", "*").unwrap(),
            Policy::modify("db/*", "write", filter("user")).unwrap(),
        ];
        assert_eq!(
            evaluate(&policies, &path(&["db", "users"]), "write"),
            Decision::Modify(vec![filter("user")])
        );
        assert_eq!(
            evaluate(&policies, &path(&["db", "users"]), "read"),
            Decision::Allow
        );
    }

    #[test]
    fn test_modify_chain_keeps_list_order() {
        let policies = vec![
            Policy::modify("db/**", "*", filter("a")).unwrap(),
            Policy::modify("db/users", "write", filter("b")).unwrap(),
        ];
        assert_eq!(
            evaluate(&policies, &path(&["db", "users"]), "write"),
            Decision::Modify(vec![filter("a"), filter("b")])
        );
    }

    #[test]
    fn test_action_must_match() {
        let policies = vec![Policy::allow("db/*", "read").unwrap()];
        assert_eq!(evaluate(&policies, &path(&["db", "x"]), "read"), Decision::Allow);
        assert_eq!(evaluate(&policies, &path(&["db", "x"]), "write"), Decision::Deny);
    }

    #[test]
    fn test_policy_invariants() {
        assert_eq!(
            Policy::new("db/*", "write", PolicyEffect::Modify, None).unwrap_err(),
            PolicyError::MissingMiddleware("db/*".to_string())
        );
        assert!(matches!(
            Policy::new("db/*", "write", PolicyEffect::Allow, Some(filter("x"))),
            Err(PolicyError::UnexpectedMiddleware { .. })
        ));
        assert!(matches!(
            Policy::allow("**/db", "*"),
            Err(PolicyError::Pattern(_))
        ));
    }

    #[test]
    fn test_policy_document_deserialization() {
        let doc = json!([
            {"resource": "**", "action": "*", "effect": "allow"},
            {"resource": "db/*", "action": "write", "effect": "modify",
             "middleware": {"code": "filter", "arg": {"filter": {"role": "user"}}}}
        ]);
        let policies: Vec<Policy> = serde_json::from_value(doc).unwrap();
        assert_eq!(policies.len(), 2);
        assert_eq!(policies[1].effect(), PolicyEffect::Modify);
        assert_eq!(policies[1].middleware().unwrap().code, "filter");

        let missing = json!({"resource": "db/*", "action": "write", "effect": "modify"});
        assert!(serde_json::from_value::<Policy>(missing).is_err());
    }

    #[test]
    fn test_policy_serializes_back() {
        let policy = Policy::allow("cache/*", "read").unwrap();
        let value = serde_json::to_value(&policy).unwrap();
        assert_eq!(
            value,
            json!({"resource": "cache/*", "action": "read", "effect": "allow"})
        );
    }
}
