//! Route-to-role authorization policy.
//!
//! A static, ordered rule table compiled once at startup. Evaluation is a
//! pure two-input decision: (optional principal, request path) in,
//! decision out. No state survives a request.

use crate::auth::principal::Principal;

/// Minimum role class required to reach a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessClass {
    /// Reachable by anyone, token or not.
    Public,
    /// Any verified principal, regardless of role.
    AuthenticatedAny,
    /// Principal carrying USER or ADMIN.
    UserOrAdmin,
    /// Principal carrying ADMIN.
    AdminOnly,
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// No usable principal on a protected route; surfaces as 401.
    DenyUnauthenticated,
    /// Principal present but lacking the required role; surfaces as 403.
    DenyForbidden,
}

#[derive(Debug, Clone)]
enum RoutePattern {
    Exact(String),
    /// `<base>/**`: matches the base path itself and everything under it.
    Prefix(String),
}

impl RoutePattern {
    fn compile(pattern: &str) -> Self {
        match pattern.strip_suffix("/**") {
            Some(base) => Self::Prefix(base.to_string()),
            None => Self::Exact(pattern.to_string()),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == p,
            Self::Prefix(base) => {
                path == base
                    || path
                        .strip_prefix(base.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

#[derive(Debug, Clone)]
struct RouteRule {
    pattern: RoutePattern,
    access: AccessClass,
}

/// Ordered route rules, most specific first. First match wins; paths that
/// match nothing default to [`AccessClass::AuthenticatedAny`].
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    rules: Vec<RouteRule>,
}

impl RoutePolicy {
    pub fn new(table: &[(&str, AccessClass)]) -> Self {
        let rules = table
            .iter()
            .map(|(pattern, access)| RouteRule {
                pattern: RoutePattern::compile(pattern),
                access: *access,
            })
            .collect();

        Self { rules }
    }

    /// The gateway's route table.
    pub fn gateway_defaults() -> Self {
        use AccessClass::*;

        Self::new(&[
            ("/health", Public),
            ("/api/auth/**", Public),
            ("/api/admin/**", AdminOnly),
            ("/api/activities/**", UserOrAdmin),
            ("/api/goals/**", UserOrAdmin),
            ("/api/measurements/**", UserOrAdmin),
            ("/api/files/**", UserOrAdmin),
            ("/api/users/**", UserOrAdmin),
            ("/api/recommendations/**", UserOrAdmin),
        ])
    }

    fn class_for(&self, path: &str) -> AccessClass {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map(|rule| rule.access)
            .unwrap_or(AccessClass::AuthenticatedAny)
    }

    /// Evaluate the policy for one request.
    pub fn decide(&self, principal: Option<&Principal>, path: &str) -> Decision {
        match (self.class_for(path), principal) {
            (AccessClass::Public, _) => Decision::Allow,
            (_, None) => Decision::DenyUnauthenticated,
            (AccessClass::AuthenticatedAny, Some(_)) => Decision::Allow,
            (AccessClass::UserOrAdmin, Some(p)) => {
                if p.has_role("USER") || p.has_role("ADMIN") {
                    Decision::Allow
                } else {
                    Decision::DenyForbidden
                }
            }
            (AccessClass::AdminOnly, Some(p)) => {
                if p.has_role("ADMIN") {
                    Decision::Allow
                } else {
                    Decision::DenyForbidden
                }
            }
        }
    }
}
