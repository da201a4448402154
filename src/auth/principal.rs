//! Request-scoped authenticated identity.

use std::collections::HashSet;

use crate::auth::token::VerifiedClaims;

/// The authenticated identity for a single request.
///
/// Built by the request authenticator from verified token claims and
/// attached to that request's extension map; it lives exactly as long as
/// the request and is never shared between requests or persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    subject: String,
    roles: HashSet<String>,
}

impl Principal {
    pub fn new(subject: impl Into<String>, roles: HashSet<String>) -> Self {
        Self {
            subject: subject.into(),
            roles,
        }
    }

    /// Derive a principal from verified claims.
    pub fn from_claims(claims: &VerifiedClaims) -> Self {
        Self {
            subject: claims.subject().to_string(),
            roles: claims.roles().iter().cloned().collect(),
        }
    }

    /// The user record key this principal resolves to.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The granted role names.
    pub fn roles(&self) -> &HashSet<String> {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("ADMIN")
    }
}
