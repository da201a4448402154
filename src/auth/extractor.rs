//! Per-request authentication: bearer extraction and principal construction.

use std::sync::Arc;

use tracing::debug;

use crate::auth::principal::Principal;
use crate::auth::token::TokenCodec;

/// Turns a raw `Authorization` header value into an optional [`Principal`].
///
/// A missing header, an unrecognized scheme, or a token that fails
/// verification all yield `None`: the request simply proceeds anonymous.
/// Whether an anonymous request may reach its route is the authorization
/// policy's decision, not this component's; the two are deliberately kept
/// independent.
pub struct RequestAuthenticator {
    codec: Arc<TokenCodec>,
}

impl RequestAuthenticator {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    /// Derive the request principal from the bearer-credential header.
    pub fn authenticate(&self, authorization: Option<&str>) -> Option<Principal> {
        let token = authorization.and_then(bearer_token)?;

        match self.codec.verify(token) {
            Ok(claims) => Some(Principal::from_claims(&claims)),
            Err(err) => {
                debug!(error = %err, "ignoring unusable bearer token");
                None
            }
        }
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ").filter(|t| !t.is_empty())
}
