//! Authentication and authorization for the gateway.
//!
//! Everything security-sensitive lives here:
//!
//! - **Token codec**: issues and verifies signed, self-contained access
//!   tokens (HMAC-SHA-256, stateless).
//! - **Credential verifier**: Argon2 password hashing and verification.
//! - **Federated linker**: reconciles third-party identity assertions
//!   with local user records.
//! - **Request authenticator**: derives an optional request [`Principal`]
//!   from the bearer header; never rejects on its own.
//! - **Route policy**: the ordered route-to-role table evaluated after
//!   authentication.
//!
//! ## Security Model
//!
//! - Token validity is a pure function of (token, secret, current time).
//! - A present-but-invalid token is treated exactly like a missing one:
//!   the request proceeds anonymous and the route policy decides.
//! - Login failures never reveal which credential factor was wrong.
//! - A federated provider can never claim an email owned by another
//!   provider's account.

mod extractor;
mod federated;
mod password;
mod policy;
mod principal;
mod token;

pub use extractor::RequestAuthenticator;
pub use federated::{FederatedProfile, IdentityLinker, LinkError, normalize_email};
pub use password::{PasswordError, hash_password, verify_password};
pub use policy::{AccessClass, Decision, RoutePolicy};
pub use principal::Principal;
pub use token::{TokenCodec, TokenError, VerifiedClaims};
