//! Signed access-token issuance and verification.
//!
//! Tokens are compact JWS strings (three URL-safe base64 segments) signed
//! with HMAC-SHA-256 over a pre-shared secret. Nothing is stored server
//! side: a token's validity is a pure function of its own contents, the
//! signing secret and the current time.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;

/// Claims carried in an access token's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AccessClaims {
    /// Subject (user record key)
    sub: String,
    /// Role names granted to the subject
    roles: Vec<String>,
    /// Issued at (epoch seconds)
    iat: u64,
    /// Expiration time (epoch seconds)
    exp: u64,
}

/// Claims read back from a token that passed signature and expiry checks.
///
/// The only way to obtain one is [`TokenCodec::verify`]; there is no
/// accessor for the claims of an unverified token.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims {
    claims: AccessClaims,
}

impl VerifiedClaims {
    /// The verified subject (user record key).
    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    /// The verified role names.
    pub fn roles(&self) -> &[String] {
        &self.claims.roles
    }

    /// Issue time, epoch seconds.
    pub fn issued_at(&self) -> u64 {
        self.claims.iat
    }

    /// Expiry time, epoch seconds.
    pub fn expires_at(&self) -> u64 {
        self.claims.exp
    }
}

/// Why a token failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Not a parseable three-segment token, or claims do not match the
    /// expected shape.
    Malformed,
    /// Structure is fine but the signature does not match.
    InvalidSignature,
    /// Signature is fine but `exp` is in the past.
    Expired,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "Malformed token"),
            Self::InvalidSignature => write!(f, "Invalid token signature"),
            Self::Expired => write!(f, "Token expired"),
        }
    }
}

impl std::error::Error for TokenError {}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    }
}

/// Issues and verifies access tokens with a fixed symmetric key.
///
/// Construction happens once at startup; afterwards the codec is shared
/// read-only across requests.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    /// Build a codec from the gateway configuration, enforcing the
    /// minimum secret length.
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let secret = config.decoded_secret()?;
        Ok(Self::new(&secret, config.token_ttl()))
    }

    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact: a token one second past `exp` is dead.
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Issue a token for `subject` carrying `roles`, valid for the
    /// configured default lifetime.
    pub fn generate(&self, subject: &str, roles: Vec<String>) -> anyhow::Result<String> {
        self.generate_with_ttl(subject, roles, self.ttl)
    }

    /// Issue a token with an explicit lifetime.
    pub fn generate_with_ttl(
        &self,
        subject: &str,
        roles: Vec<String>,
        ttl: Duration,
    ) -> anyhow::Result<String> {
        let now = Utc::now().timestamp() as u64;
        let claims = AccessClaims {
            sub: subject.to_string(),
            roles,
            iat: now,
            exp: now + ttl.as_secs(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &AccessClaims) -> anyhow::Result<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("failed to sign token: {}", e))
    }

    /// Verify a token and return its claims.
    ///
    /// Recomputes the signature over the received segments (compared in
    /// constant time inside the JWS implementation), then checks expiry
    /// against the current time. Performs no I/O and mutates nothing.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        let data =
            decode::<AccessClaims>(token, &self.decoding_key, &self.validation).map_err(classify)?;

        Ok(VerifiedClaims {
            claims: data.claims,
        })
    }
}
