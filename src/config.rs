use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use std::{env, fs, path::PathBuf, time::Duration};

/// Minimum decoded signing-secret length. HMAC-SHA-256 wants at least a
/// 256-bit key; anything shorter is a configuration error.
pub const MIN_SECRET_BYTES: usize = 32;

/// Default access-token lifetime: 24 hours.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 86_400;

/// Gateway configuration, loaded once at startup and passed by reference
/// into the components that need it. Never read from ambient global state
/// after construction.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Base64-encoded symmetric signing secret (decodes to >= 32 bytes).
    pub jwt_secret: String,

    /// Access-token lifetime in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Frontend URL that federated callbacks redirect back to, carrying
    /// either `?token=` or `?error=`.
    #[serde(default = "default_redirect_uri")]
    pub oauth_redirect_uri: String,
}

fn default_token_ttl_secs() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

fn default_redirect_uri() -> String {
    "http://localhost:4200/oauth2/redirect".to_string()
}

impl GatewayConfig {
    /// Token lifetime as a [`Duration`].
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Decode the signing secret and enforce the minimum key length.
    pub fn decoded_secret(&self) -> anyhow::Result<Vec<u8>> {
        let bytes = BASE64
            .decode(self.jwt_secret.trim())
            .map_err(|e| anyhow::anyhow!("jwt_secret is not valid base64: {}", e))?;

        if bytes.len() < MIN_SECRET_BYTES {
            return Err(anyhow::anyhow!(
                "jwt_secret decodes to {} bytes; need at least {}",
                bytes.len(),
                MIN_SECRET_BYTES
            ));
        }

        Ok(bytes)
    }
}

pub fn resolve_gateway_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(p) = env::var("GATEWAY_CONFIG") {
        return Ok(PathBuf::from(p));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg).join("fitness-gateway").join("gateway.json");
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let candidate = PathBuf::from("gateway.json");
    if candidate.exists() {
        return Ok(candidate);
    }

    Err(anyhow::anyhow!(
        "Could not find gateway.json (set GATEWAY_CONFIG or create ./gateway.json)"
    ))
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            while let Some(c) = chars.next() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Ok(val) = env::var(&name) {
                out.push_str(&val);
            } else {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        } else {
            out.push(ch);
        }
    }

    out
}

fn expand_config(cfg: GatewayConfig) -> GatewayConfig {
    let mut cfg = cfg;
    cfg.jwt_secret = expand_env_vars(&cfg.jwt_secret);
    cfg.oauth_redirect_uri = expand_env_vars(&cfg.oauth_redirect_uri);
    cfg
}

/// Load the gateway configuration.
///
/// Prefers a `gateway.json` file (with `${ENV_VAR}` expansion in values);
/// falls back to plain environment variables when no file is present.
/// The decoded secret is validated here so misconfiguration fails at
/// startup, not on the first login.
pub fn load_gateway_config() -> anyhow::Result<GatewayConfig> {
    let cfg = match resolve_gateway_config_path() {
        Ok(path) => {
            let raw = fs::read_to_string(&path)?;
            let parsed: GatewayConfig = serde_json::from_str(&raw)?;
            expand_config(parsed)
        }
        Err(_) => from_env()?,
    };

    cfg.decoded_secret()?;
    Ok(cfg)
}

fn from_env() -> anyhow::Result<GatewayConfig> {
    let jwt_secret = env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set when no gateway.json exists"))?;

    let token_ttl_secs = match env::var("JWT_TTL_SECS") {
        Ok(v) => v
            .parse()
            .map_err(|_| anyhow::anyhow!("JWT_TTL_SECS is not a number: {}", v))?,
        Err(_) => DEFAULT_TOKEN_TTL_SECS,
    };

    let oauth_redirect_uri =
        env::var("OAUTH_REDIRECT_URI").unwrap_or_else(|_| default_redirect_uri());

    Ok(GatewayConfig {
        jwt_secret,
        token_ttl_secs,
        oauth_redirect_uri,
    })
}
