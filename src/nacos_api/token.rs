use crate::nacos_api::types::HarvestError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signing secret shipped as the server default (`nacos.core.auth.plugin.nacos.token.secret.key`)
pub const DEFAULT_SECRET_KEY: &str =
    "SecretKey012345678901234567890123456789012345678901234567890123456789";

/// Built-in administrator account
pub const DEFAULT_PRINCIPAL: &str = "nacos";

/// Lifetime the server itself gives console tokens
pub const DEFAULT_EXPIRY_SECONDS: i64 = 18_000;

/// Key material, principal and lifetime used to sign access tokens
///
/// The server base64-decodes its configured secret before using it as the
/// HMAC key and keys with the secret's ASCII bytes when that decoding fails.
/// [`SigningCredential::from_base64_secret`] applies the same rule, so it is
/// the constructor that reproduces server-issued signatures.
#[derive(Clone)]
pub struct SigningCredential {
    secret_key: Vec<u8>,
    principal: String,
    expiry_seconds: i64,
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("secret_key", &format_args!("<{} bytes>", self.secret_key.len()))
            .field("principal", &self.principal)
            .field("expiry_seconds", &self.expiry_seconds)
            .finish()
    }
}

impl SigningCredential {
    /// Create a credential from raw key bytes
    pub fn new(
        secret_key: impl Into<Vec<u8>>,
        principal: impl Into<String>,
        expiry_seconds: i64,
    ) -> Result<Self, HarvestError> {
        let secret_key = secret_key.into();
        if secret_key.is_empty() {
            return Err(HarvestError::Config(
                "secret key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            secret_key,
            principal: principal.into(),
            expiry_seconds,
        })
    }

    /// Create a credential from a configured secret, keyed the way the server keys it
    ///
    /// A secret that is not valid base64 (the shipped default is 69 characters,
    /// so it never is) signs with its ASCII bytes instead.
    pub fn from_base64_secret(
        secret: &str,
        principal: impl Into<String>,
        expiry_seconds: i64,
    ) -> Result<Self, HarvestError> {
        Self::new(server_key_bytes(secret), principal, expiry_seconds)
    }

    /// Credential for the server's default secret and administrator account
    pub fn server_default() -> Self {
        Self {
            secret_key: server_key_bytes(DEFAULT_SECRET_KEY),
            principal: DEFAULT_PRINCIPAL.to_string(),
            expiry_seconds: DEFAULT_EXPIRY_SECONDS,
        }
    }

    pub fn secret_key(&self) -> &[u8] {
        &self.secret_key
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn expiry_seconds(&self) -> i64 {
        self.expiry_seconds
    }
}

fn server_key_bytes(secret: &str) -> Vec<u8> {
    let secret = secret.trim();
    match BASE64.decode(secret) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::debug!("Secret is not base64 ({}), signing with its raw bytes", e);
            secret.as_bytes().to_vec()
        }
    }
}

/// Claims carried by a forged token
///
/// Field order matters: it fixes the serialized payload to `{"sub":..,"exp":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgedClaims {
    /// Principal the token authenticates as
    pub sub: String,
    /// Expiration time (Unix timestamp, seconds)
    pub exp: i64,
}

/// Compact signed token: `header.payload.signature`, each base64url without padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    compact: String,
}

impl Token {
    /// Parse a compact token, requiring exactly three non-empty segments
    pub fn parse(compact: impl Into<String>) -> Result<Self, HarvestError> {
        let compact = compact.into();
        let segments: Vec<&str> = compact.split('.').collect();
        if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(HarvestError::Token(format!(
                "expected three non-empty segments, found {}",
                segments.len()
            )));
        }
        Ok(Self { compact })
    }

    pub fn as_str(&self) -> &str {
        &self.compact
    }

    pub fn header_segment(&self) -> &str {
        self.segment(0)
    }

    pub fn payload_segment(&self) -> &str {
        self.segment(1)
    }

    pub fn signature_segment(&self) -> &str {
        self.segment(2)
    }

    fn segment(&self, index: usize) -> &str {
        self.compact.split('.').nth(index).unwrap_or_default()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compact)
    }
}

/// Forge a token that expires `expiry_seconds` from now
pub fn forge(credential: &SigningCredential) -> Result<Token, HarvestError> {
    forge_at(credential, Utc::now())
}

/// Forge a token as if the current time were `now`
///
/// Deterministic: the same credential and instant always yield the same token.
pub fn forge_at(credential: &SigningCredential, now: DateTime<Utc>) -> Result<Token, HarvestError> {
    let claims = ForgedClaims {
        sub: credential.principal.clone(),
        exp: now.timestamp().saturating_add(credential.expiry_seconds),
    };

    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(&credential.secret_key);
    let compact = encode(&header, &claims, &key)?;

    tracing::debug!(
        "Forged HS256 token for sub={}, exp={} (length: {})",
        claims.sub,
        claims.exp,
        compact.len()
    );

    Token::parse(compact)
}

/// Verify a token's signature against `credential` and return its claims
///
/// Expiry is not enforced; this only answers whether the key material
/// produced the signature.
pub fn decode_token(token: &Token, credential: &SigningCredential) -> Result<ForgedClaims, HarvestError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let key = DecodingKey::from_secret(&credential.secret_key);
    let data = decode::<ForgedClaims>(token.as_str(), &key, &validation)?;
    Ok(data.claims)
}
