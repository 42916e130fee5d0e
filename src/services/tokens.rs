//! Access token signing/verification and opaque token generation.
//!
//! Access tokens are short-lived HS256 JWTs and carry identity. Refresh
//! and QR tokens are opaque random values; all their state is server-side.

use anyhow::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims embedded in every access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Standard JWT subject, the user id as a string
    pub sub: String,
    pub username: String,
    pub role: String,
    /// Unique token id (UUID v4)
    pub jti: String,
    /// Issued-at (unix timestamp, seconds)
    pub iat: i64,
    /// Expiry (unix timestamp, seconds)
    pub exp: i64,
}

/// Why a presented access token was rejected. Callers match on this to
/// pick the exact response; free-text inspection is never needed.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Token is invalid")]
    Invalid,

    #[error("Token verification failed: {0}")]
    Verification(String),
}

/// Sign an access token for a user
pub fn issue_access_token(
    secret: &str,
    user_id: i32,
    username: &str,
    role: &str,
    ttl_minutes: i64,
) -> Result<String> {
    let now = chrono::Utc::now();
    let claims = TokenClaims {
        sub: user_id.to_string(),
        username: username.to_string(),
        role: role.to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::minutes(ttl_minutes)).timestamp(),
    };

    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify a token's signature and expiry, returning its claims
pub fn verify_access_token(secret: &str, token: &str) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // No grace period: an expired token is expired
    validation.leeway = 0;

    let data = jsonwebtoken::decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|err| {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Invalid,
            _ => TokenError::Verification(err.to_string()),
        }
    })?;

    Ok(data.claims)
}

/// Opaque refresh token: 40 random bytes as 80 hex chars
#[must_use]
pub fn generate_refresh_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 40] = rng.random();
    to_hex(&bytes)
}

/// Opaque QR capability token: 32 random bytes as 64 hex chars
#[must_use]
pub fn generate_qr_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    to_hex(&bytes)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
            use std::fmt::Write;
            let _ = write!(acc, "{b:02x}");
            acc
        })
}
