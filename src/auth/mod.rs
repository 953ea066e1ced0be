pub mod resolver;
pub mod verifier;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use resolver::{AuthPolicy, AuthResolver};
pub use verifier::{CredentialVerifier, Credentials, StaticKeyVerifier, TokenVerifier};

/// Claims carried by the back-office token. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    pub fn new(sub: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: Some(sub.into()),
            username: None,
            email: None,
            role: None,
            iat: Some(now.timestamp()),
            exp: (now + ttl).timestamp(),
            extra: Map::new(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Best display name for logs: username, then subject.
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.sub.as_deref())
            .unwrap_or("unknown")
    }
}

/// How a request ended up authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Token,
    StaticKey,
    None,
}

/// Outcome of authenticating one request. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthResult {
    pub authenticated: bool,
    pub method: AuthMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Claims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthResult {
    pub fn token(claims: Claims) -> Self {
        Self { authenticated: true, method: AuthMethod::Token, subject: Some(claims), error: None }
    }

    pub fn static_key() -> Self {
        Self { authenticated: true, method: AuthMethod::StaticKey, subject: None, error: None }
    }

    pub fn open() -> Self {
        Self { authenticated: true, method: AuthMethod::None, subject: None, error: None }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self { authenticated: false, method: AuthMethod::None, subject: None, error: Some(error.into()) }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("JWT secret not configured")]
    MissingSecret,

    #[error("token expired")]
    Expired,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token generation failed: {0}")]
    TokenGeneration(String),
}

/// Verify an HS256 token against the shared secret, including expiry.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            _ => AuthError::Malformed(e.to_string()),
        })
}

pub fn generate_token(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &encoding_key)
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

/// Shorten a credential for logging: first 10 characters, or "none".
pub fn mask_key(key: Option<&str>) -> String {
    match key {
        Some(k) if !k.is_empty() => {
            let prefix: String = k.chars().take(10).collect();
            format!("{}...", prefix)
        }
        _ => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn round_trips_claims_through_token() {
        let claims = Claims::new("42", Duration::hours(1)).with_username("somchai").with_role("finance");
        let token = generate_token(&claims, SECRET).unwrap();
        let decoded = verify_token(&token, SECRET).unwrap();
        assert_eq!(decoded.username.as_deref(), Some("somchai"));
        assert_eq!(decoded.display_name(), "somchai");
    }

    #[test]
    fn rejects_expired_token() {
        let claims = Claims::new("42", Duration::hours(-2));
        let token = generate_token(&claims, SECRET).unwrap();
        assert_eq!(verify_token(&token, SECRET), Err(AuthError::Expired));
    }

    #[test]
    fn rejects_wrong_secret() {
        let claims = Claims::new("42", Duration::hours(1));
        let token = generate_token(&claims, SECRET).unwrap();
        assert_eq!(verify_token(&token, "other-secret"), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn rejects_garbage_and_missing_secret() {
        assert!(matches!(verify_token("not-a-jwt", SECRET), Err(AuthError::Malformed(_))));
        assert_eq!(verify_token("a.b.c", ""), Err(AuthError::MissingSecret));
    }

    #[test]
    fn keeps_unknown_claims() {
        let mut claims = Claims::new("7", Duration::hours(1));
        claims.extra.insert("branch".into(), Value::String("BKK".into()));
        let token = generate_token(&claims, SECRET).unwrap();
        let decoded = verify_token(&token, SECRET).unwrap();
        assert_eq!(decoded.extra.get("branch"), Some(&Value::String("BKK".into())));
    }

    #[test]
    fn masks_keys_for_logging() {
        assert_eq!(mask_key(Some("sk_test_4f8b2c9e1a3d")), "sk_test_4f...");
        assert_eq!(mask_key(Some("")), "none");
        assert_eq!(mask_key(None), "none");
    }
}
