use std::collections::HashSet;

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

use super::{verify_token, AuthError, AuthMethod, AuthResult};

/// Raw credential material pulled from the request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub authorization: Option<String>,
    pub api_key: Option<String>,
}

impl Credentials {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        Self {
            authorization: read("authorization"),
            api_key: read("x-api-key"),
        }
    }

    /// The `authorization` value with any `Bearer ` prefix removed.
    pub fn bearer(&self) -> Option<&str> {
        self.authorization.as_deref().map(|raw| raw.strip_prefix("Bearer ").unwrap_or(raw).trim())
    }

    /// Token candidate: `authorization` first, then `x-api-key`.
    pub fn token(&self) -> Option<&str> {
        self.bearer().or(self.api_key.as_deref())
    }

    /// Static key candidates: `x-api-key` first, then `authorization`.
    pub fn key_candidates(&self) -> impl Iterator<Item = &str> {
        self.api_key.as_deref().into_iter().chain(self.bearer())
    }

    /// Caller-supplied key used for rate limiting and log masking.
    pub fn caller_key(&self) -> Option<&str> {
        self.api_key.as_deref().or(self.authorization.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.authorization.is_none() && self.api_key.is_none()
    }
}

/// One authentication strategy. The resolver tries these in order.
pub trait CredentialVerifier: Send + Sync {
    fn method(&self) -> AuthMethod;

    fn verify(&self, credentials: &Credentials) -> AuthResult;
}

/// Signed bearer token (HS256, shared secret).
pub struct TokenVerifier {
    secret: String,
}

impl TokenVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if secret.is_empty() {
            tracing::warn!("token verification enabled without JWT_SECRET; every token will be rejected");
        }
        Self { secret }
    }
}

impl CredentialVerifier for TokenVerifier {
    fn method(&self) -> AuthMethod {
        AuthMethod::Token
    }

    fn verify(&self, credentials: &Credentials) -> AuthResult {
        let Some(token) = credentials.token() else {
            tracing::debug!("no token provided in headers");
            return AuthResult::rejected("invalid token");
        };

        match verify_token(token, &self.secret) {
            Ok(claims) => {
                tracing::debug!("token verified for user: {}", claims.display_name());
                AuthResult::token(claims)
            }
            Err(AuthError::Expired) => {
                tracing::debug!("token expired");
                AuthResult::rejected("invalid token")
            }
            Err(e) => {
                tracing::debug!("token rejected: {}", e);
                AuthResult::rejected("invalid token")
            }
        }
    }
}

/// Membership test against a fixed set of opaque keys. Keys are held as
/// SHA-256 digests so the comparison does not depend on key length.
pub struct StaticKeyVerifier {
    digests: HashSet<[u8; 32]>,
}

impl StaticKeyVerifier {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let digests = keys
            .into_iter()
            .filter_map(|k| {
                let k = k.as_ref();
                (!k.is_empty()).then(|| digest(k))
            })
            .collect();
        Self { digests }
    }

    pub fn contains(&self, key: &str) -> bool {
        !key.is_empty() && self.digests.contains(&digest(key))
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

impl CredentialVerifier for StaticKeyVerifier {
    fn method(&self) -> AuthMethod {
        AuthMethod::StaticKey
    }

    fn verify(&self, credentials: &Credentials) -> AuthResult {
        if credentials.key_candidates().any(|k| self.contains(k)) {
            AuthResult::static_key()
        } else {
            AuthResult::rejected("invalid API key")
        }
    }
}

fn digest(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_token, Claims};
    use axum::http::HeaderValue;
    use chrono::Duration;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn strips_bearer_prefix() {
        let creds = Credentials::from_headers(&headers(&[("authorization", "Bearer abc.def.ghi")]));
        assert_eq!(creds.token(), Some("abc.def.ghi"));
    }

    #[test]
    fn authorization_wins_over_api_key_for_tokens() {
        let creds = Credentials::from_headers(&headers(&[
            ("authorization", "tok-from-auth"),
            ("x-api-key", "tok-from-key"),
        ]));
        assert_eq!(creds.token(), Some("tok-from-auth"));
        let candidates: Vec<&str> = creds.key_candidates().collect();
        assert_eq!(candidates, vec!["tok-from-key", "tok-from-auth"]);
    }

    #[test]
    fn token_verifier_accepts_signed_token() {
        let token = generate_token(&Claims::new("1", Duration::minutes(5)), "s3cret").unwrap();
        let creds = Credentials { authorization: Some(format!("Bearer {}", token)), api_key: None };
        let result = TokenVerifier::new("s3cret").verify(&creds);
        assert!(result.authenticated);
        assert_eq!(result.method, AuthMethod::Token);
        assert!(result.subject.is_some());
    }

    #[test]
    fn static_keys_match_either_header() {
        let verifier = StaticKeyVerifier::new(["sk_test_one", "sk_test_two"]);
        let via_key = Credentials { authorization: None, api_key: Some("sk_test_two".into()) };
        let via_auth = Credentials { authorization: Some("Bearer sk_test_one".into()), api_key: None };
        let wrong = Credentials { authorization: None, api_key: Some("sk_test_three".into()) };

        assert_eq!(verifier.verify(&via_key).method, AuthMethod::StaticKey);
        assert!(verifier.verify(&via_auth).authenticated);
        assert!(!verifier.verify(&wrong).authenticated);
    }

    #[test]
    fn empty_keys_are_ignored() {
        let verifier = StaticKeyVerifier::new(["", "sk_real"]);
        assert_eq!(verifier.len(), 1);
        assert!(!verifier.contains(""));
    }
}
