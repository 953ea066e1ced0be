use std::sync::Arc;

use crate::config::SecurityConfig;

use super::verifier::{CredentialVerifier, Credentials, StaticKeyVerifier, TokenVerifier};
use super::AuthResult;

/// Which credential checks a deployment asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPolicy {
    pub require_token: bool,
    pub static_key_fallback: bool,
    pub require_static_key: bool,
}

impl From<&SecurityConfig> for AuthPolicy {
    fn from(security: &SecurityConfig) -> Self {
        Self {
            require_token: security.require_jwt,
            static_key_fallback: security.allow_api_key_fallback,
            require_static_key: security.require_api_key,
        }
    }
}

/// Ordered ladder of verifiers. The first one that authenticates wins; when
/// all fail, the primary verifier's error is reported. An empty ladder is the
/// explicit open mode.
#[derive(Clone)]
pub struct AuthResolver {
    verifiers: Vec<Arc<dyn CredentialVerifier>>,
}

impl AuthResolver {
    pub fn new(verifiers: Vec<Arc<dyn CredentialVerifier>>) -> Self {
        Self { verifiers }
    }

    pub fn from_config(security: &SecurityConfig) -> Self {
        let policy = AuthPolicy::from(security);
        let token: Arc<dyn CredentialVerifier> = Arc::new(TokenVerifier::new(security.jwt_secret.clone()));
        let static_key: Arc<dyn CredentialVerifier> = Arc::new(StaticKeyVerifier::new(&security.api_keys));
        Self::with_policy(policy, token, static_key)
    }

    pub fn with_policy(
        policy: AuthPolicy,
        token: Arc<dyn CredentialVerifier>,
        static_key: Arc<dyn CredentialVerifier>,
    ) -> Self {
        let verifiers = if policy.require_token {
            if policy.static_key_fallback {
                vec![token, static_key]
            } else {
                vec![token]
            }
        } else if policy.require_static_key {
            vec![static_key]
        } else {
            tracing::warn!("no authentication policy enabled; API is open");
            vec![]
        };
        Self { verifiers }
    }

    pub fn is_open(&self) -> bool {
        self.verifiers.is_empty()
    }

    pub fn resolve(&self, credentials: &Credentials) -> AuthResult {
        let mut first_failure: Option<AuthResult> = None;

        for verifier in &self.verifiers {
            let result = verifier.verify(credentials);
            if result.authenticated {
                return result;
            }
            first_failure.get_or_insert(result);
        }

        first_failure.unwrap_or_else(AuthResult::open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_token, AuthMethod, Claims};
    use chrono::Duration;

    const SECRET: &str = "resolver-secret";
    const KEY: &str = "sk_test_4f8b2c9e1a3d5f7b9c0e2a4d6f8b1c3e";

    fn resolver(policy: AuthPolicy) -> AuthResolver {
        AuthResolver::with_policy(
            policy,
            Arc::new(TokenVerifier::new(SECRET)),
            Arc::new(StaticKeyVerifier::new([KEY])),
        )
    }

    fn token_with_fallback() -> AuthPolicy {
        AuthPolicy { require_token: true, static_key_fallback: true, require_static_key: false }
    }

    #[test]
    fn valid_token_authenticates_by_token() {
        let token = generate_token(&Claims::new("9", Duration::minutes(10)), SECRET).unwrap();
        let creds = Credentials { authorization: Some(format!("Bearer {}", token)), api_key: None };
        let result = resolver(token_with_fallback()).resolve(&creds);
        assert!(result.authenticated);
        assert_eq!(result.method, AuthMethod::Token);
    }

    #[test]
    fn expired_token_falls_back_to_static_key() {
        let expired = generate_token(&Claims::new("9", Duration::hours(-1)), SECRET).unwrap();
        let creds = Credentials {
            authorization: Some(format!("Bearer {}", expired)),
            api_key: Some(KEY.to_string()),
        };
        let result = resolver(token_with_fallback()).resolve(&creds);
        assert!(result.authenticated);
        assert_eq!(result.method, AuthMethod::StaticKey);
    }

    #[test]
    fn neither_credential_is_rejected_as_invalid_token() {
        let creds = Credentials { authorization: Some("Bearer nope".into()), api_key: None };
        let result = resolver(token_with_fallback()).resolve(&creds);
        assert!(!result.authenticated);
        assert_eq!(result.error.as_deref(), Some("invalid token"));
    }

    #[test]
    fn token_only_policy_ignores_static_keys() {
        let policy = AuthPolicy { require_token: true, static_key_fallback: false, require_static_key: true };
        let creds = Credentials { authorization: None, api_key: Some(KEY.to_string()) };
        assert!(!resolver(policy).resolve(&creds).authenticated);
    }

    #[test]
    fn static_key_only_policy() {
        let policy = AuthPolicy { require_token: false, static_key_fallback: false, require_static_key: true };
        let good = Credentials { authorization: None, api_key: Some(KEY.to_string()) };
        let bad = Credentials { authorization: None, api_key: Some("sk_wrong".into()) };
        assert_eq!(resolver(policy).resolve(&good).method, AuthMethod::StaticKey);
        assert_eq!(resolver(policy).resolve(&bad).error.as_deref(), Some("invalid API key"));
    }

    #[test]
    fn no_policy_is_open_mode() {
        let policy = AuthPolicy { require_token: false, static_key_fallback: true, require_static_key: false };
        let resolver = resolver(policy);
        assert!(resolver.is_open());
        let result = resolver.resolve(&Credentials::default());
        assert!(result.authenticated);
        assert_eq!(result.method, AuthMethod::None);
    }
}
