use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
    pub slow_query_threshold_ms: u64,
}

/// Physical location of one logical database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub schema: String,
    pub table_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub tourwow: SchemaConfig,
    pub locations: SchemaConfig,
    pub suppliers: SchemaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub default_limit: i64,
    pub max_limit: i64,
    pub request_timeout_secs: u64,
    pub enable_mutations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub require_jwt: bool,
    pub allow_api_key_fallback: bool,
    pub require_api_key: bool,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    #[serde(skip_serializing)]
    pub api_keys: Vec<String>,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }
        if let Ok(v) = env::var("DATABASE_SLOW_QUERY_THRESHOLD_MS") {
            self.database.slow_query_threshold_ms = v.parse().unwrap_or(self.database.slow_query_threshold_ms);
        }

        // Catalog overrides
        override_schema(&mut self.catalog.tourwow, "TOURWOW");
        override_schema(&mut self.catalog.locations, "LOCATIONS");
        override_schema(&mut self.catalog.suppliers, "SUPPLIERS");

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_REQUESTS") {
            self.api.rate_limit_requests = v.parse().unwrap_or(self.api.rate_limit_requests);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_WINDOW_SECS") {
            self.api.rate_limit_window_secs = v.parse().unwrap_or(self.api.rate_limit_window_secs);
        }
        if let Ok(v) = env::var("API_DEFAULT_LIMIT") {
            self.api.default_limit = v.parse().unwrap_or(self.api.default_limit);
        }
        if let Ok(v) = env::var("API_MAX_LIMIT") {
            self.api.max_limit = v.parse().unwrap_or(self.api.max_limit);
        }
        if let Ok(v) = env::var("API_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = v.parse().unwrap_or(self.api.request_timeout_secs);
        }
        if let Ok(v) = env::var("API_ENABLE_MUTATIONS") {
            self.api.enable_mutations = v.parse().unwrap_or(self.api.enable_mutations);
        }

        // Security overrides
        if let Ok(v) = env::var("REQUIRE_JWT") {
            // Token auth stays on unless explicitly switched off
            self.security.require_jwt = v != "false";
        }
        if let Ok(v) = env::var("ALLOW_API_KEY_FALLBACK") {
            self.security.allow_api_key_fallback = v.parse().unwrap_or(self.security.allow_api_key_fallback);
        }
        if let Ok(v) = env::var("REQUIRE_API_KEY") {
            self.security.require_api_key = v.parse().unwrap_or(self.security.require_api_key);
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        let mut keys: Vec<String> = ["API_KEY_1", "API_KEY_2"]
            .iter()
            .filter_map(|name| env::var(name).ok())
            .collect();
        if let Ok(v) = env::var("API_KEYS") {
            keys.extend(v.split(',').map(|s| s.trim().to_string()));
        }
        keys.retain(|k| !k.is_empty());
        if !keys.is_empty() {
            self.security.api_keys = keys;
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: "mysql://root@localhost:3306/tourwow".to_string(),
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
                slow_query_threshold_ms: 100,
            },
            catalog: CatalogConfig::default(),
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 100,
                rate_limit_window_secs: 60,
                default_limit: 100,
                max_limit: 1000,
                request_timeout_secs: 30,
                enable_mutations: true,
            },
            security: SecurityConfig {
                require_jwt: true,
                allow_api_key_fallback: true,
                require_api_key: false,
                jwt_secret: String::new(),
                api_keys: vec![],
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:3001".to_string(),
                ],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                connection_timeout: 10,
                enable_query_logging: true,
                slow_query_threshold_ms: 500,
            },
            catalog: CatalogConfig::default(),
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 100,
                rate_limit_window_secs: 60,
                default_limit: 100,
                max_limit: 1000,
                request_timeout_secs: 15,
                enable_mutations: true,
            },
            security: SecurityConfig {
                require_jwt: true,
                allow_api_key_fallback: true,
                require_api_key: false,
                jwt_secret: String::new(),
                api_keys: vec![],
                cors_origins: vec!["https://staging-finance-backoffice-report.vercel.app".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                connection_timeout: 5,
                enable_query_logging: false,
                slow_query_threshold_ms: 1000,
            },
            catalog: CatalogConfig::default(),
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 100,
                rate_limit_window_secs: 60,
                default_limit: 100,
                max_limit: 1000,
                request_timeout_secs: 15,
                enable_mutations: false,
            },
            security: SecurityConfig {
                require_jwt: true,
                allow_api_key_fallback: false,
                require_api_key: false,
                jwt_secret: String::new(),
                api_keys: vec![],
                cors_origins: vec!["https://finance-backoffice-report.vercel.app".to_string()],
            },
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            tourwow: SchemaConfig { schema: "tourwow".to_string(), table_prefix: "v_Xqc7k7_".to_string() },
            locations: SchemaConfig { schema: "locations".to_string(), table_prefix: String::new() },
            suppliers: SchemaConfig { schema: "suppliers".to_string(), table_prefix: String::new() },
        }
    }
}

fn override_schema(target: &mut SchemaConfig, key: &str) {
    if let Ok(v) = env::var(format!("DB_NAME_{}", key)) {
        target.schema = v;
    }
    if let Ok(v) = env::var(format!("DB_PREFIX_{}", key)) {
        target.table_prefix = v;
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.security.require_jwt);
        assert!(config.security.allow_api_key_fallback);
        assert_eq!(config.api.max_limit, 1000);
        assert_eq!(config.api.default_limit, 100);
        assert!(config.api.enable_mutations);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.security.allow_api_key_fallback);
        assert!(!config.api.enable_mutations);
        assert!(config.api.enable_rate_limiting);
    }

    #[test]
    fn secrets_are_not_serialized() {
        let mut config = AppConfig::development();
        config.security.jwt_secret = "top-secret".to_string();
        config.security.api_keys = vec!["sk_live_123".to_string()];
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("sk_live_123"));
    }
}
