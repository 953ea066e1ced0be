use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::AuthResolver;
use crate::catalog::{CatalogRouter, CatalogSource};
use crate::config::AppConfig;
use crate::database::QueryExecutor;
use crate::handlers::{protected, public};
use crate::middleware::gateway_middleware;
use crate::rate_limit::{InMemoryRateLimitStore, RateLimiter};
use crate::services::{DiscoveryService, MutationService, QueryService};

/// Everything a request needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub catalog: CatalogRouter,
    pub executor: Arc<dyn QueryExecutor>,
    pub auth: AuthResolver,
    pub rate_limiter: RateLimiter,
    pub query: QueryService,
    pub discovery: DiscoveryService,
    pub mutations: MutationService,
}

impl AppState {
    pub fn new(config: AppConfig, source: Arc<dyn CatalogSource>, executor: Arc<dyn QueryExecutor>) -> Self {
        let catalog = CatalogRouter::new(&config.catalog, source);
        let rate_limiter = if config.api.enable_rate_limiting {
            RateLimiter::new(
                Arc::new(InMemoryRateLimitStore::default()),
                config.api.rate_limit_requests,
                Duration::from_secs(config.api.rate_limit_window_secs),
            )
        } else {
            RateLimiter::disabled()
        };

        Self {
            auth: AuthResolver::from_config(&config.security),
            query: QueryService::new(catalog.clone(), executor.clone(), &config.api),
            discovery: DiscoveryService::new(catalog.clone(), &config.api),
            mutations: MutationService::new(catalog.clone(), executor.clone(), &config.api),
            rate_limiter,
            catalog,
            executor,
            config,
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn with_auth(mut self, auth: AuthResolver) -> Self {
        self.auth = auth;
        self
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    // Outer guard; the services enforce their own deadline first and answer 504.
    let outer_timeout = Duration::from_secs(state.config.api.request_timeout_secs.max(1) + 5);

    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(api_routes(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(outer_timeout))
                .layer(cors_layer(&state.config.security.cors_origins)),
        )
        .with_state(state)
}

fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/database/query", get(protected::query_get).post(protected::query_post))
        .route("/api/database/tables", get(protected::database_tables))
        .route("/api/database/schema", get(protected::database_schema))
        .route("/api/tables", get(protected::tables_index))
        .route("/api/tables/:database", get(protected::tables_database))
        .route(
            "/api/tables/:database/:table",
            get(protected::table_query)
                .post(protected::record_insert)
                .put(protected::record_update)
                .delete(protected::record_delete),
        )
        .route_layer(from_fn_with_state(state, gateway_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-requested-with"),
        ])
        .max_age(Duration::from_secs(86400))
}
