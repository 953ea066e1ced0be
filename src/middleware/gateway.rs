use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::auth::{mask_key, Credentials};
use crate::error::ApiError;
use crate::rate_limit::identifier_for;

/// Front door for `/api/*`: quota check, then authentication.
///
/// The resolved [`crate::auth::AuthResult`] is stored in the request
/// extensions for handlers that want to know who is calling.
pub async fn gateway_middleware(State(state): State<Arc<AppState>>, mut request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let credentials = Credentials::from_headers(request.headers());
    let masked = mask_key(credentials.caller_key());

    let limiter = &state.rate_limiter;
    let mut remaining = None;
    if limiter.is_enabled() {
        let identifier = identifier_for(request.headers(), &credentials);
        let decision = limiter.check(&identifier);
        if !decision.allowed {
            let retry_after = decision.retry_after_secs(limiter.now_millis());
            tracing::warn!(%method, path = %path, key = %masked, retry_after, "rate limit exceeded");
            let mut response = ApiError::TooManyRequests { retry_after }.into_response();
            stamp(&mut response, limiter.max_requests(), 0);
            return response;
        }
        remaining = Some(decision.remaining);
    }

    let auth = state.auth.resolve(&credentials);
    if !auth.authenticated {
        let error = auth.error.clone().unwrap_or_else(|| "authentication required".to_string());
        tracing::warn!(%method, path = %path, key = %masked, status = 401, "rejected: {}", error);
        let mut response = ApiError::unauthorized(error).into_response();
        if let Some(remaining) = remaining {
            stamp(&mut response, limiter.max_requests(), remaining);
        }
        return response;
    }
    request.extensions_mut().insert(auth);

    let mut response = next.run(request).await;
    if let Some(remaining) = remaining {
        stamp(&mut response, limiter.max_requests(), remaining);
    }

    let status = response.status().as_u16();
    if response.status().is_server_error() {
        tracing::error!(%method, path = %path, status, key = %masked, "request failed");
    } else if response.status().is_client_error() {
        tracing::warn!(%method, path = %path, status, key = %masked, "request rejected");
    } else {
        tracing::info!(%method, path = %path, status, key = %masked, "request served");
    }
    response
}

fn stamp(response: &mut Response, limit: u32, remaining: u32) {
    let headers = response.headers_mut();
    headers.insert(HeaderName::from_static("x-ratelimit-limit"), HeaderValue::from(limit));
    headers.insert(HeaderName::from_static("x-ratelimit-remaining"), HeaderValue::from(remaining));
}
