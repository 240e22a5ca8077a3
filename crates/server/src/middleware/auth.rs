use axum::{
    Json,
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ErrorBody;

/// Header name for API key authentication
pub const API_KEY_HEADER: &str = "X-API-Key";

/// API Key authentication state
#[derive(Clone)]
pub struct ApiKeyAuth {
    api_key: Option<String>,
}

impl ApiKeyAuth {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }
}

/// Reject protected requests without a matching API key.
/// A server configured without API_KEY leaves the routes open.
pub async fn auth_middleware(request: Request<Body>, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<ApiKeyAuth>()
        .and_then(|auth| auth.api_key.clone());

    if let Some(expected) = expected {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());

        if provided != Some(expected.as_str()) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody::new("Invalid or missing API key")),
            )
                .into_response();
        }
    }

    next.run(request).await
}
