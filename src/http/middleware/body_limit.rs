use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::AppError;

pub const BODY_TOO_LARGE: &str = "Request body too large";

/// Rewrites the body-limit layer's plain-text 413 into the error envelope.
pub async fn body_limit_envelope(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if is_json {
        return response;
    }

    tracing::debug!("request body over limit");
    AppError::new(StatusCode::PAYLOAD_TOO_LARGE, BODY_TOO_LARGE).into_response()
}
