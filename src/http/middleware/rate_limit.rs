use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;

use crate::app::rate_limiter::RateLimiter;
use crate::http::AppError;
use crate::AppState;

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Blanket per-IP ceiling for every API route.
pub async fn ip_rate_limit_middleware(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ConnectInfo(addr)) = connect_info else {
        return Ok(next.run(request).await);
    };

    let ip = addr.ip().to_string();
    let rate_limiter = RateLimiter::new(state.cache.clone());

    let info = match rate_limiter.check_ip(&ip, &state.rate_limit).await {
        Ok(info) => info,
        Err(err) => {
            // Fail open while Redis is unavailable.
            tracing::warn!(error = ?err, "failed to check IP rate limit");
            return Ok(next.run(request).await);
        }
    };

    let mut response = if info.limited {
        tracing::warn!(ip = %ip, "IP rate limit exceeded");
        AppError::rate_limited(format!(
            "Too many requests from this IP, please try again after {} minutes",
            state.rate_limit.window_seconds / 60
        ))
        .into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(LIMIT_HEADER, HeaderValue::from(info.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(info.remaining));

    Ok(response)
}
