use axum::{middleware as axum_middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::AppState;

mod auth;
mod error;
mod extract;
mod handlers;
pub mod middleware;
mod response;
mod routes;

pub use auth::AuthUser;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::users())
        .merge(routes::content())
        .merge(routes::credits())
        .merge(routes::moderation(&state))
        .merge(routes::admin(&state))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::ip_rate_limit_middleware,
        ));

    Router::new()
        .nest("/api", api)
        .fallback(handlers::not_found)
        .layer(RequestBodyLimitLayer::new(state.request_body_limit_bytes))
        .layer(axum_middleware::from_fn(
            middleware::body_limit::body_limit_envelope,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
