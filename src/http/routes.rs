use axum::{middleware, routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::domain::user::Role;
use crate::http::handlers;
use crate::http::middleware::role::{require_role, RoleGate};
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/me", get(handlers::get_me))
        .route("/auth/update-password", patch(handlers::update_password))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users/profile", patch(handlers::update_profile))
        .route("/users/profile/:id", get(handlers::get_user_profile))
        .route("/users/transactions", get(handlers::list_user_transactions))
        .route("/users/saved-content", get(handlers::list_saved_content))
        .route("/users/delete-account", delete(handlers::delete_account))
}

pub fn content() -> Router<AppState> {
    Router::new()
        .route(
            "/content",
            get(handlers::list_content).post(handlers::create_content),
        )
        .route("/content/:id", get(handlers::get_content))
        .route("/content/:id/save", post(handlers::save_content))
        .route("/content/:id/unsave", delete(handlers::unsave_content))
        .route("/content/:id/flag", post(handlers::flag_content))
        .route("/content/:id/share", post(handlers::share_content))
}

pub fn credits() -> Router<AppState> {
    Router::new()
        .route("/credits/balance", get(handlers::get_balance))
        .route("/credits/spend", post(handlers::spend_credits))
        .route("/credits/claim-daily", post(handlers::claim_daily_bonus))
        .route(
            "/credits/transactions",
            get(handlers::list_credit_transactions),
        )
}

/// Report triage, open to moderators and admins.
pub fn moderation(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/reports", get(handlers::list_reports))
        .route("/admin/reports/:id", get(handlers::get_report))
        .route("/admin/reports/:id/resolve", patch(handlers::resolve_report))
        .route("/admin/flagged-content", get(handlers::list_flagged_content))
        .route("/admin/most-saved", get(handlers::list_most_saved))
        .route("/admin/most-saved-posts", get(handlers::list_most_saved))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::new(state.clone(), Role::Moderator),
            require_role,
        ))
}

/// User management and platform stats, admins only.
pub fn admin(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(handlers::dashboard_stats))
        .route("/admin/users", get(handlers::list_users))
        .route("/admin/users/:id/role", patch(handlers::update_user_role))
        .route("/admin/users/:id/status", patch(handlers::update_user_status))
        .route("/admin/users/:id/credits", patch(handlers::adjust_user_credits))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::new(state.clone(), Role::Admin),
            require_role,
        ))
}
