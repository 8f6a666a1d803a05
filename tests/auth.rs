//! Authentication Tests
//!
//! Covers registration, login, token handling and the per-request caller load.

mod common;

use axum::http::StatusCode;
use common::{app, DEFAULT_PASSWORD};
use serde_json::json;

// ===========================================================================
// Registration
// ===========================================================================

#[tokio::test]
async fn register_returns_token_and_signup_balance() {
    let app = app().await;

    let resp = app
        .post_json(
            "/api/auth/register",
            json!({
                "username": "reg_valid",
                "email": "Reg_Valid@Example.com",
                "password": "supersecret1"
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK, "{:?}", resp.json());
    let body = resp.json();
    assert_eq!(body["status"], "success");
    assert!(body["token"].is_string());
    assert_eq!(body["data"]["user"]["username"], "reg_valid");
    assert_eq!(body["data"]["user"]["email"], "reg_valid@example.com");
    assert_eq!(body["data"]["user"]["role"], "user");
    assert_eq!(body["data"]["user"]["status"], "active");
    assert_eq!(body["data"]["user"]["credits"], 100);
    assert!(body["data"]["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn register_duplicate_email() {
    let app = app().await;
    let existing = app.create_user("dup_email").await;

    let resp = app
        .post_json(
            "/api/auth/register",
            json!({
                "username": "someone_new",
                "email": existing.email,
                "password": "supersecret1"
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "Email already in use");
    assert_eq!(resp.json()["status"], "error");
}

#[tokio::test]
async fn register_duplicate_username() {
    let app = app().await;
    let existing = app.create_user("dup_name").await;

    let resp = app
        .post_json(
            "/api/auth/register",
            json!({
                "username": existing.username,
                "email": "fresh_dup_name@example.com",
                "password": "supersecret1"
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "Username already taken");
}

#[tokio::test]
async fn register_short_password() {
    let app = app().await;

    let resp = app
        .post_json(
            "/api/auth/register",
            json!({
                "username": "short_pw",
                "email": "short_pw@example.com",
                "password": "short"
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "Password must be at least 8 characters");
}

#[tokio::test]
async fn register_missing_fields() {
    let app = app().await;

    let resp = app
        .post_json("/api/auth/register", json!({ "username": "only_name" }), None)
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.error_message(),
        "Please provide username, email and password"
    );
}

#[tokio::test]
async fn register_malformed_json() {
    let app = app().await;

    let resp = app
        .request(
            axum::http::Method::POST,
            "/api/auth/register",
            None,
            &[("content-type", "application/json")],
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["status"], "error");
}

// ===========================================================================
// Login
// ===========================================================================

#[tokio::test]
async fn login_with_email() {
    let app = app().await;
    let user = app.create_user("login_email").await;

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({ "email": user.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert!(body["token"].is_string());
    assert_eq!(body["data"]["user"]["id"], user.id.to_string());
}

#[tokio::test]
async fn login_with_username() {
    let app = app().await;
    let user = app.create_user("login_name").await;

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({ "email": user.username, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["user"]["username"], user.username);
}

#[tokio::test]
async fn login_wrong_password_and_unknown_user_share_message() {
    let app = app().await;
    let user = app.create_user("login_bad").await;

    let wrong = app
        .post_json(
            "/api/auth/login",
            json!({ "email": user.email, "password": "wrong_password" }),
            None,
        )
        .await;
    let unknown = app
        .post_json(
            "/api/auth/login",
            json!({ "email": "nobody@example.com", "password": "whatever123" }),
            None,
        )
        .await;

    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.error_message(), "Incorrect email or password");
    assert_eq!(wrong.error_message(), unknown.error_message());
}

#[tokio::test]
async fn login_suspended_account_is_forbidden() {
    let app = app().await;
    let user = app.create_user("login_suspended").await;
    sqlx::query("UPDATE users SET status = 'suspended' WHERE id = $1")
        .bind(user.id)
        .execute(app.pool())
        .await
        .unwrap();

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({ "email": user.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(
        resp.error_message(),
        "Your account is not active. Please contact support."
    );
}

#[tokio::test]
async fn login_missing_password() {
    let app = app().await;

    let resp = app
        .post_json("/api/auth/login", json!({ "email": "a@example.com" }), None)
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.error_message(),
        "Please provide email/username and password"
    );
}

// ===========================================================================
// Tokens and the current user
// ===========================================================================

#[tokio::test]
async fn me_returns_caller() {
    let app = app().await;
    let user = app.create_user("me_ok").await;

    let resp = app.get("/api/auth/me", Some(&user.token)).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["user"]["id"], user.id.to_string());
    assert_eq!(resp.data()["user"]["credits"], 0);
}

#[tokio::test]
async fn me_without_token() {
    let app = app().await;

    let resp = app.get("/api/auth/me", None).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json()["status"], "error");
}

#[tokio::test]
async fn me_with_garbage_token() {
    let app = app().await;

    let resp = app.get("/api/auth/me", Some("v4.local.garbage")).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_of_banned_user_is_rejected() {
    let app = app().await;
    let user = app.create_user("me_banned").await;
    sqlx::query("UPDATE users SET status = 'banned' WHERE id = $1")
        .bind(user.id)
        .execute(app.pool())
        .await
        .unwrap();

    let resp = app.get("/api/auth/me", Some(&user.token)).await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn token_of_deleted_user_is_rejected() {
    let app = app().await;
    let user = app.create_user("me_deleted").await;
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.id)
        .execute(app.pool())
        .await
        .unwrap();

    let resp = app.get("/api/auth/me", Some(&user.token)).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Password update
// ===========================================================================

#[tokio::test]
async fn update_password_issues_new_token_and_changes_login() {
    let app = app().await;
    let user = app.create_user("pw_update").await;

    let resp = app
        .patch_json(
            "/api/auth/update-password",
            json!({ "current_password": DEFAULT_PASSWORD, "new_password": "brand-new-pass" }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json()["token"].is_string());

    let old_login = app
        .post_json(
            "/api/auth/login",
            json!({ "email": user.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;
    assert_eq!(old_login.status, StatusCode::UNAUTHORIZED);

    let new_login = app
        .post_json(
            "/api/auth/login",
            json!({ "email": user.email, "password": "brand-new-pass" }),
            None,
        )
        .await;
    assert_eq!(new_login.status, StatusCode::OK);
}

#[tokio::test]
async fn update_password_wrong_current() {
    let app = app().await;
    let user = app.create_user("pw_wrong").await;

    let resp = app
        .patch_json(
            "/api/auth/update-password",
            json!({ "currentPassword": "not-my-password", "newPassword": "brand-new-pass" }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "Your current password is incorrect");
}

// ===========================================================================
// Routing and envelope
// ===========================================================================

#[tokio::test]
async fn unknown_route_returns_envelope_404() {
    let app = app().await;

    let resp = app.get("/api/does-not-exist", None).await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(
        resp.error_message(),
        "Can't find /api/does-not-exist on this server!"
    );
}

#[tokio::test]
async fn health_reports_dependencies() {
    let app = app().await;

    let resp = app.get("/api/health", None).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
    assert!(resp.headers.contains_key("x-ratelimit-limit"));
    assert!(resp.headers.contains_key("x-ratelimit-remaining"));
}
