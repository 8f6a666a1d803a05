//! Credit Ledger Tests
//!
//! Covers balances, spending, the daily bonus and ledger history. Every test
//! also checks that the stored balance matches the ledger.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use time::{Duration, OffsetDateTime};

use curio::app::ledger::{DailyBonusOutcome, LedgerService};

#[tokio::test]
async fn balance_reports_current_credits() {
    let app = app().await;
    let user = app.create_user_with("bal_read", "user", 42).await;

    let resp = app.get("/api/credits/balance", Some(&user.token)).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["credits"], 42);
}

// ===========================================================================
// Spending
// ===========================================================================

#[tokio::test]
async fn spend_debits_and_records_feature() {
    let app = app().await;
    let user = app.create_user("spend_ok").await;
    for _ in 0..3 {
        let content = app.insert_content("spend-earn", "active").await;
        app.post(&format!("/api/content/{}/share", content), Some(&user.token))
            .await;
    }

    let resp = app
        .post_json(
            "/api/credits/spend",
            json!({ "amount": 25, "feature": "ai_summary" }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK, "{:?}", resp.json());
    let data = resp.data();
    assert_eq!(data["remaining_credits"], 5);
    assert_eq!(data["transaction"]["type"], "debit");
    assert_eq!(data["transaction"]["amount"], 25);
    assert_eq!(data["transaction"]["reference"], "premium_feature");
    assert_eq!(data["transaction"]["description"], "Used credits for ai_summary");
    assert_eq!(app.balance(user.id).await, 5);
    assert_eq!(app.ledger_sum(user.id).await, 5);
}

#[tokio::test]
async fn spend_more_than_balance_is_rejected() {
    let app = app().await;
    let user = app.create_user("spend_broke").await;
    let content = app.insert_content("spend-broke", "active").await;
    app.post(&format!("/api/content/{}/share", content), Some(&user.token))
        .await;

    let resp = app
        .post_json(
            "/api/credits/spend",
            json!({ "amount": 11, "feature": "ai_summary" }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "Insufficient credits");
    assert_eq!(app.balance(user.id).await, 10);
    assert_eq!(app.ledger_sum(user.id).await, 10);
}

#[tokio::test]
async fn spend_requires_positive_amount_and_feature() {
    let app = app().await;
    let user = app.create_user_with("spend_invalid", "user", 100).await;

    for body in [
        json!({ "feature": "ai_summary" }),
        json!({ "amount": 10 }),
        json!({ "amount": 0, "feature": "ai_summary" }),
        json!({ "amount": -5, "feature": "ai_summary" }),
        json!({ "amount": 5, "feature": "   " }),
    ] {
        let resp = app
            .post_json("/api/credits/spend", body, Some(&user.token))
            .await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.error_message(), "Please provide amount and feature");
    }
    assert_eq!(app.balance(user.id).await, 100);
}

// ===========================================================================
// Daily bonus
// ===========================================================================

#[tokio::test]
async fn daily_bonus_once_per_day() {
    let app = app().await;
    let user = app.create_user("daily_once").await;

    let first = app.post("/api/credits/claim-daily", Some(&user.token)).await;
    let second = app.post("/api/credits/claim-daily", Some(&user.token)).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.data()["bonus_amount"], 25);
    assert_eq!(first.data()["new_balance"], 25);
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.error_message(), "Daily bonus already claimed today");
    assert_eq!(app.balance(user.id).await, 25);
    assert_eq!(app.ledger_sum(user.id).await, 25);
}

#[tokio::test]
async fn daily_bonus_available_again_next_utc_day() {
    let app = app().await;
    let user = app.create_user("daily_next").await;
    let ledger = LedgerService::new(app.state.db.clone());
    let today = OffsetDateTime::now_utc();
    let tomorrow = today + Duration::days(1);

    let first = ledger.claim_daily_bonus(user.id, today).await.unwrap();
    let repeat = ledger.claim_daily_bonus(user.id, today).await.unwrap();
    let next_day = ledger.claim_daily_bonus(user.id, tomorrow).await.unwrap();
    let next_day_repeat = ledger.claim_daily_bonus(user.id, tomorrow).await.unwrap();

    assert!(matches!(first, DailyBonusOutcome::Claimed(_)));
    assert!(matches!(repeat, DailyBonusOutcome::AlreadyClaimed));
    match next_day {
        DailyBonusOutcome::Claimed(change) => assert_eq!(change.balance, 50),
        _ => panic!("expected the bonus to be claimable on the next day"),
    }
    assert!(matches!(next_day_repeat, DailyBonusOutcome::AlreadyClaimed));
    assert_eq!(app.ledger_sum(user.id).await, 50);
}

#[tokio::test]
async fn daily_bonus_entry_is_stamped_with_the_claim_time() {
    let app = app().await;
    let user = app.create_user("daily_stamp").await;
    let ledger = LedgerService::new(app.state.db.clone());
    let claimed_at = OffsetDateTime::now_utc() + Duration::days(3);

    let outcome = ledger.claim_daily_bonus(user.id, claimed_at).await.unwrap();

    let DailyBonusOutcome::Claimed(change) = outcome else {
        panic!("expected the bonus to be granted");
    };
    assert_eq!(change.transaction.created_at.date(), claimed_at.date());
}

#[tokio::test]
async fn concurrent_daily_claims_grant_one_bonus() {
    let app = app().await;
    let user = app.create_user("daily_race").await;

    let (a, b) = tokio::join!(
        app.post("/api/credits/claim-daily", Some(&user.token)),
        app.post("/api/credits/claim-daily", Some(&user.token)),
    );

    let mut statuses = [a.status, b.status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);
    let rejected = if a.status == StatusCode::OK { &b } else { &a };
    assert_eq!(rejected.error_message(), "Daily bonus already claimed today");
    assert_eq!(app.balance(user.id).await, 25);
    assert_eq!(app.ledger_sum(user.id).await, 25);
}

// ===========================================================================
// History
// ===========================================================================

#[tokio::test]
async fn transactions_are_newest_first_and_filterable() {
    let app = app().await;
    let user = app.create_user("history").await;
    let content = app.insert_content("history-share", "active").await;
    app.post(&format!("/api/content/{}/share", content), Some(&user.token))
        .await;
    app.post("/api/credits/claim-daily", Some(&user.token)).await;
    app.post_json(
        "/api/credits/spend",
        json!({ "amount": 15, "feature": "export" }),
        Some(&user.token),
    )
    .await;

    let all = app.get("/api/credits/transactions", Some(&user.token)).await;
    assert_eq!(all.status, StatusCode::OK);
    let body = all.json();
    assert_eq!(body["total"], 3);
    let references: Vec<&str> = body["data"]["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tx| tx["reference"].as_str().unwrap())
        .collect();
    assert_eq!(
        references,
        vec!["premium_feature", "daily_login", "content_share"]
    );
    assert_eq!(
        body["data"]["transactions"][2]["content_title"],
        "history-share"
    );

    let debits = app
        .get("/api/credits/transactions?type=debit", Some(&user.token))
        .await;
    assert_eq!(debits.json()["total"], 1);
    assert_eq!(debits.data()["transactions"][0]["amount"], 15);

    // Unknown types are ignored
    let unknown = app
        .get("/api/credits/transactions?type=refund", Some(&user.token))
        .await;
    assert_eq!(unknown.status, StatusCode::OK);
    assert_eq!(unknown.json()["total"], 3);

    assert_eq!(app.balance(user.id).await, 20);
    assert_eq!(app.ledger_sum(user.id).await, 20);
}

#[tokio::test]
async fn transactions_are_private_to_the_caller() {
    let app = app().await;
    let earner = app.create_user("history_owner").await;
    let other = app.create_user("history_other").await;
    app.post("/api/credits/claim-daily", Some(&earner.token)).await;

    let resp = app.get("/api/credits/transactions", Some(&other.token)).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["total"], 0);
}
