//! Claim integration tests.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::TestHarness;
use faucet_core::{ClaimPolicy, ReferralBonus, RewardRange};
use serde_json::{json, Value};

// ============================================================================
// Successful claims
// ============================================================================

#[tokio::test]
async fn first_claim_creates_account_and_pays() {
    let harness = TestHarness::new();

    let body = harness.claim("42").await;

    assert_eq!(body["status"], "success");
    let earned = body["points_earned"].as_i64().unwrap();
    assert!((10..=100).contains(&earned));
    assert_eq!(body["new_balance"], earned);
    assert_eq!(body["referrer_bonus"], 0);
    assert!(body["last_claim"].is_string());

    assert_eq!(harness.balance("42").await, earned);
}

#[tokio::test]
async fn numeric_user_id_is_accepted() {
    let harness = TestHarness::with_fixed_reward(20);

    let response = harness
        .server
        .post("/claim")
        .json(&json!({ "user_id": 42 }))
        .await;

    response.assert_status_ok();
    assert_eq!(harness.balance("42").await, 20);
}

#[tokio::test]
async fn watched_ad_doubles_reward() {
    let harness = TestHarness::with_fixed_reward(20);

    let response = harness
        .server
        .post("/claim")
        .json(&json!({ "user_id": "42", "watched_ad": true }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["points_earned"], 40);
}

#[tokio::test]
async fn watchads_route_applies_multiplier() {
    let harness = TestHarness::with_fixed_reward(15);

    let response = harness
        .server
        .post("/watchads")
        .json(&json!({ "user_id": "42" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["points_earned"], 30);
    assert_eq!(body["new_balance"], 30);
}

// ============================================================================
// Cooldown
// ============================================================================

#[tokio::test]
async fn second_claim_hits_cooldown() {
    let harness = TestHarness::with_fixed_reward(50);
    harness.claim("42").await;

    let response = harness
        .server
        .post("/claim")
        .json(&json!({ "user_id": "42" }))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "cooldown");
    let remaining = body["remaining_seconds"].as_u64().unwrap();
    assert!(remaining > 0 && remaining <= 300);
    assert_eq!(
        response.header("retry-after").to_str().unwrap(),
        remaining.to_string()
    );

    // Nothing was credited by the rejected claim.
    assert_eq!(harness.balance("42").await, 50);
}

#[tokio::test]
async fn zero_cooldown_allows_repeat_claims() {
    let harness = TestHarness::with_policy(ClaimPolicy {
        reward_range: RewardRange::new(10, 10).unwrap(),
        cooldown: Duration::ZERO,
        ..ClaimPolicy::default()
    });

    harness.claim("42").await;
    harness.claim("42").await;

    assert_eq!(harness.balance("42").await, 20);
}

// ============================================================================
// Referral bonus
// ============================================================================

#[tokio::test]
async fn referee_claim_credits_referrer() {
    let harness = TestHarness::with_policy(ClaimPolicy {
        reward_range: RewardRange::new(60, 60).unwrap(),
        referral_bonus: ReferralBonus::Percent(10),
        ..ClaimPolicy::default()
    });
    harness.create_user("1", "Referrer").await;
    harness
        .server
        .post("/register-referral")
        .json(&json!({ "user_id": "7", "referrer_id": "1" }))
        .await
        .assert_status_ok();

    let body = harness.claim("7").await;

    assert_eq!(body["points_earned"], 60);
    assert_eq!(body["referrer_bonus"], 6);
    assert_eq!(harness.balance("1").await, 6);
    assert_eq!(harness.balance("7").await, 60);
}

// ============================================================================
// Validation and failures
// ============================================================================

#[tokio::test]
async fn missing_user_id_is_rejected() {
    let harness = TestHarness::new();

    let response = harness.server.post("/claim").json(&json!({})).await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["code"], "bad_request");
    assert_eq!(body["message"], "user_id required");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/claim")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;

    assert!(response.status_code().is_client_error());
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn storage_outage_returns_503() {
    let harness = TestHarness::new();
    harness.backend.set_unavailable(true);

    let response = harness
        .server
        .post("/claim")
        .json(&json!({ "user_id": "42" }))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["code"], "storage_unavailable");
    // Backend detail stays in the logs.
    assert!(!body["message"].as_str().unwrap().contains("memory"));
}
