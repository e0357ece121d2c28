//! Task, balance and leaderboard integration tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::{json, Value};

// ============================================================================
// Tasks
// ============================================================================

#[tokio::test]
async fn list_tasks_without_user() {
    let harness = TestHarness::new();

    let response = harness.server.get("/get-tasks").await;

    response.assert_status_ok();
    let body: Value = response.json();
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["name"], "join_channel");
    assert_eq!(tasks[0]["reward"], 50);
    assert_eq!(tasks[0]["completed"], false);
}

#[tokio::test]
async fn complete_task_pays_once() {
    let harness = TestHarness::new();
    harness.create_user("42", "Alice").await;

    let response = harness
        .server
        .post("/complete-task")
        .json(&json!({ "user_id": "42", "task_name": "join_channel" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["points_earned"], 50);
    assert_eq!(body["new_balance"], 50);

    let response = harness
        .server
        .post("/complete-task")
        .json(&json!({ "user_id": "42", "task_name": "join_channel" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["code"], "task_already_completed");

    let body: Value = harness
        .server
        .post("/get-tasks")
        .json(&json!({ "user_id": "42" }))
        .await
        .json();
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks[0]["completed"], true);
    assert_eq!(tasks[1]["completed"], false);

    let body: Value = harness
        .server
        .get("/get-tasks")
        .add_query_param("user_id", "42")
        .await
        .json();
    assert_eq!(body["tasks"][0]["completed"], true);

    assert_eq!(harness.balance("42").await, 50);
}

#[tokio::test]
async fn complete_unknown_task_is_not_found() {
    let harness = TestHarness::new();
    harness.create_user("42", "Alice").await;

    let response = harness
        .server
        .post("/complete-task")
        .json(&json!({ "user_id": "42", "task_name": "nope" }))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn complete_task_requires_task_name() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/complete-task")
        .json(&json!({ "user_id": "42" }))
        .await;

    response.assert_status_bad_request();
}

// ============================================================================
// Balances and profile
// ============================================================================

#[tokio::test]
async fn unknown_user_balance_is_zero() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/get-balance")
        .json(&json!({ "user_id": "nobody" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["balance"], 0);
    assert!(body["last_claim"].is_null());
    assert_eq!(body["referral_code"], "nobody");
}

#[tokio::test]
async fn user_data_aggregates_profile() {
    let harness = TestHarness::with_fixed_reward(25);
    harness.create_user("42", "Alice").await;
    harness.claim("42").await;

    let response = harness
        .server
        .post("/user-data")
        .json(&json!({ "user_id": "42" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["username"], "Alice");
    assert_eq!(body["balance"], 25);
    assert_eq!(body["tasks"].as_array().unwrap().len(), 2);
    assert!(body["referrals"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn user_data_for_unknown_user_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/user-data")
        .json(&json!({ "user_id": "ghost" }))
        .await;

    response.assert_status_not_found();
}

// ============================================================================
// Leaderboard
// ============================================================================

#[tokio::test]
async fn leaderboard_orders_by_balance() {
    let harness = TestHarness::new();
    harness.create_user("1", "Low").await;
    harness.create_user("2", "High").await;
    harness
        .server
        .post("/complete-task")
        .json(&json!({ "user_id": "2", "task_name": "join_channel" }))
        .await
        .assert_status_ok();
    harness
        .server
        .post("/complete-task")
        .json(&json!({ "user_id": "1", "task_name": "follow_twitter" }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/get-leaderboard")
        .add_query_param("limit", 1)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let board = body["leaderboard"].as_array().unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0]["user_id"], "2");
    assert_eq!(board[0]["username"], "High");
    assert_eq!(board[0]["balance"], 50);
}
