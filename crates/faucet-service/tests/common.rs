//! Common test utilities for faucet integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::{json, Value};

use faucet_core::{ClaimPolicy, RewardRange, Task};
use faucet_service::crypto::sign_init_data;
use faucet_service::{create_router, AppState, ClaimEngine, ServiceConfig};
use faucet_store::{Ledger, MemoryBackend};

/// Bot token used when init data enforcement is on.
pub const BOT_TOKEN: &str = "123456:integration-test-token";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The ledger backend, for inspecting state and simulating outages.
    pub backend: Arc<MemoryBackend>,
}

impl TestHarness {
    /// Create a harness with the default claim policy.
    pub fn new() -> Self {
        Self::with_policy(ClaimPolicy::default())
    }

    /// Create a harness whose claims always pay `reward`.
    pub fn with_fixed_reward(reward: i64) -> Self {
        Self::with_policy(ClaimPolicy {
            reward_range: RewardRange::new(reward, reward).expect("valid range"),
            ..ClaimPolicy::default()
        })
    }

    /// Create a harness with a custom claim policy.
    pub fn with_policy(policy: ClaimPolicy) -> Self {
        Self::build(test_config(policy))
    }

    /// Create a harness that requires signed init data on mutations.
    pub fn with_init_data_required() -> Self {
        let config = ServiceConfig {
            telegram_bot_token: Some(BOT_TOKEN.into()),
            require_init_data: true,
            init_data_max_age_seconds: 0,
            ..test_config(ClaimPolicy::default())
        };
        Self::build(config)
    }

    /// Create a harness that validates init data but does not require it.
    pub fn with_bot_token() -> Self {
        let config = ServiceConfig {
            telegram_bot_token: Some(BOT_TOKEN.into()),
            init_data_max_age_seconds: 0,
            ..test_config(ClaimPolicy::default())
        };
        Self::build(config)
    }

    /// Create a harness that serves the WebApp from `dir`.
    pub fn with_static_dir(dir: &Path) -> Self {
        let config = ServiceConfig {
            static_dir: Some(dir.to_path_buf()),
            ..test_config(ClaimPolicy::default())
        };
        Self::build(config)
    }

    fn build(config: ServiceConfig) -> Self {
        let backend = Arc::new(MemoryBackend::with_tasks(config.tasks.clone()));
        let ledger = Arc::new(Ledger::new(backend.clone()));
        let engine = ClaimEngine::with_seed(ledger, config.policy.clone(), 7)
            .expect("Failed to create engine");

        let state = AppState::with_engine(engine, config);
        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self { server, backend }
    }

    /// Create a user through `/update-user`.
    pub async fn create_user(&self, user_id: &str, username: &str) {
        self.server
            .post("/update-user")
            .json(&json!({ "user_id": user_id, "username": username }))
            .await
            .assert_status_ok();
    }

    /// Claim for `user_id` and return the response body.
    pub async fn claim(&self, user_id: &str) -> Value {
        let response = self
            .server
            .post("/claim")
            .json(&json!({ "user_id": user_id }))
            .await;
        response.assert_status_ok();
        response.json()
    }

    /// Current balance of `user_id`.
    pub async fn balance(&self, user_id: &str) -> i64 {
        let body: Value = self
            .server
            .post("/get-balance")
            .json(&json!({ "user_id": user_id }))
            .await
            .json();
        body["balance"].as_i64().expect("balance is a number")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Service configuration for tests: memory ledger, small task catalog.
pub fn test_config(policy: ClaimPolicy) -> ServiceConfig {
    ServiceConfig {
        listen_addr: "127.0.0.1:0".into(),
        cors_origins: vec!["*".into()],
        max_body_bytes: 64 * 1024,
        request_timeout_seconds: 30,
        tasks: vec![
            Task::new("join_channel", "Join our Telegram channel", 50),
            Task::new("follow_twitter", "Follow us on Twitter", 30),
        ],
        policy,
        ..ServiceConfig::default()
    }
}

/// Init data signed by [`BOT_TOKEN`] for Telegram user `id`.
pub fn init_data_for(id: i64) -> String {
    let user = format!(r#"{{"id":{id},"first_name":"Test","username":"tester{id}"}}"#);
    let auth_date = chrono::Utc::now().timestamp().to_string();
    sign_init_data(
        &[("auth_date", auth_date.as_str()), ("user", user.as_str())],
        BOT_TOKEN,
    )
    .expect("signing succeeds")
}
