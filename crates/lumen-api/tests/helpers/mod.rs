//! Test helpers: build the router over a temp directory and an in-memory record store.

#![allow(dead_code)]

pub mod fixtures;

use axum_test::TestServer;
use lumen_api::setup::initialize_app;
use lumen_api::AppState;
use lumen_core::Config;
use tempfile::TempDir;

pub const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Files directly under the storage root (the masters).
    pub fn masters(&self) -> usize {
        std::fs::read_dir(&self.state.config.storage_directory)
            .expect("storage directory")
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .count()
    }

    pub fn pending_uploads(&self) -> usize {
        std::fs::read_dir(&self.state.config.tmp_directory)
            .expect("tmp directory")
            .count()
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

pub async fn setup_test_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let mut config = Config::for_directories(
        temp_dir.path().join("storage"),
        temp_dir.path().join("tmp"),
    );
    config.secret_key = TEST_SECRET.to_string();
    customize(&mut config);

    let (state, router) = initialize_app(config)
        .await
        .expect("Failed to initialize app");
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

/// Issue a write/read token through the API.
pub async fn issue_token(client: &TestServer) -> String {
    let response = client
        .post("/api/v1/media/issue-access")
        .add_header("x-secret", TEST_SECRET)
        .json(&serde_json::json!({ "expiresIn": "1h" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    body["token"].as_str().expect("token").to_string()
}
