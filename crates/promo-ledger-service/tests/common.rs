//! Common test utilities for promo-ledger integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;

use promo_ledger_service::{create_router, AppState, ServiceConfig};
use promo_ledger_store::RocksStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// Direct store handle for seeding data the API cannot create.
    pub store: Arc<RocksStore>,
}

impl TestHarness {
    /// Create a new test harness with a fresh database and no external
    /// collaborators.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Create a harness wired to a mock tenant directory.
    pub fn with_directory(directory_url: &str) -> Self {
        Self::build(Some(directory_url.to_string()), None)
    }

    /// Create a harness wired to a mock notification service only.
    pub fn with_notify(notify_url: &str) -> Self {
        Self::build(None, Some(notify_url.to_string()))
    }

    /// Create a harness wired to both mock collaborators.
    pub fn with_collaborators(directory_url: &str, notify_url: &str) -> Self {
        Self::build(
            Some(directory_url.to_string()),
            Some(notify_url.to_string()),
        )
    }

    fn build(directory_url: Option<String>, notify_url: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            directory_url,
            directory_api_key: None,
            notify_url,
            notify_api_key: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            max_parallel_tenants: 4,
        };

        let state = AppState::new(store.clone(), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            _temp_dir: temp_dir,
            store,
        }
    }

    /// Post a campaign and return the created campaign body.
    pub async fn create_campaign(&self, body: &serde_json::Value) -> serde_json::Value {
        let response = self.server.post("/v1/campaigns").json(body).await;
        response.assert_status_ok();
        response.json()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A valid all-tenants campaign creation body.
pub fn campaign_body(total_credits: i64) -> serde_json::Value {
    json!({
        "campaign_name": "Summer promo",
        "credit_type": "promotional",
        "total_credits": total_credits,
        "target_all_tenants": true,
        "expires_at": future_date(30),
    })
}

/// A campaign body targeting an explicit tenant list with an application
/// split.
pub fn application_campaign_body(
    total_credits: i64,
    tenant_ids: &[String],
    applications: &[&str],
) -> serde_json::Value {
    json!({
        "campaign_name": "App rollout",
        "credit_type": "bonus",
        "total_credits": total_credits,
        "credits_per_tenant": total_credits,
        "distribution_method": "fixed",
        "target_tenant_ids": tenant_ids,
        "allocation_mode": "application_specific",
        "target_applications": applications,
        "expires_at": future_date(30),
    })
}

/// An RFC 3339 date `days` from now.
pub fn future_date(days: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::days(days)).to_rfc3339()
}
