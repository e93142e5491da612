//! Distribution run integration tests against a mock tenant directory.

mod common;

use common::{application_campaign_body, campaign_body, future_date, TestHarness};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use promo_ledger_core::{EntityId, TenantId};

/// Serve the active tenant listing.
async fn mount_tenants(server: &MockServer, tenants: &[TenantId]) {
    let records: Vec<_> = tenants
        .iter()
        .map(|t| json!({ "tenant_id": t.to_string() }))
        .collect();

    Mock::given(method("GET"))
        .and(path("/api/v1/tenants"))
        .and(query_param("status", "active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tenants": records })))
        .mount(server)
        .await;
}

/// Serve a tenant's primary organization.
async fn mount_primary_org(server: &MockServer, tenant_id: &TenantId, entity_id: &EntityId) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/v1/tenants/{tenant_id}/primary-organization"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entity_id": entity_id.to_string(),
            "entity_type": "organization",
        })))
        .mount(server)
        .await;
}

/// Serve a 404 for a tenant with no primary organization.
async fn mount_orphan(server: &MockServer, tenant_id: &TenantId) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/v1/tenants/{tenant_id}/primary-organization"
        )))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

fn decimal(value: &serde_json::Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn distribute_splits_pool_across_tenants() {
    let directory = MockServer::start().await;
    let tenants: Vec<TenantId> = (0..4).map(|_| TenantId::generate()).collect();
    let entities: Vec<EntityId> = (0..4).map(|_| EntityId::generate()).collect();

    mount_tenants(&directory, &tenants).await;
    for (tenant, entity) in tenants.iter().zip(&entities) {
        mount_primary_org(&directory, tenant, entity).await;
    }

    let harness = TestHarness::with_directory(&directory.uri());
    let created = harness.create_campaign(&campaign_body(100)).await;
    let campaign_id = created["campaign_id"].as_str().unwrap();

    let response = harness
        .server
        .post(&format!("/v1/campaigns/{campaign_id}/distribute"))
        .await;

    response.assert_status_ok();
    let report: serde_json::Value = response.json();
    assert_eq!(report["distributed_count"], 4);
    assert_eq!(report["failed_count"], 0);
    assert_eq!(report["status"], "completed");

    // Each tenant's balance holds an equal share
    let response = harness
        .server
        .get(&format!("/v1/balances/{}/{}", tenants[0], entities[0]))
        .await;
    response.assert_status_ok();
    let balance: serde_json::Value = response.json();
    assert_eq!(decimal(&balance["available_credits"]), dec!(25));

    // One ledger row, linked to the campaign
    let response = harness
        .server
        .get(&format!(
            "/v1/balances/{}/{}/transactions",
            tenants[0], entities[0]
        ))
        .await;
    let body: serde_json::Value = response.json();
    let rows = body["transactions"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["transaction_type"], "seasonal_campaign");
    assert_eq!(
        rows[0]["operation_code"],
        format!("seasonal_campaign:{campaign_id}")
    );
}

#[tokio::test]
async fn application_split_creates_one_row_per_application() {
    let directory = MockServer::start().await;
    let tenant = TenantId::generate();
    let entity = EntityId::generate();

    mount_tenants(&directory, std::slice::from_ref(&tenant)).await;
    mount_primary_org(&directory, &tenant, &entity).await;

    let harness = TestHarness::with_directory(&directory.uri());
    let created = harness
        .create_campaign(&application_campaign_body(
            90,
            &[tenant.to_string()],
            &["crm", "hr", "affiliate"],
        ))
        .await;
    let campaign_id = created["campaign_id"].as_str().unwrap();

    harness
        .server
        .post(&format!("/v1/campaigns/{campaign_id}/distribute"))
        .await
        .assert_status_ok();

    // Three allocation rows of 30 each
    let response = harness
        .server
        .get(&format!("/v1/tenants/{tenant}/allocations"))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["total"], 3);
    for row in body["allocations"].as_array().unwrap() {
        assert_eq!(decimal(&row["allocated_credits"]), dec!(30));
        assert!(row["target_application"].as_str().is_some());
    }

    // But a single balance mutation for the full amount
    let response = harness
        .server
        .get(&format!("/v1/balances/{tenant}/{entity}/transactions"))
        .await;
    let body: serde_json::Value = response.json();
    let rows = body["transactions"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(decimal(&rows[0]["amount"]), dec!(90));
}

// ============================================================================
// Failure modes
// ============================================================================

#[tokio::test]
async fn orphan_tenant_is_recorded_without_stopping_the_batch() {
    let directory = MockServer::start().await;
    let tenants: Vec<TenantId> = (0..3).map(|_| TenantId::generate()).collect();

    mount_tenants(&directory, &tenants).await;
    mount_primary_org(&directory, &tenants[0], &EntityId::generate()).await;
    mount_orphan(&directory, &tenants[1]).await;
    mount_primary_org(&directory, &tenants[2], &EntityId::generate()).await;

    let harness = TestHarness::with_directory(&directory.uri());
    let created = harness.create_campaign(&campaign_body(90)).await;
    let campaign_id = created["campaign_id"].as_str().unwrap();

    let response = harness
        .server
        .post(&format!("/v1/campaigns/{campaign_id}/distribute"))
        .await;

    response.assert_status_ok();
    let report: serde_json::Value = response.json();
    assert_eq!(report["distributed_count"], 2);
    assert_eq!(report["failed_count"], 1);
    assert_eq!(report["status"], "partial_success");

    let failed = report["failed_tenants"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["tenant_id"], tenants[1].to_string());
    assert_eq!(failed[0]["error"], "No primary organization found");

    // The failure is durable: a failed allocation row exists
    let response = harness
        .server
        .get(&format!("/v1/campaigns/{campaign_id}/allocations"))
        .await;
    let body: serde_json::Value = response.json();
    let failed_rows: Vec<_> = body["allocations"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|row| row["distribution_status"] == "failed")
        .collect();
    assert_eq!(failed_rows.len(), 1);
    assert_eq!(
        failed_rows[0]["distribution_error"],
        "No primary organization found"
    );
    assert_eq!(failed_rows[0]["is_active"], false);
}

#[tokio::test]
async fn distribute_twice_conflicts() {
    let directory = MockServer::start().await;
    let tenant = TenantId::generate();

    mount_tenants(&directory, std::slice::from_ref(&tenant)).await;
    mount_primary_org(&directory, &tenant, &EntityId::generate()).await;

    let harness = TestHarness::with_directory(&directory.uri());
    let created = harness.create_campaign(&campaign_body(100)).await;
    let campaign_id = created["campaign_id"].as_str().unwrap();

    harness
        .server
        .post(&format!("/v1/campaigns/{campaign_id}/distribute"))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post(&format!("/v1/campaigns/{campaign_id}/distribute"))
        .await;

    response.assert_status(axum::http::StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn distribute_without_directory_fails() {
    let harness = TestHarness::new();
    let created = harness.create_campaign(&campaign_body(100)).await;
    let campaign_id = created["campaign_id"].as_str().unwrap();

    let response = harness
        .server
        .post(&format!("/v1/campaigns/{campaign_id}/distribute"))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn distribute_unknown_campaign_fails() {
    let directory = MockServer::start().await;
    let harness = TestHarness::with_directory(&directory.uri());

    let response = harness
        .server
        .post(&format!("/v1/campaigns/{}/distribute", uuid::Uuid::new_v4()))
        .await;

    response.assert_status_not_found();
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
async fn grant_notifications_sent_when_enabled() {
    let directory = MockServer::start().await;
    let notify = MockServer::start().await;
    let tenants: Vec<TenantId> = (0..2).map(|_| TenantId::generate()).collect();

    mount_tenants(&directory, &tenants).await;
    for tenant in &tenants {
        mount_primary_org(&directory, tenant, &EntityId::generate()).await;
    }

    Mock::given(method("POST"))
        .and(path("/api/v1/notifications"))
        .and(body_partial_json(json!({
            "title": "Promotional credits added",
            "action_url": "/billing/credits",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(2)
        .mount(&notify)
        .await;

    let harness = TestHarness::with_collaborators(&directory.uri(), &notify.uri());
    let created = harness
        .create_campaign(&json!({
            "campaign_name": "Noisy promo",
            "credit_type": "promotional",
            "total_credits": 50,
            "target_all_tenants": true,
            "send_notifications": true,
            "expires_at": future_date(30),
        }))
        .await;
    let campaign_id = created["campaign_id"].as_str().unwrap();

    let response = harness
        .server
        .post(&format!("/v1/campaigns/{campaign_id}/distribute"))
        .await;

    response.assert_status_ok();
    let report: serde_json::Value = response.json();
    assert_eq!(report["distributed_count"], 2);
}

#[tokio::test]
async fn failed_notifications_never_change_the_outcome() {
    let directory = MockServer::start().await;
    let notify = MockServer::start().await;
    let tenant = TenantId::generate();
    let entity = EntityId::generate();

    mount_tenants(&directory, std::slice::from_ref(&tenant)).await;
    mount_primary_org(&directory, &tenant, &entity).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/notifications"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&notify)
        .await;

    let harness = TestHarness::with_collaborators(&directory.uri(), &notify.uri());
    let created = harness
        .create_campaign(&json!({
            "campaign_name": "Quietly failing promo",
            "credit_type": "promotional",
            "total_credits": 50,
            "target_all_tenants": true,
            "send_notifications": true,
            "expires_at": future_date(30),
        }))
        .await;
    let campaign_id = created["campaign_id"].as_str().unwrap();

    let response = harness
        .server
        .post(&format!("/v1/campaigns/{campaign_id}/distribute"))
        .await;

    response.assert_status_ok();
    let report: serde_json::Value = response.json();
    assert_eq!(report["distributed_count"], 1);
    assert_eq!(report["failed_count"], 0);

    // Credit landed despite the delivery failure
    let response = harness
        .server
        .get(&format!("/v1/balances/{tenant}/{entity}"))
        .await;
    response.assert_status_ok();
    let balance: serde_json::Value = response.json();
    assert_eq!(decimal(&balance["available_credits"]), dec!(50));
}
