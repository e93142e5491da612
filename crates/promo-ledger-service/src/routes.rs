//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{allocations, campaigns, health, ledger, sweep};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Maximum concurrent sweep runs. Sweeps walk the whole expiry index, and
/// concurrent runs only race each other for the same allocations.
const SWEEP_MAX_CONCURRENT_REQUESTS: usize = 2;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Campaigns
/// - `POST /v1/campaigns` - Create campaign
/// - `GET /v1/campaigns` - List campaigns (`?status=` filter)
/// - `GET /v1/campaigns/:id` - Campaign with allocation summary
/// - `POST /v1/campaigns/:id/distribute` - Trigger distribution
/// - `POST /v1/campaigns/:id/extend-expiry` - Extend expiry
/// - `GET /v1/campaigns/:id/allocations` - Campaign allocations
///
/// ## Allocations
/// - `GET /v1/tenants/:tenant_id/allocations` - Tenant allocations
/// - `GET /v1/allocations/expiring` - Expiring preview (`?within_days=`)
///
/// ## Ledger
/// - `GET /v1/balances/:tenant_id/:entity_id` - Credit balance
/// - `GET /v1/balances/:tenant_id/:entity_id/transactions` - History
///
/// ## Sweep
/// - `POST /v1/sweep/expired` - Reclaim expired credit
/// - `POST /v1/sweep/warnings` - Send expiry warnings
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Sweep routes run whole-index batch work, so they carry a much
    // tighter concurrency limit than the rest of the API.
    let sweep_routes = Router::new()
        .route("/expired", post(sweep::sweep_expired))
        .route("/warnings", post(sweep::send_warnings))
        .layer(ConcurrencyLimitLayer::new(SWEEP_MAX_CONCURRENT_REQUESTS));

    // Create concurrency-limited API routes
    let api_routes = Router::new()
        // Campaigns
        .route("/campaigns", post(campaigns::create_campaign))
        .route("/campaigns", get(campaigns::list_campaigns))
        .route("/campaigns/:campaign_id", get(campaigns::get_campaign))
        .route(
            "/campaigns/:campaign_id/distribute",
            post(campaigns::distribute_campaign),
        )
        .route(
            "/campaigns/:campaign_id/extend-expiry",
            post(campaigns::extend_expiry),
        )
        .route(
            "/campaigns/:campaign_id/allocations",
            get(allocations::list_campaign_allocations),
        )
        // Allocations
        .route(
            "/tenants/:tenant_id/allocations",
            get(allocations::list_tenant_allocations),
        )
        .route("/allocations/expiring", get(allocations::list_expiring))
        // Ledger
        .route("/balances/:tenant_id/:entity_id", get(ledger::get_balance))
        .route(
            "/balances/:tenant_id/:entity_id/transactions",
            get(ledger::list_transactions),
        )
        // Sweep routes (with their own concurrency limit)
        .nest("/sweep", sweep_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
