//! Allocation listing handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use promo_ledger_core::{Allocation, CampaignId, TenantId};
use promo_ledger_store::Store;

use crate::error::ApiError;
use crate::state::AppState;

/// Allocation response.
#[derive(Debug, Serialize)]
pub struct AllocationResponse {
    /// Allocation ID.
    pub allocation_id: String,
    /// Owning campaign.
    pub campaign_id: String,
    /// Receiving tenant.
    pub tenant_id: String,
    /// Credited entity, absent for failed grants.
    pub entity_id: Option<String>,
    /// Entity type as reported by the directory.
    pub entity_type: Option<String>,
    /// Application scope, absent for whole-organization grants.
    pub target_application: Option<String>,
    /// Credit granted.
    pub allocated_credits: Decimal,
    /// Credit consumed so far.
    pub used_credits: Decimal,
    /// Credit still unused, clamped at zero.
    pub unused_credits: Decimal,
    /// Grant outcome.
    pub distribution_status: String,
    /// Failure detail for failed grants.
    pub distribution_error: Option<String>,
    /// Whether the credit is still live.
    pub is_active: bool,
    /// Whether the expiry sweep has processed this allocation.
    pub is_expired: bool,
    /// Expiry date.
    pub expires_at: String,
    /// Created timestamp.
    pub created_at: String,
}

impl From<&Allocation> for AllocationResponse {
    fn from(allocation: &Allocation) -> Self {
        Self {
            allocation_id: allocation.allocation_id.to_string(),
            campaign_id: allocation.campaign_id.to_string(),
            tenant_id: allocation.tenant_id.to_string(),
            entity_id: allocation.entity_id.map(|id| id.to_string()),
            entity_type: allocation.entity_type.clone(),
            target_application: allocation
                .target_application
                .map(|app| app.as_str().to_string()),
            allocated_credits: allocation.allocated_credits,
            used_credits: allocation.used_credits,
            unused_credits: allocation.unused_credits(),
            distribution_status: allocation.distribution_status.as_str().to_string(),
            distribution_error: allocation.distribution_error.clone(),
            is_active: allocation.is_active,
            is_expired: allocation.is_expired,
            expires_at: allocation.expires_at.to_rfc3339(),
            created_at: allocation.created_at.to_rfc3339(),
        }
    }
}

/// Allocation list response.
#[derive(Debug, Serialize)]
pub struct ListAllocationsResponse {
    /// Allocations, oldest first.
    pub allocations: Vec<AllocationResponse>,
    /// Number of allocations returned.
    pub total: usize,
}

fn list_response(allocations: &[Allocation]) -> ListAllocationsResponse {
    let allocations: Vec<_> = allocations.iter().map(AllocationResponse::from).collect();
    let total = allocations.len();
    ListAllocationsResponse { allocations, total }
}

/// List every allocation a campaign produced.
pub async fn list_campaign_allocations(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<CampaignId>,
) -> Result<Json<ListAllocationsResponse>, ApiError> {
    // 404 for unknown campaigns rather than an empty list
    state.campaigns.get(&campaign_id)?;

    let allocations = state.store.list_allocations_by_campaign(&campaign_id)?;
    Ok(Json(list_response(&allocations)))
}

/// List every allocation a tenant has received, across campaigns.
pub async fn list_tenant_allocations(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<TenantId>,
) -> Result<Json<ListAllocationsResponse>, ApiError> {
    let allocations = state.store.list_allocations_by_tenant(&tenant_id)?;
    Ok(Json(list_response(&allocations)))
}

/// Expiring preview query parameters.
#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    /// Window size in days (default: 7).
    #[serde(default = "default_within_days")]
    pub within_days: i64,
}

fn default_within_days() -> i64 {
    7
}

/// Preview live allocations expiring between now and now + `within_days`.
///
/// Same window as the warning pass: allocations already past their date
/// are the sweep's to reclaim and are not listed here. They remain
/// visible through the campaign and tenant listings.
pub async fn list_expiring(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExpiringQuery>,
) -> Result<Json<ListAllocationsResponse>, ApiError> {
    if query.within_days < 0 {
        return Err(ApiError::BadRequest(
            "within_days must not be negative".into(),
        ));
    }

    // Cap the window so the date math stays in range.
    let days = query.within_days.min(3650);
    let now = Utc::now();
    let until = now + Duration::days(days);
    let allocations: Vec<Allocation> = state
        .store
        .list_expiring(until)?
        .into_iter()
        .filter(|allocation| allocation.expires_at >= now)
        .collect();
    Ok(Json(list_response(&allocations)))
}
