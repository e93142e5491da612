//! Campaign lifecycle handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use promo_ledger_core::{
    Allocation, AllocationMode, AllocationStatus, Campaign, CampaignId, CampaignStatus,
    NewCampaign, TargetSelection,
};
use promo_ledger_engine::{DistributionReport, ExpiryExtension};
use promo_ledger_store::Store;

use crate::error::ApiError;
use crate::state::AppState;

/// Campaign response.
#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    /// Campaign ID.
    pub campaign_id: String,
    /// Campaign name.
    pub campaign_name: String,
    /// Credit type.
    pub credit_type: String,
    /// Total credit pool.
    pub total_credits: Decimal,
    /// Fixed per-tenant override, when set.
    pub credits_per_tenant: Option<Decimal>,
    /// Pool division method.
    pub distribution_method: String,
    /// Target tenant selection.
    pub target: TargetSelection,
    /// Allocation mode.
    pub allocation_mode: AllocationMode,
    /// Lifecycle status.
    pub status: String,
    /// Tenants granted credit by the distribution run.
    pub distributed_count: u32,
    /// Tenants that failed during the distribution run.
    pub failed_count: u32,
    /// Whether grant notifications are sent.
    pub send_notifications: bool,
    /// Custom notification message, when set.
    pub notification_template: Option<String>,
    /// When allocations from this campaign expire.
    pub expires_at: String,
    /// Created timestamp.
    pub created_at: String,
    /// Updated timestamp.
    pub updated_at: String,
}

impl From<&Campaign> for CampaignResponse {
    fn from(campaign: &Campaign) -> Self {
        Self {
            campaign_id: campaign.campaign_id.to_string(),
            campaign_name: campaign.campaign_name.clone(),
            credit_type: campaign.credit_type.as_str().to_string(),
            total_credits: campaign.total_credits,
            credits_per_tenant: campaign.credits_per_tenant,
            distribution_method: campaign.distribution_method.as_str().to_string(),
            target: campaign.target.clone(),
            allocation_mode: campaign.allocation_mode.clone(),
            status: campaign.distribution_status.as_str().to_string(),
            distributed_count: campaign.distributed_count,
            failed_count: campaign.failed_count,
            send_notifications: campaign.send_notifications,
            notification_template: campaign.notification_template.clone(),
            expires_at: campaign.expires_at.to_rfc3339(),
            created_at: campaign.created_at.to_rfc3339(),
            updated_at: campaign.updated_at.to_rfc3339(),
        }
    }
}

/// Create a new campaign.
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewCampaign>,
) -> Result<Json<CampaignResponse>, ApiError> {
    let campaign = state.campaigns.create(body)?;
    Ok(Json(CampaignResponse::from(&campaign)))
}

/// Campaign list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListCampaignsQuery {
    /// Optional status filter (wire name, e.g. `pending`).
    pub status: Option<String>,
}

/// List campaigns response.
#[derive(Debug, Serialize)]
pub struct ListCampaignsResponse {
    /// Campaigns, newest first.
    pub campaigns: Vec<CampaignResponse>,
    /// Number of campaigns returned.
    pub total: usize,
}

/// List campaigns, optionally filtered by status.
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<Json<ListCampaignsResponse>, ApiError> {
    let status = match &query.status {
        Some(raw) => Some(
            CampaignStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status filter: {raw}")))?,
        ),
        None => None,
    };

    let campaigns = state.campaigns.list(status)?;
    let campaigns: Vec<_> = campaigns.iter().map(CampaignResponse::from).collect();
    let total = campaigns.len();

    Ok(Json(ListCampaignsResponse { campaigns, total }))
}

/// Aggregate view over a campaign's allocations.
#[derive(Debug, Serialize)]
pub struct AllocationSummary {
    /// Allocation rows under the campaign.
    pub total: usize,
    /// Successful grants.
    pub completed: usize,
    /// Failed grant attempts.
    pub failed: usize,
    /// Grants whose credit is still live.
    pub active: usize,
    /// Grants processed by the expiry sweep.
    pub expired: usize,
    /// Credit granted across all successful allocations.
    pub total_allocated: Decimal,
}

impl AllocationSummary {
    fn from_allocations(allocations: &[Allocation]) -> Self {
        let mut summary = Self {
            total: allocations.len(),
            completed: 0,
            failed: 0,
            active: 0,
            expired: 0,
            total_allocated: Decimal::ZERO,
        };

        for allocation in allocations {
            match allocation.distribution_status {
                AllocationStatus::Completed => {
                    summary.completed += 1;
                    summary.total_allocated += allocation.allocated_credits;
                }
                AllocationStatus::Failed => summary.failed += 1,
                AllocationStatus::Pending => {}
            }
            if allocation.is_active {
                summary.active += 1;
            }
            if allocation.is_expired {
                summary.expired += 1;
            }
        }

        summary
    }
}

/// Campaign detail response: the campaign plus its allocation rollup.
#[derive(Debug, Serialize)]
pub struct CampaignDetailResponse {
    /// The campaign.
    pub campaign: CampaignResponse,
    /// Aggregate allocation outcome.
    pub allocations: AllocationSummary,
}

/// Get a campaign with its allocation summary.
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<CampaignId>,
) -> Result<Json<CampaignDetailResponse>, ApiError> {
    let campaign = state.campaigns.get(&campaign_id)?;
    let allocations = state.store.list_allocations_by_campaign(&campaign_id)?;

    Ok(Json(CampaignDetailResponse {
        campaign: CampaignResponse::from(&campaign),
        allocations: AllocationSummary::from_allocations(&allocations),
    }))
}

/// Trigger the campaign's distribution run.
pub async fn distribute_campaign(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<CampaignId>,
) -> Result<Json<DistributionReport>, ApiError> {
    let distributor = state
        .distributor
        .as_ref()
        .ok_or_else(|| ApiError::ExternalService("tenant directory not configured".into()))?;

    let report = distributor.distribute(&campaign_id).await?;
    Ok(Json(report))
}

/// Extend expiry request.
#[derive(Debug, Deserialize)]
pub struct ExtendExpiryRequest {
    /// Days to add to the campaign's current expiry date.
    pub additional_days: i64,
}

/// Push a campaign's expiry out and cascade to its allocations.
pub async fn extend_expiry(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<CampaignId>,
    Json(body): Json<ExtendExpiryRequest>,
) -> Result<Json<ExpiryExtension>, ApiError> {
    let extension = state
        .campaigns
        .extend_expiry(&campaign_id, body.additional_days)?;
    Ok(Json(extension))
}
