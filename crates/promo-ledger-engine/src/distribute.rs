//! The distribution engine.
//!
//! Turns a pending campaign into per-tenant allocations and ledger grants.
//! Per-tenant work is independent: one tenant's failure is recorded on a
//! failed allocation row and the batch carries on. The only serialization
//! point is the `Pending → Processing` transition, which the store performs
//! as a single conditional update.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use promo_ledger_core::{
    campaign_operation, split_across, Allocation, AllocationMode, Campaign, CampaignId,
    CampaignStatus, TargetSelection, TenantId,
};
use promo_ledger_store::{Store, StoreError};

use crate::directory::TenantDirectory;
use crate::error::{EngineError, Result};
use crate::notify::{Notification, NotificationSink};

/// Default bound on concurrently processed tenants.
pub const DEFAULT_MAX_PARALLEL: usize = 8;

/// Aggregate outcome of one distribution run.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionReport {
    /// The distributed campaign.
    pub campaign_id: CampaignId,

    /// Tenants that received credit.
    pub distributed_count: u32,

    /// Tenants that failed.
    pub failed_count: u32,

    /// The campaign's terminal status.
    pub status: CampaignStatus,

    /// One entry per failed tenant.
    pub failed_tenants: Vec<FailedTenant>,
}

/// A tenant that received nothing, and why.
#[derive(Debug, Clone, Serialize)]
pub struct FailedTenant {
    /// The tenant.
    pub tenant_id: TenantId,

    /// The recorded failure.
    pub error: String,
}

/// Per-tenant failure, recorded on the allocation row and in the report.
#[derive(Debug, thiserror::Error)]
enum TenantError {
    #[error("No primary organization found")]
    NoPrimaryOrganization,

    #[error("tenant directory error: {0}")]
    Directory(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

enum TenantOutcome {
    Distributed,
    Failed(FailedTenant),
}

/// Drives a campaign's single distribution run.
#[derive(Clone)]
pub struct Distributor {
    store: Arc<dyn Store>,
    directory: Arc<dyn TenantDirectory>,
    sink: Option<Arc<dyn NotificationSink>>,
    max_parallel: usize,
}

impl Distributor {
    /// Build a distributor without a notification sink.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, directory: Arc<dyn TenantDirectory>) -> Self {
        Self {
            store,
            directory,
            sink: None,
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }

    /// Attach a notification sink for grant notifications.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Bound the number of tenants processed concurrently.
    #[must_use]
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Run the distribution for a pending campaign.
    ///
    /// Targets are resolved before the status flip so a directory outage
    /// cannot strand the campaign in `Processing`; the conditional update
    /// still admits exactly one of any concurrent triggers.
    ///
    /// # Errors
    ///
    /// - `EngineError::CampaignNotFound` for an unknown ID.
    /// - `EngineError::AlreadyProcessed` when the campaign is not pending.
    /// - `EngineError::Directory` when the tenant population cannot be
    ///   resolved.
    ///
    /// Per-tenant failures never surface here; they are folded into the
    /// report.
    pub async fn distribute(&self, campaign_id: &CampaignId) -> Result<DistributionReport> {
        let campaign = self
            .store
            .get_campaign(campaign_id)?
            .ok_or(EngineError::CampaignNotFound(*campaign_id))?;

        let targets: Vec<TenantId> = match &campaign.target {
            TargetSelection::AllTenants => self
                .directory
                .list_active_tenant_ids()
                .await
                .map_err(|e| EngineError::Directory(e.to_string()))?,
            TargetSelection::Tenants { tenant_ids } => tenant_ids.clone(),
        };

        let campaign = match self.store.begin_distribution(campaign_id) {
            Ok(campaign) => campaign,
            Err(StoreError::CampaignNotFound(id)) => {
                return Err(EngineError::CampaignNotFound(id))
            }
            Err(StoreError::CampaignNotPending {
                campaign_id,
                status,
            }) => {
                return Err(EngineError::AlreadyProcessed {
                    campaign_id,
                    status,
                })
            }
            Err(other) => return Err(other.into()),
        };

        info!(
            campaign_id = %campaign.campaign_id,
            targets = targets.len(),
            "distribution started"
        );

        let per_tenant = campaign.credits_for_tenant(targets.len());
        let campaign_ref = &campaign;

        let outcomes: Vec<TenantOutcome> = stream::iter(targets)
            .map(|tenant_id| async move {
                self.process_tenant(campaign_ref, tenant_id, per_tenant)
                    .await
            })
            .buffer_unordered(self.max_parallel)
            .collect()
            .await;

        let mut distributed: u32 = 0;
        let mut failed_tenants = Vec::new();
        for outcome in outcomes {
            match outcome {
                TenantOutcome::Distributed => distributed += 1,
                TenantOutcome::Failed(failure) => failed_tenants.push(failure),
            }
        }
        #[allow(clippy::cast_possible_truncation)]
        let failed = failed_tenants.len() as u32;

        let finalized = self
            .store
            .finalize_distribution(campaign_id, distributed, failed)?;

        info!(
            campaign_id = %finalized.campaign_id,
            distributed,
            failed,
            status = finalized.distribution_status.as_str(),
            "distribution finished"
        );

        Ok(DistributionReport {
            campaign_id: finalized.campaign_id,
            distributed_count: distributed,
            failed_count: failed,
            status: finalized.distribution_status,
            failed_tenants,
        })
    }

    /// Process one tenant, converting any failure into a failed allocation
    /// row plus a report entry.
    async fn process_tenant(
        &self,
        campaign: &Campaign,
        tenant_id: TenantId,
        credits: Decimal,
    ) -> TenantOutcome {
        match self.grant_tenant(campaign, tenant_id, credits).await {
            Ok(()) => TenantOutcome::Distributed,
            Err(tenant_error) => {
                let reason = tenant_error.to_string();
                warn!(
                    campaign_id = %campaign.campaign_id,
                    tenant_id = %tenant_id,
                    error = %reason,
                    "tenant distribution failed"
                );

                let failed = Allocation::failed(
                    campaign.campaign_id,
                    tenant_id,
                    credits,
                    campaign.expires_at,
                    reason.clone(),
                    Utc::now(),
                );
                if let Err(put_error) = self.store.put_allocation(&failed) {
                    error!(
                        allocation_id = %failed.allocation_id,
                        tenant_id = %tenant_id,
                        error = %put_error,
                        "failed to record failed allocation"
                    );
                }

                TenantOutcome::Failed(FailedTenant {
                    tenant_id,
                    error: reason,
                })
            }
        }
    }

    /// Grant one tenant its credit: resolve the entity, build the
    /// allocation rows, and hand them to the store as one atomic grant.
    async fn grant_tenant(
        &self,
        campaign: &Campaign,
        tenant_id: TenantId,
        credits: Decimal,
    ) -> std::result::Result<(), TenantError> {
        let entity = self
            .directory
            .primary_org_entity(&tenant_id)
            .await
            .map_err(|e| TenantError::Directory(e.to_string()))?
            .ok_or(TenantError::NoPrimaryOrganization)?;

        let now = Utc::now();
        let operation = campaign_operation(campaign.campaign_id);

        let allocations = match &campaign.allocation_mode {
            AllocationMode::PrimaryOrg => vec![Allocation::granted(
                campaign.campaign_id,
                tenant_id,
                entity.entity_id,
                entity.entity_type.clone(),
                None,
                credits,
                campaign.expires_at,
                now,
            )],
            AllocationMode::ApplicationSpecific { applications } => {
                let shares = split_across(credits, applications.len());
                applications
                    .iter()
                    .zip(shares)
                    .map(|(application, share)| {
                        Allocation::granted(
                            campaign.campaign_id,
                            tenant_id,
                            entity.entity_id,
                            entity.entity_type.clone(),
                            Some(*application),
                            share,
                            campaign.expires_at,
                            now,
                        )
                    })
                    .collect()
            }
        };

        // One balance mutation covers the whole tenant grant, however many
        // application rows it fans out into.
        self.store.grant_allocations(
            &tenant_id,
            &entity.entity_id,
            credits,
            &operation,
            &allocations,
        )?;

        if campaign.send_notifications {
            self.notify_grant(campaign, tenant_id, credits).await;
        }

        Ok(())
    }

    /// Emit the grant notification. Failures are logged and swallowed;
    /// notification delivery never changes distribution accounting.
    async fn notify_grant(&self, campaign: &Campaign, tenant_id: TenantId, credits: Decimal) {
        let Some(sink) = &self.sink else {
            return;
        };

        let message = campaign.notification_template.clone().unwrap_or_else(|| {
            format!(
                "You have received {credits} promotional credits from the {} campaign.",
                campaign.campaign_name
            )
        });
        let notification = Notification {
            title: "Promotional credits added".to_string(),
            message,
            action_url: "/billing/credits".to_string(),
            metadata: serde_json::json!({
                "campaign_id": campaign.campaign_id,
                "credit_type": campaign.credit_type.as_str(),
                "amount": credits,
                "expires_at": campaign.expires_at,
            }),
        };

        if let Err(emit_error) = sink.emit(&tenant_id, notification).await {
            warn!(
                campaign_id = %campaign.campaign_id,
                tenant_id = %tenant_id,
                error = %emit_error,
                "grant notification failed"
            );
        }
    }
}
