//! Per-tenant allocation records.
//!
//! Every distribution attempt produces allocation records, successful or
//! not: one per tenant in whole-organization mode, one per tenant and
//! application otherwise. Allocations are never deleted; the expiry sweeper
//! flips their flags and expiry extension moves their date.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::campaign::ApplicationCode;
use crate::ids::{AllocationId, CampaignId, EntityId, TenantId};

/// Outcome of the distribution attempt that created an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    /// Created but not yet granted. Not persisted by the current engine,
    /// which writes rows only once their outcome is known.
    Pending,

    /// Credit was granted.
    Completed,

    /// The grant attempt failed; no credit moved.
    Failed,
}

impl AllocationStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// A single credit grant (or failed grant attempt) from a campaign to one
/// tenant entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    /// Unique allocation ID.
    pub allocation_id: AllocationId,

    /// The campaign that produced this allocation.
    pub campaign_id: CampaignId,

    /// The receiving tenant.
    pub tenant_id: TenantId,

    /// The organization entity the credit landed on. `None` when the grant
    /// failed before an entity was resolved.
    pub entity_id: Option<EntityId>,

    /// Directory-reported type of the entity, e.g. `organization`.
    pub entity_type: Option<String>,

    /// The application this share belongs to. `None` means a
    /// whole-organization allocation.
    pub target_application: Option<ApplicationCode>,

    /// Credit granted to this entity.
    pub allocated_credits: Decimal,

    /// Credit consumed so far. Usage tracking writes this from outside the
    /// engine; it is not write-enforced to stay within `allocated_credits`.
    pub used_credits: Decimal,

    /// When the allocation expires.
    pub expires_at: DateTime<Utc>,

    /// Outcome of the grant attempt.
    pub distribution_status: AllocationStatus,

    /// Failure detail for `Failed` allocations.
    pub distribution_error: Option<String>,

    /// Whether the credit is still live. Cleared by the expiry sweep.
    pub is_active: bool,

    /// Whether the expiry sweep has processed this allocation.
    pub is_expired: bool,

    /// When the allocation was created.
    pub created_at: DateTime<Utc>,

    /// When the allocation was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Allocation {
    /// Build an active allocation for a successful grant.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn granted(
        campaign_id: CampaignId,
        tenant_id: TenantId,
        entity_id: EntityId,
        entity_type: String,
        target_application: Option<ApplicationCode>,
        allocated_credits: Decimal,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            allocation_id: AllocationId::generate(),
            campaign_id,
            tenant_id,
            entity_id: Some(entity_id),
            entity_type: Some(entity_type),
            target_application,
            allocated_credits,
            used_credits: Decimal::ZERO,
            expires_at,
            distribution_status: AllocationStatus::Completed,
            distribution_error: None,
            is_active: true,
            is_expired: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a failed allocation recording why a tenant received nothing.
    ///
    /// Failed allocations are never active, so the expiry sweep cannot
    /// reverse credit that was never granted.
    #[must_use]
    pub fn failed(
        campaign_id: CampaignId,
        tenant_id: TenantId,
        intended_credits: Decimal,
        expires_at: DateTime<Utc>,
        reason: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            allocation_id: AllocationId::generate(),
            campaign_id,
            tenant_id,
            entity_id: None,
            entity_type: None,
            target_application: None,
            allocated_credits: intended_credits,
            used_credits: Decimal::ZERO,
            expires_at,
            distribution_status: AllocationStatus::Failed,
            distribution_error: Some(reason),
            is_active: false,
            is_expired: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the expiry sweep should still consider this allocation.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.is_active && !self.is_expired
    }

    /// Flip the expiry flags. The ledger reversal, if any, is the caller's
    /// job.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.is_expired = true;
        self.updated_at = now;
    }

    /// Unused credit remaining on this allocation, clamped at zero.
    ///
    /// Usage recorded against the balance can exceed what this allocation
    /// granted, so the raw difference may be negative.
    #[must_use]
    pub fn unused_credits(&self) -> Decimal {
        let remaining = self.allocated_credits - self.used_credits;
        if remaining < Decimal::ZERO {
            Decimal::ZERO
        } else {
            remaining
        }
    }
}
