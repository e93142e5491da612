//! Error types for promo-ledger storage.

use promo_ledger_core::{AllocationId, CampaignId, CampaignStatus, EntityId, TenantId};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Campaign not found.
    #[error("campaign not found: {0}")]
    CampaignNotFound(CampaignId),

    /// Allocation not found.
    #[error("allocation not found: {0}")]
    AllocationNotFound(AllocationId),

    /// Balance record not found.
    #[error("balance not found for tenant {tenant_id}, entity {entity_id}")]
    BalanceNotFound {
        /// The tenant the lookup was for.
        tenant_id: TenantId,
        /// The entity the lookup was for.
        entity_id: EntityId,
    },

    /// A distribution was started on a campaign that is not pending.
    #[error("campaign {campaign_id} is not pending (status: {status:?})")]
    CampaignNotPending {
        /// The campaign.
        campaign_id: CampaignId,
        /// Its stored status at the time of the attempt.
        status: CampaignStatus,
    },

    /// An expiry was applied to an allocation that is no longer live.
    #[error("allocation {0} is not active")]
    AllocationNotActive(AllocationId),
}
