//! Error types for the promo-ledger engine.

use promo_ledger_core::{CampaignId, CampaignStatus, ValidationError};
use promo_ledger_store::StoreError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// A failure reported by an external collaborator (tenant directory or
/// notification sink).
///
/// Collaborator implementations reduce their transport errors to this one
/// shape so the engine traits stay object-safe.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    /// Build from anything displayable.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors that can occur in engine operations.
///
/// Per-tenant and per-allocation failures inside a batch are never
/// surfaced through this type; they are recorded on allocation rows or
/// logged, and the batch carries on.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Campaign input was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Campaign not found.
    #[error("campaign not found: {0}")]
    CampaignNotFound(CampaignId),

    /// A distribution was triggered on a campaign that already left
    /// `Pending`.
    #[error("campaign {campaign_id} already processed (status: {status:?})")]
    AlreadyProcessed {
        /// The campaign.
        campaign_id: CampaignId,
        /// Its stored status at the time of the attempt.
        status: CampaignStatus,
    },

    /// The tenant directory collaborator failed.
    #[error("tenant directory error: {0}")]
    Directory(String),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
