//! Campaign lifecycle management.
//!
//! The manager owns creation (validation included), lookups, and post-hoc
//! expiry extension. Status transitions during a distribution run belong
//! to the `Distributor`; the manager never touches a campaign's status.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use promo_ledger_core::{Campaign, CampaignId, CampaignStatus, NewCampaign, ValidationError};
use promo_ledger_store::{Store, StoreError};

use crate::error::{EngineError, Result};

/// Upper bound on a single extension, in days. Keeps hostile input out of
/// date arithmetic.
const MAX_EXTENSION_DAYS: i64 = 3650;

/// Outcome of an expiry extension.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ExpiryExtension {
    /// The extended campaign.
    pub campaign_id: CampaignId,

    /// The campaign's new absolute expiry date.
    pub new_expires_at: DateTime<Utc>,

    /// How many allocations were moved to the same date.
    pub allocations_extended: usize,
}

/// Validates, persists, and reads campaign definitions.
#[derive(Clone)]
pub struct CampaignManager {
    store: Arc<dyn Store>,
}

impl CampaignManager {
    /// Build a manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validate raw campaign input without persisting anything.
    ///
    /// # Errors
    ///
    /// Returns the full field-level message list when the input is
    /// rejected.
    pub fn validate(&self, input: &NewCampaign) -> std::result::Result<(), ValidationError> {
        input.clone().validate_into(Utc::now()).map(|_| ())
    }

    /// Validate and persist a new campaign with status `Pending`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` for rejected input, or a store
    /// error if persistence fails.
    pub fn create(&self, input: NewCampaign) -> Result<Campaign> {
        let campaign = input.validate_into(Utc::now())?;
        self.store.put_campaign(&campaign)?;
        info!(
            campaign_id = %campaign.campaign_id,
            name = %campaign.campaign_name,
            credit_type = campaign.credit_type.as_str(),
            total = %campaign.total_credits,
            "campaign created"
        );
        Ok(campaign)
    }

    /// Fetch a campaign.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::CampaignNotFound` for an unknown ID.
    pub fn get(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        self.store
            .get_campaign(campaign_id)?
            .ok_or(EngineError::CampaignNotFound(*campaign_id))
    }

    /// List campaigns, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns a store error if the listing fails.
    pub fn list(&self, status: Option<CampaignStatus>) -> Result<Vec<Campaign>> {
        Ok(self.store.list_campaigns(status)?)
    }

    /// Push a campaign's expiry out by `additional_days` and cascade the
    /// new absolute date to every allocation under it.
    ///
    /// The campaign's distribution status is left untouched; extension is
    /// the one post-terminal mutation the lifecycle allows. The store adds
    /// the days to the stored date under the campaign's key lock, so
    /// concurrent extensions accumulate.
    ///
    /// # Errors
    ///
    /// - `EngineError::Validation` when `additional_days` is outside
    ///   `1..=MAX_EXTENSION_DAYS`.
    /// - `EngineError::CampaignNotFound` for an unknown ID.
    pub fn extend_expiry(
        &self,
        campaign_id: &CampaignId,
        additional_days: i64,
    ) -> Result<ExpiryExtension> {
        if additional_days <= 0 {
            return Err(
                ValidationError::single("additional_days must be greater than zero").into(),
            );
        }
        if additional_days > MAX_EXTENSION_DAYS {
            return Err(ValidationError::single(format!(
                "additional_days must be at most {MAX_EXTENSION_DAYS}"
            ))
            .into());
        }

        let (campaign, allocations_extended) = self
            .store
            .extend_campaign_expiry(campaign_id, Duration::days(additional_days))
            .map_err(|e| match e {
                StoreError::CampaignNotFound(id) => EngineError::CampaignNotFound(id),
                other => EngineError::Store(other),
            })?;

        info!(
            campaign_id = %campaign.campaign_id,
            new_expires_at = %campaign.expires_at,
            allocations_extended,
            "campaign expiry extended"
        );

        Ok(ExpiryExtension {
            campaign_id: campaign.campaign_id,
            new_expires_at: campaign.expires_at,
            allocations_extended,
        })
    }
}
