//! Core domain types for the promo-ledger platform.
//!
//! This crate defines the campaign, allocation, balance, and ledger types
//! shared by the storage layer, the distribution engine, and the HTTP
//! service. It holds no I/O; everything here is plain data plus the money
//! math used when a campaign pool is split.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod allocation;
pub mod campaign;
pub mod credit;
pub mod error;
pub mod ids;

pub use allocation::{Allocation, AllocationStatus};
pub use campaign::{
    AllocationMode, ApplicationCode, Campaign, CampaignStatus, CreditType, DistributionMethod,
    NewCampaign, TargetSelection, MAX_CAMPAIGN_NAME_LEN,
};
pub use credit::{
    campaign_operation, equal_share, expiry_operation, floor_cents, split_across, CreditBalance,
    CreditTransaction, TransactionType,
};
pub use error::ValidationError;
pub use ids::{AllocationId, CampaignId, EntityId, IdError, TenantId, TransactionId};
