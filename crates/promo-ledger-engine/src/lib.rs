//! Campaign lifecycle and distribution engine.
//!
//! Sits between the HTTP surface and the store: validates and persists
//! campaigns, fans credit out to tenants with bounded parallelism, sweeps
//! expired allocations back into the ledger, and warns tenants before
//! their credit lapses.
//!
//! Collaborator lookups (the tenant directory) and outbound notifications
//! are behind traits so the engine can run against fakes in tests and
//! degrade gracefully when a collaborator is not configured.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod campaigns;
pub mod directory;
pub mod distribute;
pub mod error;
pub mod notify;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testkit;

pub use campaigns::{CampaignManager, ExpiryExtension};
pub use directory::{OrgEntity, TenantDirectory};
pub use distribute::{
    DistributionReport, Distributor, FailedTenant, DEFAULT_MAX_PARALLEL,
};
pub use error::{CollaboratorError, EngineError, Result};
pub use notify::{Notification, NotificationSink};
pub use sweep::{ExpirySweeper, SweepReport, WarningReport};
