//! API handlers.

pub mod allocations;
pub mod campaigns;
pub mod health;
pub mod ledger;
pub mod sweep;
