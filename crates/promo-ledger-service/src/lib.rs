//! Promo-Ledger HTTP API Service.
//!
//! This crate provides the HTTP API for the promo-ledger service,
//! including:
//!
//! - Campaign creation, listing, and status
//! - Distribution runs and expiry extension
//! - Allocation and ledger audit reads
//! - Expiry sweep and warning triggers
//!
//! External collaborators (the tenant directory and the notification
//! service) are reached through reqwest clients and are both optional;
//! the service degrades with a warning when either is absent.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Sweep handlers wrap sync engine calls

pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use directory::DirectoryClient;
pub use error::ApiError;
pub use notify::NotifyClient;
pub use routes::create_router;
pub use state::AppState;
