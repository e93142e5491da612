//! `RocksDB` storage layer for promo-ledger.
//!
//! This crate provides persistent storage for campaigns, allocations,
//! balances, and ledger transactions using `RocksDB` with column families
//! for efficient indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `campaigns`: Campaign records, keyed by `campaign_id`
//! - `allocations`: Allocation records, keyed by `allocation_id`
//! - `allocations_by_campaign` / `allocations_by_tenant`: listing indexes
//! - `allocation_expiry`: live allocations ordered by expiry time
//! - `balances`: Credit balances, keyed by `tenant_id || entity_id`
//! - `transactions`: Ledger rows, keyed by `transaction_id` (ULID)
//! - `transactions_by_entity`: Index for listing an entity's ledger
//!
//! Multi-row mutations (a grant and its ledger row, an expiry and its
//! reversal) go through a single `WriteBatch`, so either every write lands
//! or none does. Read-modify-write sections on campaign and balance rows
//! are serialized through sharded key locks.
//!
//! # Example
//!
//! ```no_run
//! use promo_ledger_store::{RocksStore, Store};
//! use promo_ledger_core::{campaign_operation, CampaignId, EntityId, TenantId, TransactionType};
//! use rust_decimal::Decimal;
//!
//! let store = RocksStore::open("/tmp/promo-ledger-db").unwrap();
//!
//! let tenant_id = TenantId::generate();
//! let entity_id = EntityId::generate();
//! let tx = store
//!     .apply_delta(
//!         &tenant_id,
//!         &entity_id,
//!         Decimal::new(2500, 2),
//!         TransactionType::SeasonalCampaign,
//!         &campaign_operation(CampaignId::generate()),
//!     )
//!     .unwrap();
//! assert_eq!(tx.new_balance, tx.previous_balance + tx.amount);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use promo_ledger_core::{
    Allocation, AllocationId, Campaign, CampaignId, CampaignStatus, CreditBalance,
    CreditTransaction, EntityId, TenantId, TransactionType,
};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Campaign Operations
    // =========================================================================

    /// Insert or update a campaign record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_campaign(&self, campaign: &Campaign) -> Result<()>;

    /// Get a campaign by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_campaign(&self, campaign_id: &CampaignId) -> Result<Option<Campaign>>;

    /// List campaigns, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_campaigns(&self, status: Option<CampaignStatus>) -> Result<Vec<Campaign>>;

    /// Atomically transition a campaign from `Pending` to `Processing` and
    /// return the updated record.
    ///
    /// This is the sole serialization point for a distribution run: the
    /// check and the write happen under the campaign's key lock, so two
    /// concurrent triggers cannot both proceed.
    ///
    /// # Errors
    ///
    /// - `StoreError::CampaignNotFound` if the campaign doesn't exist.
    /// - `StoreError::CampaignNotPending` if the stored status is anything
    ///   other than `Pending`.
    fn begin_distribution(&self, campaign_id: &CampaignId) -> Result<Campaign>;

    /// Write a distribution run's aggregate counts and the terminal status
    /// derived from them; returns the updated record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::CampaignNotFound` if the campaign doesn't
    /// exist.
    fn finalize_distribution(
        &self,
        campaign_id: &CampaignId,
        distributed: u32,
        failed: u32,
    ) -> Result<Campaign>;

    /// Push a campaign's expiry out by `additional` and cascade the new
    /// absolute date to every allocation under it, rewriting the expiry
    /// index for live allocations.
    ///
    /// The stored date is read and advanced under the campaign's key lock,
    /// so concurrent extensions accumulate instead of overwriting each
    /// other. One batch; returns the updated campaign and the number of
    /// cascaded allocations.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::CampaignNotFound` if the campaign doesn't
    /// exist.
    fn extend_campaign_expiry(
        &self,
        campaign_id: &CampaignId,
        additional: Duration,
    ) -> Result<(Campaign, usize)>;

    // =========================================================================
    // Allocation Operations
    // =========================================================================

    /// Insert an allocation record and its index entries (one batch).
    ///
    /// Live allocations also get an expiry index entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_allocation(&self, allocation: &Allocation) -> Result<()>;

    /// Get an allocation by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_allocation(&self, allocation_id: &AllocationId) -> Result<Option<Allocation>>;

    /// List all allocations of a campaign, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_allocations_by_campaign(&self, campaign_id: &CampaignId) -> Result<Vec<Allocation>>;

    /// List all allocations of a tenant, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_allocations_by_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Allocation>>;

    /// List live allocations expiring at or before `until`, ascending by
    /// expiry time.
    ///
    /// Re-querying gives a fresh snapshot; allocations already swept are
    /// filtered out.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_expiring(&self, until: DateTime<Utc>) -> Result<Vec<Allocation>>;

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Get the balance record for a tenant entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_balance(
        &self,
        tenant_id: &TenantId,
        entity_id: &EntityId,
    ) -> Result<Option<CreditBalance>>;

    /// Apply a signed credit delta to a balance and append the ledger row,
    /// as one atomic unit of work.
    ///
    /// The balance record is created lazily at zero on first use. A
    /// negative delta never drives the balance below zero: the written row
    /// records the effective (clamped) amount, so
    /// `new_balance == previous_balance + amount` holds for every row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn apply_delta(
        &self,
        tenant_id: &TenantId,
        entity_id: &EntityId,
        amount: Decimal,
        transaction_type: TransactionType,
        operation_code: &str,
    ) -> Result<CreditTransaction>;

    /// List ledger rows for an entity, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions(
        &self,
        tenant_id: &TenantId,
        entity_id: &EntityId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Grant campaign credit to one tenant entity: one balance mutation,
    /// one `SeasonalCampaign` ledger row for the total, and the tenant's
    /// allocation records with their indexes, all in a single batch.
    ///
    /// `total` must equal the sum over `allocations` of allocated credit;
    /// passing the per-application rows with the one summed mutation is
    /// what keeps an application-split grant atomic.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn grant_allocations(
        &self,
        tenant_id: &TenantId,
        entity_id: &EntityId,
        total: Decimal,
        operation_code: &str,
        allocations: &[Allocation],
    ) -> Result<CreditTransaction>;

    /// Expire one allocation: flip its flags, drop its expiry index entry,
    /// and reverse its unused credit through the ledger, all in a single
    /// batch.
    ///
    /// Returns the updated allocation and the reversal row, if any credit
    /// was reclaimed. Unused credit is `max(0, allocated - used)`; the
    /// reversal is clamped so the balance never goes below zero. A zero
    /// unused amount flips the flags without writing a ledger row.
    ///
    /// # Errors
    ///
    /// - `StoreError::AllocationNotFound` if the allocation doesn't exist.
    /// - `StoreError::AllocationNotActive` if it was already swept.
    fn expire_allocation(
        &self,
        allocation_id: &AllocationId,
        now: DateTime<Utc>,
    ) -> Result<(Allocation, Option<CreditTransaction>)>;
}
