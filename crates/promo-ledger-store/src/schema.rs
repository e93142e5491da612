//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Campaign records, keyed by `campaign_id`.
    pub const CAMPAIGNS: &str = "campaigns";

    /// Allocation records, keyed by `allocation_id`.
    pub const ALLOCATIONS: &str = "allocations";

    /// Index: allocations by campaign, keyed by `campaign_id || allocation_id`.
    /// Value is empty (index only).
    pub const ALLOCATIONS_BY_CAMPAIGN: &str = "allocations_by_campaign";

    /// Index: allocations by tenant, keyed by `tenant_id || allocation_id`.
    /// Value is empty (index only).
    pub const ALLOCATIONS_BY_TENANT: &str = "allocations_by_tenant";

    /// Index: live allocations by expiry time, keyed by
    /// `expires_at_millis_be || allocation_id`. Holds only active,
    /// not-yet-expired allocations; entries are dropped when an allocation
    /// is swept and rewritten when its expiry moves.
    pub const ALLOCATION_EXPIRY: &str = "allocation_expiry";

    /// Credit balances, keyed by `tenant_id || entity_id`.
    pub const BALANCES: &str = "balances";

    /// Ledger transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by entity, keyed by
    /// `tenant_id || entity_id || transaction_id`. Value is empty.
    pub const TRANSACTIONS_BY_ENTITY: &str = "transactions_by_entity";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::CAMPAIGNS,
        cf::ALLOCATIONS,
        cf::ALLOCATIONS_BY_CAMPAIGN,
        cf::ALLOCATIONS_BY_TENANT,
        cf::ALLOCATION_EXPIRY,
        cf::BALANCES,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_ENTITY,
    ]
}
