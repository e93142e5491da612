//! Credit balances, the transaction ledger, and money math.
//!
//! All credit amounts are decimal with cent (two decimal place) precision.
//! Balances are mutable aggregates; transactions are immutable rows that
//! each carry the balance before and after, so the ledger replays to the
//! current balance.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::ids::{CampaignId, EntityId, TenantId, TransactionId};

/// Truncate a decimal amount to cent precision.
///
/// Splitting policies floor rather than round so a split never allocates
/// more than the amount being split.
#[must_use]
pub fn floor_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Per-recipient share when a pool is divided evenly.
///
/// Floored to cent precision; the sub-cent remainder stays in the pool.
/// A zero recipient count yields zero.
#[must_use]
pub fn equal_share(total: Decimal, recipients: usize) -> Decimal {
    if recipients == 0 {
        return Decimal::ZERO;
    }
    floor_cents(total / Decimal::from(recipients))
}

/// Split an amount into `parts` cent-precision shares that sum exactly to
/// the amount.
///
/// Each share is the floored even split; the remainder lands on the first
/// share. Requires the amount itself to be at cent precision.
#[must_use]
pub fn split_across(amount: Decimal, parts: usize) -> Vec<Decimal> {
    if parts == 0 {
        return Vec::new();
    }
    let share = floor_cents(amount / Decimal::from(parts));
    let mut shares = vec![share; parts];
    shares[0] += amount - share * Decimal::from(parts);
    shares
}

/// Ledger operation code for a campaign grant.
#[must_use]
pub fn campaign_operation(campaign_id: CampaignId) -> String {
    format!("seasonal_campaign:{campaign_id}")
}

/// Ledger operation code for an expiry claw-back.
#[must_use]
pub fn expiry_operation(campaign_id: CampaignId) -> String {
    format!("seasonal_expiry:{campaign_id}")
}

/// What kind of balance change a ledger row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// A campaign grant.
    SeasonalCampaign,

    /// An expiry claw-back of unused campaign credit.
    Expiry,
}

impl TransactionType {
    /// Wire name of the transaction type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SeasonalCampaign => "seasonal_campaign",
            Self::Expiry => "expiry",
        }
    }
}

/// Current credit balance for one tenant entity.
///
/// Created lazily on the first credit addition and mutated only through
/// the ledger's delta operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditBalance {
    /// Owning tenant.
    pub tenant_id: TenantId,

    /// Organization entity within the tenant.
    pub entity_id: EntityId,

    /// Spendable credit. Never negative.
    pub available_credits: Decimal,

    /// Credit held back for in-flight operations. This subsystem never
    /// reserves; the field is carried for the platform's shared schema.
    pub reserved_credits: Decimal,

    /// Whether the balance is live.
    pub is_active: bool,

    /// When the balance record was first created.
    pub created_at: DateTime<Utc>,

    /// When the balance was last changed.
    pub updated_at: DateTime<Utc>,
}

impl CreditBalance {
    /// A fresh zero balance for an entity seen for the first time.
    #[must_use]
    pub fn opened(tenant_id: TenantId, entity_id: EntityId, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            entity_id,
            available_credits: Decimal::ZERO,
            reserved_credits: Decimal::ZERO,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One immutable ledger row.
///
/// `new_balance` always equals `previous_balance + amount`; the amount is
/// the effective (possibly clamped) delta that was applied, not the
/// requested one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Time-ordered transaction ID.
    pub transaction_id: TransactionId,

    /// Owning tenant.
    pub tenant_id: TenantId,

    /// Organization entity within the tenant.
    pub entity_id: EntityId,

    /// What kind of change this row records.
    pub transaction_type: TransactionType,

    /// Signed effective delta. Positive for grants, negative for
    /// claw-backs.
    pub amount: Decimal,

    /// Balance before this row.
    pub previous_balance: Decimal,

    /// Balance after this row.
    pub new_balance: Decimal,

    /// Correlation key tying the row to its source, e.g.
    /// `seasonal_campaign:<campaign id>`.
    pub operation_code: String,

    /// When the row was written.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Record a balance change.
    #[must_use]
    pub fn record(
        tenant_id: TenantId,
        entity_id: EntityId,
        transaction_type: TransactionType,
        previous_balance: Decimal,
        amount: Decimal,
        operation_code: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: TransactionId::generate(),
            tenant_id,
            entity_id,
            transaction_type,
            amount,
            previous_balance,
            new_balance: previous_balance + amount,
            operation_code,
            created_at: now,
        }
    }
}
