//! Credit balance and transaction audit handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use promo_ledger_core::{CreditTransaction, EntityId, TenantId};
use promo_ledger_store::Store;

use crate::error::ApiError;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Owning tenant.
    pub tenant_id: String,
    /// Credited entity.
    pub entity_id: String,
    /// Spendable credit.
    pub available_credits: Decimal,
    /// Credit held by in-flight operations.
    pub reserved_credits: Decimal,
    /// Whether the balance accepts operations.
    pub is_active: bool,
    /// Created timestamp.
    pub created_at: String,
    /// Updated timestamp.
    pub updated_at: String,
}

/// Get a credit balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, entity_id)): Path<(TenantId, EntityId)>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state
        .store
        .get_balance(&tenant_id, &entity_id)?
        .ok_or_else(|| ApiError::NotFound(format!("balance not found: {tenant_id}/{entity_id}")))?;

    Ok(Json(BalanceResponse {
        tenant_id: balance.tenant_id.to_string(),
        entity_id: balance.entity_id.to_string(),
        available_credits: balance.available_credits,
        reserved_credits: balance.reserved_credits,
        is_active: balance.is_active,
        created_at: balance.created_at.to_rfc3339(),
        updated_at: balance.updated_at.to_rfc3339(),
    }))
}

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of transactions to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Transaction response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction ID (time-ordered).
    pub transaction_id: String,
    /// Transaction type.
    pub transaction_type: String,
    /// Signed effective amount.
    pub amount: Decimal,
    /// Balance before this transaction.
    pub previous_balance: Decimal,
    /// Balance after this transaction.
    pub new_balance: Decimal,
    /// Operation code linking back to the producing campaign.
    pub operation_code: String,
    /// Timestamp.
    pub created_at: String,
}

impl From<&CreditTransaction> for TransactionResponse {
    fn from(tx: &CreditTransaction) -> Self {
        Self {
            transaction_id: tx.transaction_id.to_string(),
            transaction_type: tx.transaction_type.as_str().to_string(),
            amount: tx.amount,
            previous_balance: tx.previous_balance,
            new_balance: tx.new_balance,
            operation_code: tx.operation_code.clone(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List a balance's transaction history, newest first.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, entity_id)): Path<(TenantId, EntityId)>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    // Verify the balance exists
    state
        .store
        .get_balance(&tenant_id, &entity_id)?
        .ok_or_else(|| ApiError::NotFound(format!("balance not found: {tenant_id}/{entity_id}")))?;

    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(100);
    let transactions =
        state
            .store
            .list_transactions(&tenant_id, &entity_id, limit + 1, query.offset)?;

    let has_more = transactions.len() > limit;
    let transactions: Vec<_> = transactions
        .iter()
        .take(limit)
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}
