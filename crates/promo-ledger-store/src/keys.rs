//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in
//! column families. Composite keys concatenate fixed-width components so
//! prefix iteration and lexicographic order line up with the query the
//! index serves.

use chrono::{DateTime, Utc};

use promo_ledger_core::{AllocationId, CampaignId, EntityId, TenantId, TransactionId};

/// Create a campaign key from a campaign ID.
#[must_use]
pub fn campaign_key(campaign_id: &CampaignId) -> Vec<u8> {
    campaign_id.as_bytes().to_vec()
}

/// Create an allocation key from an allocation ID.
#[must_use]
pub fn allocation_key(allocation_id: &AllocationId) -> Vec<u8> {
    allocation_id.as_bytes().to_vec()
}

/// Create a campaign-allocation index key.
///
/// Format: `campaign_id (16 bytes) || allocation_id (16 bytes)`
#[must_use]
pub fn campaign_allocation_key(campaign_id: &CampaignId, allocation_id: &AllocationId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(campaign_id.as_bytes());
    key.extend_from_slice(allocation_id.as_bytes());
    key
}

/// Create a prefix for iterating all allocations of a campaign.
#[must_use]
pub fn campaign_allocations_prefix(campaign_id: &CampaignId) -> Vec<u8> {
    campaign_id.as_bytes().to_vec()
}

/// Create a tenant-allocation index key.
///
/// Format: `tenant_id (16 bytes) || allocation_id (16 bytes)`
#[must_use]
pub fn tenant_allocation_key(tenant_id: &TenantId, allocation_id: &AllocationId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(tenant_id.as_bytes());
    key.extend_from_slice(allocation_id.as_bytes());
    key
}

/// Create a prefix for iterating all allocations of a tenant.
#[must_use]
pub fn tenant_allocations_prefix(tenant_id: &TenantId) -> Vec<u8> {
    tenant_id.as_bytes().to_vec()
}

/// Extract the allocation ID from a 32-byte `parent || allocation` index
/// key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_allocation_id_from_index_key(key: &[u8]) -> AllocationId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    AllocationId::from_bytes(bytes)
}

/// Encode a timestamp for the expiry index: milliseconds since epoch,
/// big-endian, so byte order equals time order.
#[must_use]
pub fn expiry_millis(expires_at: DateTime<Utc>) -> [u8; 8] {
    u64::try_from(expires_at.timestamp_millis())
        .unwrap_or(0)
        .to_be_bytes()
}

/// Create an expiry index key.
///
/// Format: `expires_at_millis_be (8 bytes) || allocation_id (16 bytes)`
#[must_use]
pub fn expiry_key(expires_at: DateTime<Utc>, allocation_id: &AllocationId) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(&expiry_millis(expires_at));
    key.extend_from_slice(allocation_id.as_bytes());
    key
}

/// Extract the allocation ID from an expiry index key.
///
/// # Panics
///
/// Panics if the key is not at least 24 bytes.
#[must_use]
pub fn extract_allocation_id_from_expiry_key(key: &[u8]) -> AllocationId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[8..24]);
    AllocationId::from_bytes(bytes)
}

/// Create a balance key.
///
/// Format: `tenant_id (16 bytes) || entity_id (16 bytes)`
#[must_use]
pub fn balance_key(tenant_id: &TenantId, entity_id: &EntityId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(tenant_id.as_bytes());
    key.extend_from_slice(entity_id.as_bytes());
    key
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create an entity-transaction index key.
///
/// Format: `tenant_id (16) || entity_id (16) || transaction_id (16)`
///
/// Since ULIDs are time-ordered, transactions for an entity sort by time.
#[must_use]
pub fn entity_transaction_key(
    tenant_id: &TenantId,
    entity_id: &EntityId,
    transaction_id: &TransactionId,
) -> Vec<u8> {
    let mut key = Vec::with_capacity(48);
    key.extend_from_slice(tenant_id.as_bytes());
    key.extend_from_slice(entity_id.as_bytes());
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Create a prefix for iterating all transactions of an entity.
#[must_use]
pub fn entity_transactions_prefix(tenant_id: &TenantId, entity_id: &EntityId) -> Vec<u8> {
    balance_key(tenant_id, entity_id)
}

/// Extract the transaction ID from an entity-transaction index key.
///
/// # Panics
///
/// Panics if the key is not at least 48 bytes.
#[must_use]
pub fn extract_transaction_id_from_entity_key(key: &[u8]) -> TransactionId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[32..48]);
    TransactionId::from_bytes(bytes).expect("valid ULID bytes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_key_length() {
        let campaign_id = CampaignId::generate();
        let key = campaign_key(&campaign_id);
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn campaign_allocation_key_format() {
        let campaign_id = CampaignId::generate();
        let allocation_id = AllocationId::generate();
        let key = campaign_allocation_key(&campaign_id, &allocation_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], campaign_id.as_bytes());
        assert_eq!(&key[16..], allocation_id.as_bytes());
        assert_eq!(extract_allocation_id_from_index_key(&key), allocation_id);
    }

    #[test]
    fn expiry_keys_order_by_time() {
        let allocation_id = AllocationId::generate();
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::days(3);

        let key_earlier = expiry_key(earlier, &allocation_id);
        let key_later = expiry_key(later, &allocation_id);

        assert_eq!(key_earlier.len(), 24);
        assert!(key_earlier < key_later);
        assert_eq!(
            extract_allocation_id_from_expiry_key(&key_earlier),
            allocation_id
        );
    }

    #[test]
    fn balance_key_format() {
        let tenant_id = TenantId::generate();
        let entity_id = EntityId::generate();
        let key = balance_key(&tenant_id, &entity_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], tenant_id.as_bytes());
        assert_eq!(&key[16..], entity_id.as_bytes());
    }

    #[test]
    fn entity_transaction_key_roundtrip() {
        let tenant_id = TenantId::generate();
        let entity_id = EntityId::generate();
        let tx_id = TransactionId::generate();
        let key = entity_transaction_key(&tenant_id, &entity_id, &tx_id);

        assert_eq!(key.len(), 48);
        assert_eq!(extract_transaction_id_from_entity_key(&key), tx_id);
    }
}
