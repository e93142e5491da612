//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store`
//! trait.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};
use rust_decimal::Decimal;
use tracing::warn;

use promo_ledger_core::{
    expiry_operation, Allocation, AllocationId, Campaign, CampaignId, CampaignStatus,
    CreditBalance, CreditTransaction, EntityId, TenantId, TransactionType,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

const LOCK_SHARDS: usize = 64;

/// Sharded key locks serializing read-modify-write sections on a row.
///
/// Two keys hashing to the same shard serialize against each other; that
/// is harmless, just coarser. A poisoned shard is recovered by taking the
/// inner guard; the protected state lives in the database, not behind
/// the mutex.
struct KeyLocks {
    shards: Vec<Mutex<()>>,
}

impl KeyLocks {
    fn new() -> Self {
        Self {
            shards: (0..LOCK_SHARDS).map(|_| Mutex::new(())).collect(),
        }
    }

    fn lock(&self, key: &[u8]) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        #[allow(clippy::cast_possible_truncation)]
        let shard = (hasher.finish() % self.shards.len() as u64) as usize;
        match self.shards[shard].lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// `RocksDB`-backed storage implementation.
///
/// Lock order is campaign before balance; no code path takes them in the
/// other direction.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    campaign_locks: KeyLocks,
    balance_locks: KeyLocks,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            campaign_locks: KeyLocks::new(),
            balance_locks: KeyLocks::new(),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Stage an allocation insert and its index entries on a batch.
    fn stage_allocation(&self, batch: &mut WriteBatch, allocation: &Allocation) -> Result<()> {
        let cf_allocations = self.cf(cf::ALLOCATIONS)?;
        let cf_by_campaign = self.cf(cf::ALLOCATIONS_BY_CAMPAIGN)?;
        let cf_by_tenant = self.cf(cf::ALLOCATIONS_BY_TENANT)?;
        let cf_expiry = self.cf(cf::ALLOCATION_EXPIRY)?;

        let value = Self::serialize(allocation)?;
        batch.put_cf(
            &cf_allocations,
            keys::allocation_key(&allocation.allocation_id),
            value,
        );
        batch.put_cf(
            &cf_by_campaign,
            keys::campaign_allocation_key(&allocation.campaign_id, &allocation.allocation_id),
            [],
        );
        batch.put_cf(
            &cf_by_tenant,
            keys::tenant_allocation_key(&allocation.tenant_id, &allocation.allocation_id),
            [],
        );
        if allocation.is_live() {
            batch.put_cf(
                &cf_expiry,
                keys::expiry_key(allocation.expires_at, &allocation.allocation_id),
                [],
            );
        }
        Ok(())
    }

    /// Stage a balance write plus its ledger row on a batch.
    ///
    /// Callers must hold the balance key lock for the affected row.
    fn stage_ledger_write(
        &self,
        batch: &mut WriteBatch,
        balance: &CreditBalance,
        transaction: &CreditTransaction,
    ) -> Result<()> {
        let cf_balances = self.cf(cf::BALANCES)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_by_entity = self.cf(cf::TRANSACTIONS_BY_ENTITY)?;

        batch.put_cf(
            &cf_balances,
            keys::balance_key(&balance.tenant_id, &balance.entity_id),
            Self::serialize(balance)?,
        );
        batch.put_cf(
            &cf_tx,
            keys::transaction_key(&transaction.transaction_id),
            Self::serialize(transaction)?,
        );
        batch.put_cf(
            &cf_by_entity,
            keys::entity_transaction_key(
                &transaction.tenant_id,
                &transaction.entity_id,
                &transaction.transaction_id,
            ),
            [],
        );
        Ok(())
    }

    /// Read a balance, or a fresh zero record when the entity is new.
    fn balance_or_opened(
        &self,
        tenant_id: &TenantId,
        entity_id: &EntityId,
        now: DateTime<Utc>,
    ) -> Result<CreditBalance> {
        Ok(self
            .get_balance(tenant_id, entity_id)?
            .unwrap_or_else(|| CreditBalance::opened(*tenant_id, *entity_id, now)))
    }

    /// Apply a signed delta to a balance record, clamping at zero, and
    /// build the matching ledger row with the effective amount.
    fn mutate_balance(
        balance: &mut CreditBalance,
        amount: Decimal,
        transaction_type: TransactionType,
        operation_code: &str,
        now: DateTime<Utc>,
    ) -> CreditTransaction {
        let previous = balance.available_credits;
        let mut target = previous + amount;
        if target < Decimal::ZERO {
            target = Decimal::ZERO;
        }
        balance.available_credits = target;
        balance.updated_at = now;

        CreditTransaction::record(
            balance.tenant_id,
            balance.entity_id,
            transaction_type,
            previous,
            target - previous,
            operation_code.to_string(),
            now,
        )
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn fetch_campaign(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        self.get_campaign(campaign_id)?
            .ok_or(StoreError::CampaignNotFound(*campaign_id))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Campaign Operations
    // =========================================================================

    fn put_campaign(&self, campaign: &Campaign) -> Result<()> {
        let cf = self.cf(cf::CAMPAIGNS)?;
        let key = keys::campaign_key(&campaign.campaign_id);
        let value = Self::serialize(campaign)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_campaign(&self, campaign_id: &CampaignId) -> Result<Option<Campaign>> {
        let cf = self.cf(cf::CAMPAIGNS)?;
        let key = keys::campaign_key(campaign_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_campaigns(&self, status: Option<CampaignStatus>) -> Result<Vec<Campaign>> {
        let cf = self.cf(cf::CAMPAIGNS)?;
        let mut campaigns = Vec::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let campaign: Campaign = Self::deserialize(&value)?;
            if status.map_or(true, |s| campaign.distribution_status == s) {
                campaigns.push(campaign);
            }
        }

        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(campaigns)
    }

    fn begin_distribution(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        let key = keys::campaign_key(campaign_id);
        let _guard = self.campaign_locks.lock(&key);

        let mut campaign = self.fetch_campaign(campaign_id)?;
        if campaign.distribution_status != CampaignStatus::Pending {
            return Err(StoreError::CampaignNotPending {
                campaign_id: *campaign_id,
                status: campaign.distribution_status,
            });
        }

        campaign.distribution_status = CampaignStatus::Processing;
        campaign.updated_at = Utc::now();

        let cf = self.cf(cf::CAMPAIGNS)?;
        let value = Self::serialize(&campaign)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(campaign)
    }

    fn finalize_distribution(
        &self,
        campaign_id: &CampaignId,
        distributed: u32,
        failed: u32,
    ) -> Result<Campaign> {
        let key = keys::campaign_key(campaign_id);
        let _guard = self.campaign_locks.lock(&key);

        let mut campaign = self.fetch_campaign(campaign_id)?;
        campaign.distributed_count = distributed;
        campaign.failed_count = failed;
        campaign.distribution_status = CampaignStatus::from_counts(distributed, failed);
        campaign.updated_at = Utc::now();

        let cf = self.cf(cf::CAMPAIGNS)?;
        let value = Self::serialize(&campaign)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(campaign)
    }

    fn extend_campaign_expiry(
        &self,
        campaign_id: &CampaignId,
        additional: Duration,
    ) -> Result<(Campaign, usize)> {
        let key = keys::campaign_key(campaign_id);
        let _guard = self.campaign_locks.lock(&key);

        let now = Utc::now();
        let mut campaign = self.fetch_campaign(campaign_id)?;
        // Read and advance under the lock so concurrent extensions stack.
        let new_expires_at = campaign.expires_at + additional;
        campaign.expires_at = new_expires_at;
        campaign.updated_at = now;

        let cf_campaigns = self.cf(cf::CAMPAIGNS)?;
        let cf_allocations = self.cf(cf::ALLOCATIONS)?;
        let cf_expiry = self.cf(cf::ALLOCATION_EXPIRY)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_campaigns, &key, Self::serialize(&campaign)?);

        let allocations = self.list_allocations_by_campaign(campaign_id)?;
        let cascaded = allocations.len();
        for mut allocation in allocations {
            if allocation.is_live() {
                batch.delete_cf(
                    &cf_expiry,
                    keys::expiry_key(allocation.expires_at, &allocation.allocation_id),
                );
                batch.put_cf(
                    &cf_expiry,
                    keys::expiry_key(new_expires_at, &allocation.allocation_id),
                    [],
                );
            }
            allocation.expires_at = new_expires_at;
            allocation.updated_at = now;
            batch.put_cf(
                &cf_allocations,
                keys::allocation_key(&allocation.allocation_id),
                Self::serialize(&allocation)?,
            );
        }

        self.write_batch(batch)?;
        Ok((campaign, cascaded))
    }

    // =========================================================================
    // Allocation Operations
    // =========================================================================

    fn put_allocation(&self, allocation: &Allocation) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_allocation(&mut batch, allocation)?;
        self.write_batch(batch)
    }

    fn get_allocation(&self, allocation_id: &AllocationId) -> Result<Option<Allocation>> {
        let cf = self.cf(cf::ALLOCATIONS)?;
        let key = keys::allocation_key(allocation_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_allocations_by_campaign(&self, campaign_id: &CampaignId) -> Result<Vec<Allocation>> {
        let cf_by_campaign = self.cf(cf::ALLOCATIONS_BY_CAMPAIGN)?;
        let prefix = keys::campaign_allocations_prefix(campaign_id);
        self.collect_indexed_allocations(&cf_by_campaign, &prefix)
    }

    fn list_allocations_by_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Allocation>> {
        let cf_by_tenant = self.cf(cf::ALLOCATIONS_BY_TENANT)?;
        let prefix = keys::tenant_allocations_prefix(tenant_id);
        self.collect_indexed_allocations(&cf_by_tenant, &prefix)
    }

    fn list_expiring(&self, until: DateTime<Utc>) -> Result<Vec<Allocation>> {
        let cf_expiry = self.cf(cf::ALLOCATION_EXPIRY)?;
        let until_bytes = keys::expiry_millis(until);

        let mut expiring = Vec::new();
        for item in self.db.iterator_cf(&cf_expiry, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if key.len() < 24 || key[..8] > until_bytes[..] {
                break;
            }

            let allocation_id = keys::extract_allocation_id_from_expiry_key(&key);
            match self.get_allocation(&allocation_id)? {
                Some(allocation) if allocation.is_live() => expiring.push(allocation),
                Some(_) => {}
                None => {
                    warn!(allocation_id = %allocation_id, "expiry index entry points at missing allocation");
                }
            }
        }

        Ok(expiring)
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    fn get_balance(
        &self,
        tenant_id: &TenantId,
        entity_id: &EntityId,
    ) -> Result<Option<CreditBalance>> {
        let cf = self.cf(cf::BALANCES)?;
        let key = keys::balance_key(tenant_id, entity_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn apply_delta(
        &self,
        tenant_id: &TenantId,
        entity_id: &EntityId,
        amount: Decimal,
        transaction_type: TransactionType,
        operation_code: &str,
    ) -> Result<CreditTransaction> {
        let key = keys::balance_key(tenant_id, entity_id);
        let _guard = self.balance_locks.lock(&key);

        let now = Utc::now();
        let mut balance = self.balance_or_opened(tenant_id, entity_id, now)?;
        let transaction =
            Self::mutate_balance(&mut balance, amount, transaction_type, operation_code, now);

        let mut batch = WriteBatch::default();
        self.stage_ledger_write(&mut batch, &balance, &transaction)?;
        self.write_batch(batch)?;

        Ok(transaction)
    }

    fn list_transactions(
        &self,
        tenant_id: &TenantId,
        entity_id: &EntityId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let cf_by_entity = self.cf(cf::TRANSACTIONS_BY_ENTITY)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let prefix = keys::entity_transactions_prefix(tenant_id, entity_id);

        let iter = self.db.iterator_cf(
            &cf_by_entity,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        // Collect matching keys first; ULID suffixes put them in time order.
        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            all_keys.push(key.to_vec());
        }

        // Reverse to get newest first.
        all_keys.reverse();

        let mut transactions = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if transactions.len() >= limit {
                break;
            }

            let tx_id = keys::extract_transaction_id_from_entity_key(&key);
            let tx_key = keys::transaction_key(&tx_id);
            if let Some(data) = self
                .db
                .get_cf(&cf_tx, tx_key)
                .map_err(|e| StoreError::Database(e.to_string()))?
            {
                transactions.push(Self::deserialize(&data)?);
            }
        }

        Ok(transactions)
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn grant_allocations(
        &self,
        tenant_id: &TenantId,
        entity_id: &EntityId,
        total: Decimal,
        operation_code: &str,
        allocations: &[Allocation],
    ) -> Result<CreditTransaction> {
        let key = keys::balance_key(tenant_id, entity_id);
        let _guard = self.balance_locks.lock(&key);

        let now = Utc::now();
        let mut balance = self.balance_or_opened(tenant_id, entity_id, now)?;
        let transaction = Self::mutate_balance(
            &mut balance,
            total,
            TransactionType::SeasonalCampaign,
            operation_code,
            now,
        );

        let mut batch = WriteBatch::default();
        self.stage_ledger_write(&mut batch, &balance, &transaction)?;
        for allocation in allocations {
            self.stage_allocation(&mut batch, allocation)?;
        }
        self.write_batch(batch)?;

        Ok(transaction)
    }

    fn expire_allocation(
        &self,
        allocation_id: &AllocationId,
        now: DateTime<Utc>,
    ) -> Result<(Allocation, Option<CreditTransaction>)> {
        // The campaign lock excludes a concurrent expiry extension
        // rewriting this allocation mid-sweep; the unlocked read just
        // finds which campaign that is.
        let unlocked = self
            .get_allocation(allocation_id)?
            .ok_or(StoreError::AllocationNotFound(*allocation_id))?;
        let campaign_key = keys::campaign_key(&unlocked.campaign_id);
        let _campaign_guard = self.campaign_locks.lock(&campaign_key);

        let mut allocation = self
            .get_allocation(allocation_id)?
            .ok_or(StoreError::AllocationNotFound(*allocation_id))?;
        if !allocation.is_live() {
            return Err(StoreError::AllocationNotActive(*allocation_id));
        }

        let cf_allocations = self.cf(cf::ALLOCATIONS)?;
        let cf_expiry = self.cf(cf::ALLOCATION_EXPIRY)?;

        let expiry_entry = keys::expiry_key(allocation.expires_at, allocation_id);
        let unused = allocation.unused_credits();
        allocation.mark_expired(now);

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_allocations,
            keys::allocation_key(allocation_id),
            Self::serialize(&allocation)?,
        );
        batch.delete_cf(&cf_expiry, expiry_entry);

        let entity_id = allocation.entity_id.filter(|_| unused > Decimal::ZERO);
        let transaction = if let Some(entity_id) = entity_id {
            let balance_key = keys::balance_key(&allocation.tenant_id, &entity_id);
            let _balance_guard = self.balance_locks.lock(&balance_key);

            let mut balance = self.balance_or_opened(&allocation.tenant_id, &entity_id, now)?;
            let row = Self::mutate_balance(
                &mut balance,
                -unused,
                TransactionType::Expiry,
                &expiry_operation(allocation.campaign_id),
                now,
            );
            self.stage_ledger_write(&mut batch, &balance, &row)?;
            self.write_batch(batch)?;
            Some(row)
        } else {
            self.write_batch(batch)?;
            None
        };

        Ok((allocation, transaction))
    }
}

impl RocksStore {
    /// Fetch the allocations behind a `parent || allocation_id` index
    /// prefix, in creation order.
    fn collect_indexed_allocations(
        &self,
        cf_index: &Arc<BoundColumnFamily<'_>>,
        prefix: &[u8],
    ) -> Result<Vec<Allocation>> {
        let iter = self.db.iterator_cf(
            cf_index,
            IteratorMode::From(prefix, rocksdb::Direction::Forward),
        );

        let mut allocations = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(prefix) {
                break;
            }

            let allocation_id = keys::extract_allocation_id_from_index_key(&key);
            if let Some(allocation) = self.get_allocation(&allocation_id)? {
                allocations.push(allocation);
            }
        }

        allocations.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(allocations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use promo_ledger_core::{
        campaign_operation, AllocationMode, AllocationStatus, CreditType, DistributionMethod,
        TargetSelection,
    };
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn sample_campaign() -> Campaign {
        let now = Utc::now();
        Campaign {
            campaign_id: CampaignId::generate(),
            campaign_name: "Summer promo".to_string(),
            credit_type: CreditType::Promotional,
            total_credits: dec!(500),
            credits_per_tenant: None,
            distribution_method: DistributionMethod::Equal,
            target: TargetSelection::AllTenants,
            allocation_mode: AllocationMode::PrimaryOrg,
            expires_at: now + Duration::days(30),
            send_notifications: false,
            notification_template: None,
            distribution_status: CampaignStatus::Pending,
            distributed_count: 0,
            failed_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_allocation(campaign_id: CampaignId, tenant_id: TenantId) -> Allocation {
        let now = Utc::now();
        Allocation::granted(
            campaign_id,
            tenant_id,
            EntityId::generate(),
            "organization".to_string(),
            None,
            dec!(100),
            now + Duration::days(30),
            now,
        )
    }

    #[test]
    fn campaign_crud_and_listing() {
        let (store, _dir) = create_test_store();
        let campaign = sample_campaign();

        store.put_campaign(&campaign).unwrap();

        let retrieved = store.get_campaign(&campaign.campaign_id).unwrap().unwrap();
        assert_eq!(retrieved.campaign_name, "Summer promo");
        assert_eq!(retrieved.total_credits, dec!(500));
        assert_eq!(retrieved.distribution_status, CampaignStatus::Pending);

        let all = store.list_campaigns(None).unwrap();
        assert_eq!(all.len(), 1);

        let pending = store
            .list_campaigns(Some(CampaignStatus::Pending))
            .unwrap();
        assert_eq!(pending.len(), 1);

        let completed = store
            .list_campaigns(Some(CampaignStatus::Completed))
            .unwrap();
        assert!(completed.is_empty());
    }

    #[test]
    fn begin_distribution_is_conditional() {
        let (store, _dir) = create_test_store();
        let campaign = sample_campaign();
        store.put_campaign(&campaign).unwrap();

        let processing = store.begin_distribution(&campaign.campaign_id).unwrap();
        assert_eq!(processing.distribution_status, CampaignStatus::Processing);

        let second = store.begin_distribution(&campaign.campaign_id);
        assert!(matches!(
            second,
            Err(StoreError::CampaignNotPending {
                status: CampaignStatus::Processing,
                ..
            })
        ));

        let finalized = store
            .finalize_distribution(&campaign.campaign_id, 4, 1)
            .unwrap();
        assert_eq!(
            finalized.distribution_status,
            CampaignStatus::PartialSuccess
        );
        assert_eq!(finalized.distributed_count, 4);
        assert_eq!(finalized.failed_count, 1);
    }

    #[test]
    fn concurrent_begin_admits_exactly_one() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let campaign = sample_campaign();
        store.put_campaign(&campaign).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let campaign_id = campaign.campaign_id;
            handles.push(std::thread::spawn(move || {
                store.begin_distribution(&campaign_id).is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }

    #[test]
    fn allocation_indexes_and_expiry_listing() {
        let (store, _dir) = create_test_store();
        let campaign = sample_campaign();
        let tenant_id = TenantId::generate();
        let now = Utc::now();

        let soon = Allocation::granted(
            campaign.campaign_id,
            tenant_id,
            EntityId::generate(),
            "organization".to_string(),
            None,
            dec!(40),
            now + Duration::days(3),
            now,
        );
        let later = Allocation::granted(
            campaign.campaign_id,
            tenant_id,
            EntityId::generate(),
            "organization".to_string(),
            None,
            dec!(60),
            now + Duration::days(20),
            now,
        );
        let failed = Allocation::failed(
            campaign.campaign_id,
            tenant_id,
            dec!(40),
            now + Duration::days(3),
            "no entity".to_string(),
            now,
        );
        store.put_allocation(&soon).unwrap();
        store.put_allocation(&later).unwrap();
        store.put_allocation(&failed).unwrap();

        let by_campaign = store
            .list_allocations_by_campaign(&campaign.campaign_id)
            .unwrap();
        assert_eq!(by_campaign.len(), 3);

        let by_tenant = store.list_allocations_by_tenant(&tenant_id).unwrap();
        assert_eq!(by_tenant.len(), 3);

        // Failed allocations never enter the expiry index.
        let expiring = store.list_expiring(now + Duration::days(7)).unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].allocation_id, soon.allocation_id);

        let expiring_all = store.list_expiring(now + Duration::days(30)).unwrap();
        assert_eq!(expiring_all.len(), 2);
        assert_eq!(expiring_all[0].allocation_id, soon.allocation_id);
        assert_eq!(expiring_all[1].allocation_id, later.allocation_id);
    }

    #[test]
    fn apply_delta_creates_balance_and_links_rows() {
        let (store, _dir) = create_test_store();
        let tenant_id = TenantId::generate();
        let entity_id = EntityId::generate();
        let operation = campaign_operation(CampaignId::generate());

        let grant = store
            .apply_delta(
                &tenant_id,
                &entity_id,
                dec!(100),
                TransactionType::SeasonalCampaign,
                &operation,
            )
            .unwrap();
        assert_eq!(grant.previous_balance, dec!(0));
        assert_eq!(grant.new_balance, dec!(100));

        let balance = store.get_balance(&tenant_id, &entity_id).unwrap().unwrap();
        assert_eq!(balance.available_credits, dec!(100));

        let deduction = store
            .apply_delta(
                &tenant_id,
                &entity_id,
                dec!(-30),
                TransactionType::Expiry,
                &operation,
            )
            .unwrap();
        assert_eq!(deduction.previous_balance, dec!(100));
        assert_eq!(deduction.amount, dec!(-30));
        assert_eq!(deduction.new_balance, dec!(70));
    }

    #[test]
    fn apply_delta_floors_balance_at_zero() {
        let (store, _dir) = create_test_store();
        let tenant_id = TenantId::generate();
        let entity_id = EntityId::generate();
        let operation = expiry_operation(CampaignId::generate());

        store
            .apply_delta(
                &tenant_id,
                &entity_id,
                dec!(50),
                TransactionType::SeasonalCampaign,
                &operation,
            )
            .unwrap();

        // Requested -80, only -50 available: the row records the effective
        // amount so its arithmetic still holds.
        let clamped = store
            .apply_delta(
                &tenant_id,
                &entity_id,
                dec!(-80),
                TransactionType::Expiry,
                &operation,
            )
            .unwrap();
        assert_eq!(clamped.amount, dec!(-50));
        assert_eq!(clamped.new_balance, dec!(0));
        assert_eq!(
            clamped.previous_balance + clamped.amount,
            clamped.new_balance
        );

        let balance = store.get_balance(&tenant_id, &entity_id).unwrap().unwrap();
        assert_eq!(balance.available_credits, dec!(0));
    }

    #[test]
    fn grant_allocations_is_one_mutation() {
        let (store, _dir) = create_test_store();
        let campaign = sample_campaign();
        let tenant_id = TenantId::generate();
        let entity_id = EntityId::generate();
        let now = Utc::now();
        let operation = campaign_operation(campaign.campaign_id);

        let allocations: Vec<Allocation> = [
            promo_ledger_core::ApplicationCode::Crm,
            promo_ledger_core::ApplicationCode::Hr,
            promo_ledger_core::ApplicationCode::Affiliate,
        ]
        .iter()
        .map(|app| {
            Allocation::granted(
                campaign.campaign_id,
                tenant_id,
                entity_id,
                "organization".to_string(),
                Some(*app),
                dec!(100),
                now + Duration::days(30),
                now,
            )
        })
        .collect();

        let tx = store
            .grant_allocations(&tenant_id, &entity_id, dec!(300), &operation, &allocations)
            .unwrap();
        assert_eq!(tx.amount, dec!(300));
        assert_eq!(tx.new_balance, dec!(300));

        let balance = store.get_balance(&tenant_id, &entity_id).unwrap().unwrap();
        assert_eq!(balance.available_credits, dec!(300));

        // A single ledger row covers the whole tenant grant.
        let rows = store
            .list_transactions(&tenant_id, &entity_id, 10, 0)
            .unwrap();
        assert_eq!(rows.len(), 1);

        let stored = store
            .list_allocations_by_campaign(&campaign.campaign_id)
            .unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored
            .iter()
            .all(|a| a.allocated_credits == dec!(100)
                && a.distribution_status == AllocationStatus::Completed));
    }

    #[test]
    fn expire_allocation_reverses_unused_once() {
        let (store, _dir) = create_test_store();
        let campaign = sample_campaign();
        store.put_campaign(&campaign).unwrap();
        let tenant_id = TenantId::generate();
        let now = Utc::now();

        let mut allocation = sample_allocation(campaign.campaign_id, tenant_id);
        allocation.used_credits = dec!(40);
        let entity_id = allocation.entity_id.unwrap();

        store
            .grant_allocations(
                &tenant_id,
                &entity_id,
                dec!(100),
                &campaign_operation(campaign.campaign_id),
                std::slice::from_ref(&allocation),
            )
            .unwrap();

        let (expired, reversal) = store
            .expire_allocation(&allocation.allocation_id, now)
            .unwrap();
        assert!(expired.is_expired);
        assert!(!expired.is_active);

        let reversal = reversal.unwrap();
        assert_eq!(reversal.amount, dec!(-60));
        assert_eq!(reversal.transaction_type, TransactionType::Expiry);
        assert_eq!(
            reversal.operation_code,
            expiry_operation(campaign.campaign_id)
        );

        let balance = store.get_balance(&tenant_id, &entity_id).unwrap().unwrap();
        assert_eq!(balance.available_credits, dec!(40));

        // Second sweep of the same allocation is rejected.
        let again = store.expire_allocation(&allocation.allocation_id, now);
        assert!(matches!(again, Err(StoreError::AllocationNotActive(_))));

        // And the expiry index no longer lists it.
        let expiring = store.list_expiring(now + Duration::days(60)).unwrap();
        assert!(expiring.is_empty());
    }

    #[test]
    fn expire_allocation_with_nothing_unused_writes_no_row() {
        let (store, _dir) = create_test_store();
        let campaign = sample_campaign();
        store.put_campaign(&campaign).unwrap();
        let tenant_id = TenantId::generate();
        let now = Utc::now();

        let mut allocation = sample_allocation(campaign.campaign_id, tenant_id);
        allocation.used_credits = dec!(100);
        let entity_id = allocation.entity_id.unwrap();

        store
            .grant_allocations(
                &tenant_id,
                &entity_id,
                dec!(100),
                &campaign_operation(campaign.campaign_id),
                std::slice::from_ref(&allocation),
            )
            .unwrap();

        let (expired, reversal) = store
            .expire_allocation(&allocation.allocation_id, now)
            .unwrap();
        assert!(expired.is_expired);
        assert!(reversal.is_none());

        let rows = store
            .list_transactions(&tenant_id, &entity_id, 10, 0)
            .unwrap();
        assert_eq!(rows.len(), 1); // only the original grant
    }

    #[test]
    fn list_transactions_newest_first_with_pagination() {
        let (store, _dir) = create_test_store();
        let tenant_id = TenantId::generate();
        let entity_id = EntityId::generate();
        let operation = campaign_operation(CampaignId::generate());

        store
            .apply_delta(
                &tenant_id,
                &entity_id,
                dec!(10),
                TransactionType::SeasonalCampaign,
                &operation,
            )
            .unwrap();
        // ULIDs are generated at creation time; keep the timestamps apart.
        std::thread::sleep(std::time::Duration::from_millis(2));
        store
            .apply_delta(
                &tenant_id,
                &entity_id,
                dec!(20),
                TransactionType::SeasonalCampaign,
                &operation,
            )
            .unwrap();

        let rows = store
            .list_transactions(&tenant_id, &entity_id, 10, 0)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].amount, dec!(20));
        assert_eq!(rows[1].amount, dec!(10));

        let page1 = store
            .list_transactions(&tenant_id, &entity_id, 1, 0)
            .unwrap();
        let page2 = store
            .list_transactions(&tenant_id, &entity_id, 1, 1)
            .unwrap();
        assert_eq!(page1[0].amount, dec!(20));
        assert_eq!(page2[0].amount, dec!(10));
    }

    #[test]
    fn extend_expiry_cascades_to_allocations_and_index() {
        let (store, _dir) = create_test_store();
        let campaign = sample_campaign();
        store.put_campaign(&campaign).unwrap();
        let tenant_id = TenantId::generate();
        let now = Utc::now();

        let allocation = sample_allocation(campaign.campaign_id, tenant_id);
        store.put_allocation(&allocation).unwrap();

        let new_expires_at = campaign.expires_at + Duration::days(60);
        let (updated, cascaded) = store
            .extend_campaign_expiry(&campaign.campaign_id, Duration::days(60))
            .unwrap();
        assert_eq!(updated.expires_at, new_expires_at);
        assert_eq!(cascaded, 1);

        let stored = store
            .get_allocation(&allocation.allocation_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.expires_at, new_expires_at);

        // Old index position is gone; the allocation now shows up only
        // within the extended window.
        let near = store.list_expiring(now + Duration::days(45)).unwrap();
        assert!(near.is_empty());
        let far = store.list_expiring(now + Duration::days(91)).unwrap();
        assert_eq!(far.len(), 1);
    }

    #[test]
    fn concurrent_extends_accumulate() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let campaign = sample_campaign();
        store.put_campaign(&campaign).unwrap();

        let mut handles = Vec::new();
        for days in [10, 15] {
            let store = Arc::clone(&store);
            let campaign_id = campaign.campaign_id;
            handles.push(std::thread::spawn(move || {
                store
                    .extend_campaign_expiry(&campaign_id, Duration::days(days))
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Neither extension may absorb the other.
        let stored = store.get_campaign(&campaign.campaign_id).unwrap().unwrap();
        assert_eq!(stored.expires_at, campaign.expires_at + Duration::days(25));
    }
}
