//! Shared test doubles and fixtures for engine tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tempfile::TempDir;

use promo_ledger_core::{
    campaign_operation, Allocation, Campaign, EntityId, NewCampaign, TenantId,
};
use promo_ledger_store::{RocksStore, Store};

use crate::directory::{OrgEntity, TenantDirectory};
use crate::error::CollaboratorError;
use crate::notify::{Notification, NotificationSink};

pub fn open_store() -> (Arc<RocksStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = RocksStore::open(dir.path()).unwrap();
    (Arc::new(store), dir)
}

pub fn new_campaign_input(total: Decimal) -> NewCampaign {
    NewCampaign {
        campaign_name: "Summer promo".to_string(),
        credit_type: "promotional".to_string(),
        total_credits: total,
        credits_per_tenant: None,
        distribution_method: "equal".to_string(),
        target_all_tenants: true,
        target_tenant_ids: Vec::new(),
        allocation_mode: "primary_org".to_string(),
        target_applications: Vec::new(),
        expires_at: Utc::now() + Duration::days(30),
        send_notifications: false,
        notification_template: None,
    }
}

pub fn application_campaign(total: Decimal, tenant_ids: Vec<TenantId>) -> NewCampaign {
    let mut input = new_campaign_input(total);
    input.target_all_tenants = false;
    input.target_tenant_ids = tenant_ids.iter().map(ToString::to_string).collect();
    input.allocation_mode = "application_specific".to_string();
    input.target_applications = vec![
        "crm".to_string(),
        "hr".to_string(),
        "affiliate".to_string(),
    ];
    input
}

/// Seed one granted allocation, with its balance grant, under a campaign.
pub fn seeded_allocation(
    store: &Arc<RocksStore>,
    campaign: &Campaign,
    tenant_id: TenantId,
    amount: Decimal,
) -> Allocation {
    let entity_id = EntityId::generate();
    let allocation = Allocation::granted(
        campaign.campaign_id,
        tenant_id,
        entity_id,
        "organization".to_string(),
        None,
        amount,
        campaign.expires_at,
        Utc::now(),
    );
    store
        .grant_allocations(
            &tenant_id,
            &entity_id,
            amount,
            &campaign_operation(campaign.campaign_id),
            std::slice::from_ref(&allocation),
        )
        .unwrap();
    allocation
}

/// In-memory tenant directory. Orphan tenants are listed as active but
/// resolve to no entity.
#[derive(Default)]
pub struct FakeDirectory {
    tenants: Vec<TenantId>,
    entities: HashMap<TenantId, OrgEntity>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tenant(&mut self, tenant_id: TenantId, entity_id: EntityId) {
        self.tenants.push(tenant_id);
        self.entities.insert(
            tenant_id,
            OrgEntity {
                entity_id,
                entity_type: "organization".to_string(),
            },
        );
    }

    pub fn add_orphan_tenant(&mut self, tenant_id: TenantId) {
        self.tenants.push(tenant_id);
    }

    pub fn entity_for(&self, tenant_id: &TenantId) -> EntityId {
        self.entities[tenant_id].entity_id
    }
}

#[async_trait]
impl TenantDirectory for FakeDirectory {
    async fn list_active_tenant_ids(&self) -> Result<Vec<TenantId>, CollaboratorError> {
        Ok(self.tenants.clone())
    }

    async fn primary_org_entity(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<OrgEntity>, CollaboratorError> {
        Ok(self.entities.get(tenant_id).cloned())
    }
}

/// Notification sink that records emissions, or fails every one of them.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(TenantId, Notification)>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(TenantId, Notification)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn emit(
        &self,
        tenant_id: &TenantId,
        notification: Notification,
    ) -> Result<(), CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::new("sink offline"));
        }
        self.sent.lock().unwrap().push((*tenant_id, notification));
        Ok(())
    }
}
