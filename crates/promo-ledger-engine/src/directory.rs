//! The tenant directory collaborator interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use promo_ledger_core::{EntityId, TenantId};

use crate::error::CollaboratorError;

/// An organization entity resolved from the tenant directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgEntity {
    /// The entity that owns a credit balance.
    pub entity_id: EntityId,

    /// Directory-reported entity kind, e.g. `organization`.
    pub entity_type: String,
}

/// Read-side view of the platform's tenant directory.
///
/// The engine only ever needs two lookups: the active tenant population
/// for all-tenant campaigns, and the primary organization entity that
/// receives a tenant's credit.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Every active tenant in the platform.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be reached; the caller
    /// treats that as fatal for the triggering call.
    async fn list_active_tenant_ids(&self) -> Result<Vec<TenantId>, CollaboratorError>;

    /// The primary organization entity of a tenant, if it has one.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be reached. `Ok(None)`
    /// means the tenant exists without a primary organization.
    async fn primary_org_entity(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<OrgEntity>, CollaboratorError>;
}
