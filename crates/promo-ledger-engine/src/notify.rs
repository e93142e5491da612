//! The notification sink collaborator interface.

use async_trait::async_trait;
use serde::Serialize;

use promo_ledger_core::TenantId;

use crate::error::CollaboratorError;

/// A notification to deliver to a tenant's administrators.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// Short headline.
    pub title: String,

    /// Body text.
    pub message: String,

    /// Where the notification should send the reader.
    pub action_url: String,

    /// Structured context for the delivery channel.
    pub metadata: serde_json::Value,
}

/// Delivery channel for tenant notifications.
///
/// Every engine call site treats emission as best-effort: failures are
/// logged and never change distribution or sweep accounting.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification to one tenant.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery fails; callers log and move on.
    async fn emit(
        &self,
        tenant_id: &TenantId,
        notification: Notification,
    ) -> Result<(), CollaboratorError>;
}
