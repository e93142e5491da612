//! The expiry sweeper.
//!
//! Two on-demand batch passes over the expiry index: `sweep_expired`
//! reclaims unused credit from allocations past their date, and
//! `send_expiry_warnings` notifies tenants ahead of time. Both share the
//! distribution engine's partial-failure posture: a bad allocation is
//! logged and skipped, never fatal to the batch.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use promo_ledger_core::{Allocation, ValidationError};
use promo_ledger_store::{Store, StoreError};

use crate::error::Result;
use crate::notify::{Notification, NotificationSink};

/// Upper bound on the warning window, in days. Keeps hostile input out of
/// date arithmetic.
const MAX_WARNING_DAYS: i64 = 3650;

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SweepReport {
    /// Allocations successfully expired this run.
    pub processed_count: usize,

    /// Allocations that were due when the run started.
    pub total_expired: usize,
}

/// Outcome of one warning pass.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WarningReport {
    /// Notifications delivered.
    pub emails_sent: usize,

    /// Allocations expiring inside the window.
    pub total_expiring: usize,
}

/// Reclaims expired credit and warns tenants about upcoming expiry.
#[derive(Clone)]
pub struct ExpirySweeper {
    store: Arc<dyn Store>,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl ExpirySweeper {
    /// Build a sweeper without a notification sink.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, sink: None }
    }

    /// Attach a notification sink for expiry warnings.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Expire every live allocation past its date, reversing unused credit
    /// through the ledger.
    ///
    /// Each allocation is one atomic store operation; a failure on one is
    /// logged with its ID and the sweep moves on. An allocation another
    /// sweep got to first is skipped silently.
    ///
    /// # Errors
    ///
    /// Returns a store error only when the due listing itself fails.
    pub fn sweep_expired(&self) -> Result<SweepReport> {
        let now = Utc::now();
        let due = self.store.list_expiring(now)?;
        let total_expired = due.len();
        info!(total = total_expired, "expiry sweep started");

        let mut processed = 0usize;
        for allocation in due {
            match self.store.expire_allocation(&allocation.allocation_id, now) {
                Ok((expired, reversal)) => {
                    if let Some(row) = reversal {
                        debug!(
                            allocation_id = %expired.allocation_id,
                            tenant_id = %expired.tenant_id,
                            amount = %row.amount,
                            "unused credit reversed"
                        );
                    }
                    processed += 1;
                }
                // another sweep won the race; nothing left to do
                Err(StoreError::AllocationNotActive(_)) => {}
                Err(error) => {
                    warn!(
                        allocation_id = %allocation.allocation_id,
                        error = %error,
                        "failed to expire allocation"
                    );
                }
            }
        }

        info!(processed, total = total_expired, "expiry sweep finished");
        Ok(SweepReport {
            processed_count: processed,
            total_expired,
        })
    }

    /// Send one warning per allocation expiring within `days_ahead` days.
    ///
    /// Deliberately not idempotent: re-running inside the same window
    /// re-sends. Delivery failures are logged per allocation and skipped.
    ///
    /// # Errors
    ///
    /// - `EngineError::Validation` when `days_ahead` is outside
    ///   `0..=MAX_WARNING_DAYS`.
    /// - A store error when the expiring listing fails.
    pub async fn send_expiry_warnings(&self, days_ahead: i64) -> Result<WarningReport> {
        if days_ahead < 0 {
            return Err(ValidationError::single("days_ahead must not be negative").into());
        }
        if days_ahead > MAX_WARNING_DAYS {
            return Err(ValidationError::single(format!(
                "days_ahead must be at most {MAX_WARNING_DAYS}"
            ))
            .into());
        }

        let now = Utc::now();
        let until = now + Duration::days(days_ahead);
        let expiring: Vec<Allocation> = self
            .store
            .list_expiring(until)?
            .into_iter()
            .filter(|allocation| allocation.expires_at >= now)
            .collect();
        let total_expiring = expiring.len();

        let Some(sink) = &self.sink else {
            warn!(
                total = total_expiring,
                "no notification sink configured; expiry warnings skipped"
            );
            return Ok(WarningReport {
                emails_sent: 0,
                total_expiring,
            });
        };

        let mut sent = 0usize;
        for allocation in expiring {
            let notification = self.expiry_warning(&allocation);
            match sink.emit(&allocation.tenant_id, notification).await {
                Ok(()) => sent += 1,
                Err(error) => {
                    warn!(
                        allocation_id = %allocation.allocation_id,
                        tenant_id = %allocation.tenant_id,
                        error = %error,
                        "expiry warning failed"
                    );
                }
            }
        }

        info!(sent, total = total_expiring, "expiry warnings dispatched");
        Ok(WarningReport {
            emails_sent: sent,
            total_expiring,
        })
    }

    /// Build the warning for one allocation. The campaign name lookup is
    /// cosmetic; a missing campaign degrades the message, not the pass.
    fn expiry_warning(&self, allocation: &Allocation) -> Notification {
        let unused = allocation.unused_credits();
        let date = allocation.expires_at.format("%Y-%m-%d");
        let campaign_name = self
            .store
            .get_campaign(&allocation.campaign_id)
            .ok()
            .flatten()
            .map(|campaign| campaign.campaign_name);

        let message = match campaign_name {
            Some(name) => format!(
                "{unused} unused credits from the {name} campaign expire on {date}."
            ),
            None => format!("{unused} unused credits expire on {date}."),
        };

        Notification {
            title: "Credits expiring soon".to_string(),
            message,
            action_url: "/billing/credits".to_string(),
            metadata: serde_json::json!({
                "allocation_id": allocation.allocation_id,
                "campaign_id": allocation.campaign_id,
                "expires_at": allocation.expires_at,
                "unused_credits": unused,
            }),
        }
    }
}
