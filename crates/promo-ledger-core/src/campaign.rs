//! Campaign types for promo-ledger.
//!
//! A campaign defines how much promotional credit to distribute, to whom,
//! and under what allocation mode. Campaigns are created once, driven through
//! a single distribution run, and may have their expiry extended afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::{CampaignId, TenantId};

/// Maximum accepted campaign name length.
pub const MAX_CAMPAIGN_NAME_LEN: usize = 120;

/// A promotional credit campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique campaign ID.
    pub campaign_id: CampaignId,

    /// Human-readable campaign name.
    pub campaign_name: String,

    /// What kind of credit this campaign grants.
    pub credit_type: CreditType,

    /// Total credit pool for the campaign.
    pub total_credits: Decimal,

    /// Fixed per-tenant amount. When set, overrides `distribution_method`.
    pub credits_per_tenant: Option<Decimal>,

    /// How the pool is divided across target tenants.
    pub distribution_method: DistributionMethod,

    /// Which tenants receive credit.
    pub target: TargetSelection,

    /// Whether credit lands on the whole organization or per application.
    pub allocation_mode: AllocationMode,

    /// When allocations created by this campaign expire.
    pub expires_at: DateTime<Utc>,

    /// Whether to notify each tenant after a successful grant.
    pub send_notifications: bool,

    /// Optional notification message override.
    pub notification_template: Option<String>,

    /// Current lifecycle status.
    pub distribution_status: CampaignStatus,

    /// Number of tenants successfully distributed to.
    pub distributed_count: u32,

    /// Number of tenants that failed during distribution.
    pub failed_count: u32,

    /// When the campaign was created.
    pub created_at: DateTime<Utc>,

    /// When the campaign was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Compute the credit amount one tenant receives, given the resolved
    /// target count.
    ///
    /// A fixed `credits_per_tenant` always wins; otherwise `Equal` divides
    /// the pool (floored to cent precision, dust stays in the pool) and
    /// `Fixed` grants the full pool amount per tenant.
    #[must_use]
    pub fn credits_for_tenant(&self, target_count: usize) -> Decimal {
        if let Some(fixed) = self.credits_per_tenant {
            return fixed;
        }
        match self.distribution_method {
            DistributionMethod::Equal => crate::credit::equal_share(self.total_credits, target_count),
            DistributionMethod::Fixed => self.total_credits,
        }
    }
}

/// The kind of credit a campaign grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditType {
    /// General free credit distribution.
    FreeDistribution,

    /// Promotional credit.
    Promotional,

    /// Holiday or seasonal credit.
    Holiday,

    /// Bonus credit.
    Bonus,

    /// Event-tied credit.
    Event,
}

impl CreditType {
    /// Parse a credit type from its wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free_distribution" => Some(Self::FreeDistribution),
            "promotional" => Some(Self::Promotional),
            "holiday" => Some(Self::Holiday),
            "bonus" => Some(Self::Bonus),
            "event" => Some(Self::Event),
            _ => None,
        }
    }

    /// Wire name of the credit type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FreeDistribution => "free_distribution",
            Self::Promotional => "promotional",
            Self::Holiday => "holiday",
            Self::Bonus => "bonus",
            Self::Event => "event",
        }
    }
}

/// How the campaign pool is divided across target tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMethod {
    /// Divide `total_credits` evenly across the resolved tenant set.
    Equal,

    /// Grant `total_credits` to every tenant as given.
    Fixed,
}

impl DistributionMethod {
    /// Parse a distribution method from its wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "equal" => Some(Self::Equal),
            "fixed" => Some(Self::Fixed),
            _ => None,
        }
    }

    /// Wire name of the distribution method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Fixed => "fixed",
        }
    }
}

/// Which tenants a campaign targets.
///
/// Exactly one form is ever stored; the old "flag plus optional list" shape
/// is resolved at validation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TargetSelection {
    /// Every active tenant in the platform.
    AllTenants,

    /// An explicit, non-empty tenant list.
    Tenants {
        /// The targeted tenant ids, as given.
        tenant_ids: Vec<TenantId>,
    },
}

/// Whether campaign credit lands on the tenant's whole organization or is
/// split across named applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum AllocationMode {
    /// One allocation per tenant against the primary organization.
    PrimaryOrg,

    /// One allocation per (tenant, application) pair; the tenant's total is
    /// split evenly across the listed applications.
    ApplicationSpecific {
        /// The applications receiving a share. Non-empty.
        applications: Vec<ApplicationCode>,
    },
}

impl AllocationMode {
    /// The applications this campaign touches.
    ///
    /// For `PrimaryOrg` this reports the full known application set; the
    /// value is informational and never gates allocation.
    #[must_use]
    pub fn applications(&self) -> Vec<ApplicationCode> {
        match self {
            Self::PrimaryOrg => ApplicationCode::ALL.to_vec(),
            Self::ApplicationSpecific { applications } => applications.clone(),
        }
    }

    /// Whether this is the per-application mode.
    #[must_use]
    pub const fn is_application_specific(&self) -> bool {
        matches!(self, Self::ApplicationSpecific { .. })
    }

    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryOrg => "primary_org",
            Self::ApplicationSpecific { .. } => "application_specific",
        }
    }
}

/// The platform's fixed set of application codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationCode {
    /// Customer relationship management.
    Crm,

    /// Human resources.
    Hr,

    /// Affiliate management.
    Affiliate,

    /// Helpdesk and ticketing.
    Helpdesk,

    /// Project management.
    Projects,

    /// Inventory management.
    Inventory,
}

impl ApplicationCode {
    /// Every known application code.
    pub const ALL: [Self; 6] = [
        Self::Crm,
        Self::Hr,
        Self::Affiliate,
        Self::Helpdesk,
        Self::Projects,
        Self::Inventory,
    ];

    /// Parse an application code from its wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "crm" => Some(Self::Crm),
            "hr" => Some(Self::Hr),
            "affiliate" => Some(Self::Affiliate),
            "helpdesk" => Some(Self::Helpdesk),
            "projects" => Some(Self::Projects),
            "inventory" => Some(Self::Inventory),
            _ => None,
        }
    }

    /// Wire name of the application code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Crm => "crm",
            Self::Hr => "hr",
            Self::Affiliate => "affiliate",
            Self::Helpdesk => "helpdesk",
            Self::Projects => "projects",
            Self::Inventory => "inventory",
        }
    }
}

/// Campaign lifecycle status.
///
/// `Pending → Processing → {Completed | Failed | PartialSuccess}`. There is
/// no transition out of a terminal state; expiry extension does not change
/// the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Created, not yet distributed.
    Pending,

    /// A distribution run is in flight.
    Processing,

    /// Every target tenant received credit.
    Completed,

    /// No target tenant received credit.
    Failed,

    /// Some tenants received credit, some failed.
    PartialSuccess,
}

impl CampaignStatus {
    /// Terminal status for a finished distribution run.
    #[must_use]
    pub const fn from_counts(distributed: u32, failed: u32) -> Self {
        if failed == 0 {
            Self::Completed
        } else if distributed == 0 {
            Self::Failed
        } else {
            Self::PartialSuccess
        }
    }

    /// Whether this status ends the lifecycle.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::PartialSuccess)
    }

    /// Parse a status from its wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "partial_success" => Some(Self::PartialSuccess),
            _ => None,
        }
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::PartialSuccess => "partial_success",
        }
    }
}

/// Raw campaign creation input, as submitted by the administrative caller.
///
/// Enum-valued fields arrive as wire strings so validation can report every
/// bad field in one pass instead of failing on the first deserialization
/// error.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCampaign {
    /// Campaign name.
    pub campaign_name: String,

    /// Credit type wire name.
    pub credit_type: String,

    /// Total credit pool.
    pub total_credits: Decimal,

    /// Optional fixed per-tenant amount.
    #[serde(default)]
    pub credits_per_tenant: Option<Decimal>,

    /// Distribution method wire name.
    #[serde(default = "default_distribution_method")]
    pub distribution_method: String,

    /// Target every active tenant.
    #[serde(default)]
    pub target_all_tenants: bool,

    /// Explicit target tenant ids.
    #[serde(default)]
    pub target_tenant_ids: Vec<String>,

    /// Allocation mode wire name.
    #[serde(default = "default_allocation_mode")]
    pub allocation_mode: String,

    /// Application codes, required for `application_specific` mode.
    #[serde(default)]
    pub target_applications: Vec<String>,

    /// Expiry date for the campaign's allocations.
    pub expires_at: DateTime<Utc>,

    /// Whether to notify tenants on grant.
    #[serde(default)]
    pub send_notifications: bool,

    /// Optional notification message override.
    #[serde(default)]
    pub notification_template: Option<String>,
}

fn default_distribution_method() -> String {
    DistributionMethod::Equal.as_str().to_string()
}

fn default_allocation_mode() -> String {
    AllocationMode::PrimaryOrg.as_str().to_string()
}

impl NewCampaign {
    /// Validate the input and build the stored campaign.
    ///
    /// Collects every field-level problem before rejecting, so the caller
    /// sees the full list in one response.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` carrying one message per bad field.
    #[allow(clippy::too_many_lines)]
    pub fn validate_into(self, now: DateTime<Utc>) -> Result<Campaign, ValidationError> {
        let mut errors = Vec::new();

        let name = self.campaign_name.trim();
        if name.is_empty() {
            errors.push("campaign_name is required".to_string());
        } else if name.len() > MAX_CAMPAIGN_NAME_LEN {
            errors.push(format!(
                "campaign_name must be at most {MAX_CAMPAIGN_NAME_LEN} characters"
            ));
        }

        let credit_type = CreditType::parse(&self.credit_type);
        if credit_type.is_none() {
            errors.push(format!("unknown credit type: {}", self.credit_type));
        }

        if self.total_credits <= Decimal::ZERO {
            errors.push("total_credits must be greater than zero".to_string());
        } else if self.total_credits.scale() > 2 {
            errors.push("total_credits must have at most two decimal places".to_string());
        }

        if let Some(per_tenant) = self.credits_per_tenant {
            if per_tenant <= Decimal::ZERO {
                errors.push("credits_per_tenant must be greater than zero".to_string());
            } else if per_tenant.scale() > 2 {
                errors.push("credits_per_tenant must have at most two decimal places".to_string());
            }
        }

        let distribution_method = DistributionMethod::parse(&self.distribution_method);
        if distribution_method.is_none() {
            errors.push(format!(
                "unknown distribution method: {}",
                self.distribution_method
            ));
        }

        if self.expires_at <= now {
            errors.push("expires_at must be in the future".to_string());
        }

        let target = match (self.target_all_tenants, self.target_tenant_ids.is_empty()) {
            (true, true) => Some(TargetSelection::AllTenants),
            (true, false) => {
                errors.push(
                    "target_all_tenants and target_tenant_ids are mutually exclusive".to_string(),
                );
                None
            }
            (false, true) => {
                errors.push(
                    "either target_all_tenants or a non-empty target_tenant_ids is required"
                        .to_string(),
                );
                None
            }
            (false, false) => {
                let mut tenant_ids = Vec::with_capacity(self.target_tenant_ids.len());
                for raw in &self.target_tenant_ids {
                    match raw.parse::<TenantId>() {
                        Ok(id) => tenant_ids.push(id),
                        Err(_) => errors.push(format!("invalid tenant id: {raw}")),
                    }
                }
                Some(TargetSelection::Tenants { tenant_ids })
            }
        };

        let allocation_mode = match self.allocation_mode.as_str() {
            "primary_org" => Some(AllocationMode::PrimaryOrg),
            "application_specific" => {
                if self.target_applications.is_empty() {
                    errors.push(
                        "target_applications is required for application_specific mode"
                            .to_string(),
                    );
                    None
                } else {
                    let mut applications = Vec::with_capacity(self.target_applications.len());
                    let mut unknown = Vec::new();
                    for raw in &self.target_applications {
                        match ApplicationCode::parse(raw) {
                            Some(code) => applications.push(code),
                            None => unknown.push(raw.clone()),
                        }
                    }
                    if unknown.is_empty() {
                        Some(AllocationMode::ApplicationSpecific { applications })
                    } else {
                        errors.push(format!("unknown application codes: {}", unknown.join(", ")));
                        None
                    }
                }
            }
            other => {
                errors.push(format!("unknown allocation mode: {other}"));
                None
            }
        };

        if !errors.is_empty() {
            return Err(ValidationError::new(errors));
        }

        // All parses succeeded above once errors is empty.
        let (Some(credit_type), Some(distribution_method), Some(target), Some(allocation_mode)) =
            (credit_type, distribution_method, target, allocation_mode)
        else {
            return Err(ValidationError::new(vec!["invalid campaign".to_string()]));
        };

        Ok(Campaign {
            campaign_id: CampaignId::generate(),
            campaign_name: name.to_string(),
            credit_type,
            total_credits: self.total_credits,
            credits_per_tenant: self.credits_per_tenant,
            distribution_method,
            target,
            allocation_mode,
            expires_at: self.expires_at,
            send_notifications: self.send_notifications,
            notification_template: self.notification_template,
            distribution_status: CampaignStatus::Pending,
            distributed_count: 0,
            failed_count: 0,
            created_at: now,
            updated_at: now,
        })
    }
}
