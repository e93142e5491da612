//! Tenant directory HTTP client.
//!
//! Resolves the active tenant population and each tenant's primary
//! organization entity from the platform's tenant directory service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use promo_ledger_core::{EntityId, TenantId};
use promo_ledger_engine::{CollaboratorError, OrgEntity, TenantDirectory};

/// Error type for directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Directory API returned an error.
    #[error("directory API error: {status} - {error}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        error: String,
    },
}

#[derive(Debug, Deserialize)]
struct TenantsResponse {
    tenants: Vec<TenantRecord>,
}

#[derive(Debug, Deserialize)]
struct TenantRecord {
    tenant_id: TenantId,
}

#[derive(Debug, Deserialize)]
struct PrimaryOrgResponse {
    entity_id: EntityId,
    entity_type: String,
}

#[derive(Debug, Deserialize)]
struct DirectoryErrorResponse {
    error: String,
}

/// Tenant directory API client.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl DirectoryClient {
    /// Create a new directory client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// List every active tenant on the platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the directory returns an
    /// error status.
    pub async fn list_active_tenants(&self) -> Result<Vec<TenantId>, DirectoryError> {
        let url = format!("{}/api/v1/tenants?status=active", self.base_url);

        let response = self.authorize(self.client.get(&url)).send().await?;
        let body: TenantsResponse = Self::handle_response(response).await?;

        Ok(body.tenants.into_iter().map(|t| t.tenant_id).collect())
    }

    /// Look up a tenant's primary organization entity.
    ///
    /// A 404 from the directory means the tenant has no primary
    /// organization, not a transport failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the directory returns a
    /// non-404 error status.
    pub async fn primary_organization(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<OrgEntity>, DirectoryError> {
        let url = format!(
            "{}/api/v1/tenants/{}/primary-organization",
            self.base_url, tenant_id
        );

        let response = self.authorize(self.client.get(&url)).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: PrimaryOrgResponse = Self::handle_response(response).await?;
        Ok(Some(OrgEntity {
            entity_id: body.entity_id,
            entity_type: body.entity_type,
        }))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DirectoryError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<DirectoryErrorResponse, _> = response.json().await;

        match error_body {
            Ok(body) => Err(DirectoryError::Api {
                status: status.as_u16(),
                error: body.error,
            }),
            Err(_) => Err(DirectoryError::Api {
                status: status.as_u16(),
                error: format!("HTTP {status}"),
            }),
        }
    }
}

#[async_trait]
impl TenantDirectory for DirectoryClient {
    async fn list_active_tenant_ids(&self) -> Result<Vec<TenantId>, CollaboratorError> {
        self.list_active_tenants()
            .await
            .map_err(|e| CollaboratorError::new(e.to_string()))
    }

    async fn primary_org_entity(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<OrgEntity>, CollaboratorError> {
        self.primary_organization(tenant_id)
            .await
            .map_err(|e| CollaboratorError::new(e.to_string()))
    }
}
