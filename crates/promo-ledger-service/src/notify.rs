//! Notification service HTTP client.
//!
//! Delivers in-app notifications for credit grants and expiry warnings.
//! Every caller treats delivery as best-effort; this client only reports
//! the failure, it never retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use promo_ledger_core::TenantId;
use promo_ledger_engine::{CollaboratorError, Notification, NotificationSink};

/// Error type for notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Notification API returned an error.
    #[error("notification API error: {status} - {error}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        error: String,
    },
}

#[derive(Debug, Serialize)]
struct SendNotificationRequest<'a> {
    tenant_id: &'a TenantId,
    title: &'a str,
    message: &'a str,
    action_url: &'a str,
    metadata: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct NotifyErrorResponse {
    error: String,
}

/// Notification service API client.
#[derive(Debug, Clone)]
pub struct NotifyClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NotifyClient {
    /// Create a new notification client.
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

    /// Deliver one notification to a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service returns an
    /// error status.
    pub async fn send(
        &self,
        tenant_id: &TenantId,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let url = format!("{}/api/v1/notifications", self.base_url);
        let request = SendNotificationRequest {
            tenant_id,
            title: &notification.title,
            message: &notification.message,
            action_url: &notification.action_url,
            metadata: &notification.metadata,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        let error_body: Result<NotifyErrorResponse, _> = response.json().await;
        match error_body {
            Ok(body) => Err(NotifyError::Api {
                status: status.as_u16(),
                error: body.error,
            }),
            Err(_) => Err(NotifyError::Api {
                status: status.as_u16(),
                error: format!("HTTP {status}"),
            }),
        }
    }
}

#[async_trait]
impl NotificationSink for NotifyClient {
    async fn emit(
        &self,
        tenant_id: &TenantId,
        notification: Notification,
    ) -> Result<(), CollaboratorError> {
        self.send(tenant_id, &notification)
            .await
            .map_err(|e| CollaboratorError::new(e.to_string()))
    }
}
