//! Application state.

use std::sync::Arc;

use promo_ledger_engine::{CampaignManager, Distributor, ExpirySweeper};
use promo_ledger_store::{RocksStore, Store};

use crate::config::ServiceConfig;
use crate::directory::DirectoryClient;
use crate::notify::NotifyClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Campaign lifecycle manager.
    pub campaigns: CampaignManager,

    /// Distribution engine. `None` when no tenant directory is configured.
    pub distributor: Option<Distributor>,

    /// Expiry sweeper.
    pub sweeper: ExpirySweeper,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        let store_dyn: Arc<dyn Store> = store.clone();

        // Create the tenant directory client if configured
        let directory = config.directory_url.as_ref().map(|url| {
            tracing::info!(directory_url = %url, "Tenant directory integration enabled");
            Arc::new(DirectoryClient::new(url, config.directory_api_key.clone()))
        });

        if directory.is_none() {
            tracing::warn!("Tenant directory not configured - distribution cannot resolve tenants");
        }

        // Create the notification client if configured
        let sink = config.notify_url.as_ref().map(|url| {
            tracing::info!(notify_url = %url, "Notification integration enabled");
            Arc::new(NotifyClient::new(url, config.notify_api_key.clone()))
        });

        if sink.is_none() {
            tracing::warn!("Notifications not configured - grants and expiry warnings are silent");
        }

        let campaigns = CampaignManager::new(store_dyn.clone());

        let distributor = directory.map(|directory| {
            let mut distributor = Distributor::new(store_dyn.clone(), directory)
                .with_max_parallel(config.max_parallel_tenants);
            if let Some(sink) = &sink {
                distributor = distributor.with_sink(sink.clone());
            }
            distributor
        });

        let mut sweeper = ExpirySweeper::new(store_dyn);
        if let Some(sink) = &sink {
            sweeper = sweeper.with_sink(sink.clone());
        }

        Self {
            store,
            config,
            campaigns,
            distributor,
            sweeper,
        }
    }

    /// Check if the tenant directory is configured.
    #[must_use]
    pub fn has_directory(&self) -> bool {
        self.distributor.is_some()
    }
}
