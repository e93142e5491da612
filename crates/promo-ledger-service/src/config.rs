//! Service configuration.

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/promo-ledger").
    pub data_dir: String,

    /// Tenant directory base URL (optional). Without it, campaigns can
    /// only target explicit tenant lists, and even those fail per tenant
    /// because entity resolution has nowhere to go.
    pub directory_url: Option<String>,

    /// Tenant directory API key (optional).
    pub directory_api_key: Option<String>,

    /// Notification service base URL (optional).
    pub notify_url: Option<String>,

    /// Notification service API key (optional).
    pub notify_api_key: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Upper bound on tenants processed concurrently per distribution.
    pub max_parallel_tenants: usize,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/promo-ledger".into()),
            directory_url: std::env::var("DIRECTORY_URL").ok(),
            directory_api_key: std::env::var("DIRECTORY_API_KEY").ok(),
            notify_url: std::env::var("NOTIFY_URL").ok(),
            notify_api_key: std::env::var("NOTIFY_API_KEY").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            max_parallel_tenants: std::env::var("MAX_PARALLEL_TENANTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(promo_ledger_engine::DEFAULT_MAX_PARALLEL),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/promo-ledger".into(),
            directory_url: None,
            directory_api_key: None,
            notify_url: None,
            notify_api_key: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            max_parallel_tenants: promo_ledger_engine::DEFAULT_MAX_PARALLEL,
        }
    }
}
