//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! To change a default, only edit this file.

/// Retry attempts for one object fetch before the object is skipped
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// First retry delay (seconds); doubles on every failed attempt
pub const DEFAULT_RETRY_BASE_SECS: u64 = 2;

/// Retry delay ceiling (seconds)
pub const DEFAULT_RETRY_MAX_SECS: u64 = 10;

/// HTTP request timeout (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default group count for top-talker / top-listener reports
pub const DEFAULT_TOP_N: usize = 10;

/// Default trailing window (hourly buckets) for spike detection
pub const DEFAULT_SPIKE_WINDOW: usize = 24;

/// Default z-score threshold for spike detection
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

/// Default minimum occurrence count for persistent-connection detection
pub const DEFAULT_MIN_OCCURRENCES: u64 = 20;

/// Default persistence window width (hours)
pub const DEFAULT_PERSISTENCE_WINDOW_HOURS: i64 = 1;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get storage account name from environment
pub fn get_storage_account() -> Option<String> {
    std::env::var("FLOWLENS_STORAGE_ACCOUNT").ok()
}

/// Get blob container name from environment
pub fn get_container() -> Option<String> {
    std::env::var("FLOWLENS_CONTAINER").ok()
}

/// Get SAS token from environment
pub fn get_sas_token() -> Option<String> {
    std::env::var("FLOWLENS_SAS_TOKEN").ok()
}

/// Get HTTP timeout from environment or use default
pub fn get_http_timeout() -> u64 {
    std::env::var("FLOWLENS_HTTP_TIMEOUT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS)
}
