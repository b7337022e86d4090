//! Portal configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::notify::DEFAULT_SENDER;
use crate::pricing::loader::DEFAULT_CATALOG_PATH;
use crate::session::DEFAULT_SESSION_PATH;
use crate::store::RetryPolicy;

/// Default location of the JSON-backed store used by the CLI
pub const DEFAULT_STORE_PATH: &str = "data/portal_store.json";

/// Reason recorded when a cancellation gives none
pub const DEFAULT_CANCEL_REASON: &str = "Cancelada administrativamente";

/// Settings shared by the CLI and the library services
#[derive(Debug, Clone, PartialEq)]
pub struct PortalConfig {
    /// Directory holding pricing_tables.csv and pricing_brackets.csv
    pub catalog_path: PathBuf,
    pub store_path: PathBuf,
    pub session_path: PathBuf,
    /// Retries around each store call
    pub retry: RetryPolicy,
    pub default_cancel_reason: String,
    pub mail_sender: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            session_path: PathBuf::from(DEFAULT_SESSION_PATH),
            retry: RetryPolicy::default(),
            default_cancel_reason: DEFAULT_CANCEL_REASON.to_string(),
            mail_sender: DEFAULT_SENDER.to_string(),
        }
    }
}

impl PortalConfig {
    /// Override retry attempts and backoff (milliseconds)
    pub fn with_retry(mut self, attempts: u32, backoff_ms: u64) -> Self {
        self.retry = RetryPolicy {
            attempts: attempts.max(1),
            backoff: Duration::from_millis(backoff_ms),
        };
        self
    }
}
