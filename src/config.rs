use std::env;
use std::str::FromStr;

use crate::ingest::ledger::DEFAULT_ERROR_SAMPLE_CAP;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding `products.ndjson` and `discounts.ndjson`
    /// Default: data
    pub data_dir: String,

    /// Address the HTTP server binds to
    /// Default: 127.0.0.1
    pub bind_addr: String,

    /// Default: 8080
    pub port: u16,

    /// Maximum payload size for all requests (in bytes)
    /// Default: 10MB (10 * 1024 * 1024)
    pub max_payload_size: usize,

    /// Ingestion jobs allowed to run at the same time; others queue
    /// Default: 4
    pub max_concurrent_jobs: usize,

    /// Error entries retained per job
    /// Default: 100
    pub error_sample_cap: usize,

    /// Directory for rolling log files
    /// Default: logs
    pub log_dir: String,
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// All variables are optional:
    /// - DATA_DIR, BIND_ADDR, PORT, LOG_DIR
    /// - MAX_PAYLOAD_SIZE: Maximum request payload size in bytes (default: 10485760 = 10MB)
    /// - MAX_CONCURRENT_JOBS, ERROR_SAMPLE_CAP
    ///
    /// Unparseable numbers fall back to their defaults.
    pub fn from_env() -> Self {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Config {
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed_or("PORT", 8080),
            max_payload_size: parsed_or("MAX_PAYLOAD_SIZE", 10 * 1024 * 1024),
            max_concurrent_jobs: parsed_or("MAX_CONCURRENT_JOBS", 4usize).max(1),
            error_sample_cap: parsed_or("ERROR_SAMPLE_CAP", DEFAULT_ERROR_SAMPLE_CAP),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_values_fall_back() {
        assert_eq!(parsed_or("CATALOG_INGEST_TEST_UNSET_VAR", 42u16), 42);
        env::set_var("CATALOG_INGEST_TEST_BAD_PORT", "not-a-port");
        assert_eq!(parsed_or("CATALOG_INGEST_TEST_BAD_PORT", 8080u16), 8080);
        env::set_var("CATALOG_INGEST_TEST_GOOD_CAP", "7");
        assert_eq!(parsed_or("CATALOG_INGEST_TEST_GOOD_CAP", 100usize), 7);
    }
}
